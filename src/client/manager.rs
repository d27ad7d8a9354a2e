//! Shared client manager: connection pool, observer registry, scheduler.
//!
//! One manager is shared by every producer/consumer instance in a process.
//! It owns exactly one logical connection per [`Endpoint`], created on
//! demand and evicted once idle past the configured threshold, and drives
//! the four periodic rounds (health check, idle sweep, heartbeat, stats)
//! over the registered observers.
//!
//! # Locking discipline
//!
//! The connection table is guarded by a reader/writer lock. The read path
//! takes the shared lock; only a miss escalates to the exclusive lock,
//! re-checking for a race-inserted entry before constructing. Network I/O
//! never happens under the exclusive lock beyond the removal step — evicted
//! connections are shut down after the lock is released, and construction
//! is lazy per the [`ConnectionFactory`] contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::connection::RpcConnection;
use crate::client::endpoint::Endpoint;
use crate::client::observer::ClientObserver;
use crate::client::scheduler::TaskRegistry;
use crate::client::state::{ServiceState, StateMachine};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::rpc::{
    AckMessageRequest, AckMessageResponse, ConnectionFactory,
    ForwardMessageToDeadLetterQueueRequest, ForwardMessageToDeadLetterQueueResponse,
    HealthCheckRequest, HealthCheckResponse, HeartbeatRequest, HeartbeatResponse,
    NackMessageRequest, NackMessageResponse, QueryAssignmentRequest, QueryAssignmentResponse,
    QueryRouteRequest, QueryRouteResponse, ReceiveMessageRequest, ReceiveMessageResponse,
    SyncLiteSubscriptionRequest, SyncLiteSubscriptionResponse,
};
use crate::types::ClientId;

/// Shared connection pool and background scheduler.
pub struct ClientManager {
    id: String,
    config: ClientConfig,
    factory: Arc<dyn ConnectionFactory>,
    connections: RwLock<HashMap<Endpoint, Arc<RpcConnection>>>,
    observers: DashMap<ClientId, Arc<dyn ClientObserver>>,
    tasks: Mutex<TaskRegistry>,
    state: StateMachine,
}

impl ClientManager {
    /// Create a manager; call [`start`](Self::start) before use.
    pub fn new(config: ClientConfig, factory: Arc<dyn ConnectionFactory>) -> Arc<Self> {
        Arc::new(Self {
            id: format!("manager.{}", Uuid::new_v4()),
            config,
            factory,
            connections: RwLock::new(HashMap::new()),
            observers: DashMap::new(),
            tasks: Mutex::new(TaskRegistry::new()),
            state: StateMachine::new(),
        })
    }

    /// Manager instance id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The manager's configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServiceState {
        self.state.state()
    }

    // ========================================================================
    // Observer registry
    // ========================================================================

    /// Register an observer; replaces any previous entry for its client id.
    pub fn register_observer(&self, observer: Arc<dyn ClientObserver>) {
        self.observers.insert(observer.client_id().clone(), observer);
    }

    /// Unregister the observer with the given client id; absent is a no-op.
    pub fn unregister_observer(&self, client_id: &ClientId) {
        self.observers.remove(client_id);
    }

    /// Whether no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the periodic rounds. Idempotent: a second start is a logged
    /// no-op.
    pub async fn start(self: &Arc<Self>) {
        info!(manager_id = %self.id, "Begin to start the client manager");
        if !self
            .state
            .transition(ServiceState::Ready, ServiceState::Starting)
        {
            warn!(manager_id = %self.id, "The client manager has been started before");
            return;
        }

        let mut tasks = self.tasks.lock().await;

        let manager = Arc::clone(self);
        tasks.spawn_periodic(
            "health_check",
            self.config.health_check_interval,
            move || {
                let manager = Arc::clone(&manager);
                async move { manager.do_health_check().await }
            },
        );

        let manager = Arc::clone(self);
        tasks.spawn_periodic("idle_sweep", self.config.idle_sweep_interval, move || {
            let manager = Arc::clone(&manager);
            async move { manager.sweep_idle_connections().await }
        });

        let manager = Arc::clone(self);
        tasks.spawn_periodic("heartbeat", self.config.heartbeat_interval, move || {
            let manager = Arc::clone(&manager);
            async move { manager.do_heartbeat().await }
        });

        let manager = Arc::clone(self);
        tasks.spawn_periodic("stats", self.config.stats_interval, move || {
            let manager = Arc::clone(&manager);
            async move { manager.do_stats().await }
        });

        drop(tasks);
        self.state
            .transition(ServiceState::Starting, ServiceState::Started);
        info!(manager_id = %self.id, "The client manager starts successfully");
    }

    /// Stop the scheduler, then shut down every pooled connection.
    ///
    /// Idempotent: shutting down a manager that never started is a logged
    /// no-op. All phases complete before the manager reports stopped; a
    /// scheduler that misses the shutdown timeout is aborted with an error
    /// log rather than blocking forever.
    pub async fn shutdown(&self) {
        info!(manager_id = %self.id, "Begin to shutdown the client manager");
        if !self
            .state
            .transition(ServiceState::Started, ServiceState::Stopping)
        {
            warn!(manager_id = %self.id, "Client manager has not been started before");
            return;
        }

        self.tasks
            .lock()
            .await
            .shutdown_all(self.config.shutdown_timeout)
            .await;

        let drained: Vec<(Endpoint, Arc<RpcConnection>)> = {
            let mut table = self.connections.write().await;
            table.drain().collect()
        };
        for (endpoint, connection) in drained {
            if let Err(e) = connection.shutdown().await {
                warn!(%endpoint, error = %e, "Failed to shutdown pooled connection");
            }
        }

        self.state
            .transition(ServiceState::Stopping, ServiceState::Stopped);
        info!(manager_id = %self.id, "Shutdown the client manager successfully");
    }

    // ========================================================================
    // Connection pool
    // ========================================================================

    /// Get the pooled connection for an endpoint, creating it on a miss.
    ///
    /// Safe under arbitrary concurrent callers: the exclusive section
    /// re-checks for a race-inserted entry, so N concurrent calls for the
    /// same endpoint construct exactly one transport.
    pub async fn get_connection(&self, endpoint: &Endpoint) -> Result<Arc<RpcConnection>> {
        {
            let table = self.connections.read().await;
            if let Some(connection) = table.get(endpoint) {
                return Ok(Arc::clone(connection));
            }
        }

        let mut table = self.connections.write().await;
        if let Some(connection) = table.get(endpoint) {
            return Ok(Arc::clone(connection));
        }
        let transport = self.factory.connect(endpoint).await.map_err(|e| {
            error!(%endpoint, error = %e, "Failed to create connection");
            e
        })?;
        let connection = Arc::new(RpcConnection::new(endpoint.clone(), transport));
        table.insert(endpoint.clone(), Arc::clone(&connection));
        Ok(connection)
    }

    /// Number of pooled connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Evict and shut down connections idle past the configured threshold.
    ///
    /// The exclusive lock covers only the removal; the per-connection
    /// shutdown calls run after it is released.
    pub async fn sweep_idle_connections(&self) {
        debug!(manager_id = %self.id, "Start to clear idle connections for a new round");
        let max_idle = self.config.connection_max_idle;

        let evicted: Vec<(Endpoint, Arc<RpcConnection>)> = {
            let mut table = self.connections.write().await;
            let stale: Vec<Endpoint> = table
                .iter()
                .filter(|(_, connection)| connection.idle_duration() > max_idle)
                .map(|(endpoint, _)| endpoint.clone())
                .collect();
            stale
                .into_iter()
                .filter_map(|endpoint| table.remove(&endpoint).map(|c| (endpoint, c)))
                .collect()
        };

        for (endpoint, connection) in evicted {
            info!(
                %endpoint,
                idle_secs = connection.idle_duration().as_secs(),
                max_idle_secs = max_idle.as_secs(),
                "Connection has been idle for a long time, evicting"
            );
            if let Err(e) = connection.shutdown().await {
                warn!(%endpoint, error = %e, "Failed to shutdown idle connection");
            }
        }
    }

    // ========================================================================
    // Periodic rounds
    // ========================================================================

    /// Snapshot the registry so a round never holds map guards across the
    /// observer callbacks.
    fn observer_snapshot(&self) -> Vec<(ClientId, Arc<dyn ClientObserver>)> {
        self.observers
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    async fn do_health_check(&self) {
        debug!(manager_id = %self.id, "Start to do health check for a new round");
        for (client_id, observer) in self.observer_snapshot() {
            if let Err(e) = observer.on_health_check().await {
                error!(%client_id, error = %e, "Exception raised while health check");
            }
        }
    }

    async fn do_heartbeat(&self) {
        debug!(manager_id = %self.id, "Start to send heartbeat for a new round");
        for (client_id, observer) in self.observer_snapshot() {
            if let Err(e) = observer.on_heartbeat().await {
                error!(%client_id, error = %e, "Exception raised while heartbeat");
            }
        }
    }

    async fn do_stats(&self) {
        debug!(manager_id = %self.id, "Start to log stats for a new round");
        for (client_id, observer) in self.observer_snapshot() {
            if let Err(e) = observer.on_stats().await {
                error!(%client_id, error = %e, "Exception raised while log stats");
            }
        }
    }

    // ========================================================================
    // RPC surface
    // ========================================================================

    pub async fn query_route(
        &self,
        endpoint: &Endpoint,
        request: QueryRouteRequest,
        timeout: Duration,
    ) -> Result<QueryRouteResponse> {
        let connection = self.get_connection(endpoint).await?;
        connection.query_route(request, timeout).await
    }

    pub async fn heartbeat(
        &self,
        endpoint: &Endpoint,
        request: HeartbeatRequest,
        timeout: Duration,
    ) -> Result<HeartbeatResponse> {
        let connection = self.get_connection(endpoint).await?;
        connection.heartbeat(request, timeout).await
    }

    pub async fn health_check(
        &self,
        endpoint: &Endpoint,
        request: HealthCheckRequest,
        timeout: Duration,
    ) -> Result<HealthCheckResponse> {
        let connection = self.get_connection(endpoint).await?;
        connection.health_check(request, timeout).await
    }

    pub async fn query_assignment(
        &self,
        endpoint: &Endpoint,
        request: QueryAssignmentRequest,
        timeout: Duration,
    ) -> Result<QueryAssignmentResponse> {
        let connection = self.get_connection(endpoint).await?;
        connection.query_assignment(request, timeout).await
    }

    pub async fn receive_message(
        &self,
        endpoint: &Endpoint,
        request: ReceiveMessageRequest,
        timeout: Duration,
    ) -> Result<ReceiveMessageResponse> {
        let connection = self.get_connection(endpoint).await?;
        connection.receive_message(request, timeout).await
    }

    pub async fn ack_message(
        &self,
        endpoint: &Endpoint,
        request: AckMessageRequest,
        timeout: Duration,
    ) -> Result<AckMessageResponse> {
        let connection = self.get_connection(endpoint).await?;
        connection.ack_message(request, timeout).await
    }

    pub async fn nack_message(
        &self,
        endpoint: &Endpoint,
        request: NackMessageRequest,
        timeout: Duration,
    ) -> Result<NackMessageResponse> {
        let connection = self.get_connection(endpoint).await?;
        connection.nack_message(request, timeout).await
    }

    pub async fn forward_to_dead_letter_queue(
        &self,
        endpoint: &Endpoint,
        request: ForwardMessageToDeadLetterQueueRequest,
        timeout: Duration,
    ) -> Result<ForwardMessageToDeadLetterQueueResponse> {
        let connection = self.get_connection(endpoint).await?;
        connection.forward_to_dead_letter_queue(request, timeout).await
    }

    pub async fn sync_lite_subscription(
        &self,
        endpoint: &Endpoint,
        request: SyncLiteSubscriptionRequest,
        timeout: Duration,
    ) -> Result<SyncLiteSubscriptionResponse> {
        let connection = self.get_connection(endpoint).await?;
        connection.sync_lite_subscription(request, timeout).await
    }

    /// Require the manager to be started before issuing a caller-facing
    /// operation.
    pub fn check_running(&self) -> Result<()> {
        if self.state.is_started() {
            Ok(())
        } else {
            Err(Error::IllegalState(format!(
                "client manager not running, state={}",
                self.state.state()
            )))
        }
    }
}

impl std::fmt::Debug for ClientManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientManager")
            .field("id", &self.id)
            .field("state", &self.state.state())
            .finish()
    }
}
