//! Push-consumption engine.
//!
//! A [`PushConsumer`] registers itself as an observer with the shared
//! [`ClientManager`], periodically re-resolves its queue assignment, and
//! runs one self-perpetuating long-poll loop per assigned queue:
//!
//! ```text
//! IDLE → POLLING → DELIVERED → (ACK | NACK | FORWARD_DLQ) → POLLING …
//! ```
//!
//! A loop terminates only when its queue is dropped from the latest
//! assignment or the consumer stops. Transient RPC failures never tear the
//! loop down — they are logged and the loop re-enters polling; only
//! quota/illegal-state conditions propagate to callers as typed errors.
//!
//! Per-queue consumption is sequential: one outstanding long poll per
//! queue, and the next poll is only issued after the prior cycle's
//! ack/nack settled and flow control permits it. There is no ordering
//! across different queues.
//!
//! The optional lite-subscription capability is composed in, not
//! inherited: when enabled it adds the `subscribe_lite`/`unsubscribe_lite`
//! surface and a periodic full resync on top of the generic engine.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::{ClientManager, ClientObserver, Endpoint, ServiceState, StateMachine, TaskRegistry};
use crate::config::ConsumerConfig;
use crate::consumer::assignment::{MessageQueue, TopicAssignments};
use crate::consumer::cache::ConsumeCache;
use crate::consumer::listener::{ConsumeStatus, MessageListener};
use crate::consumer::lite::LiteSubscription;
use crate::consumer::resolver::AssignmentResolver;
use crate::error::{Error, Result};
use crate::message::MessageView;
use crate::rpc::{
    AckMessageRequest, ForwardMessageToDeadLetterQueueRequest, HealthCheckRequest,
    HeartbeatRequest, NackMessageRequest, NotifyUnsubscribeLiteCommand, ReceiveMessageRequest,
};
use crate::types::{AttemptId, ClientId};

/// Per-queue loop handle; the `dropped` flag is how rebalance and shutdown
/// terminate a running loop.
struct ProcessQueue {
    queue: MessageQueue,
    dropped: AtomicBool,
}

impl ProcessQueue {
    fn new(queue: MessageQueue) -> Self {
        Self {
            queue,
            dropped: AtomicBool::new(false),
        }
    }

    fn mark_dropped(&self) {
        self.dropped.store(true, Ordering::SeqCst);
    }

    fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Consumer-side counters logged by the stats round.
#[derive(Debug, Default)]
struct ConsumerStats {
    received: AtomicU64,
    consumed_ok: AtomicU64,
    consumed_failed: AtomicU64,
}

/// Point-in-time view of a consumer's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub consumed_ok: u64,
    pub consumed_failed: u64,
    pub cached_count: usize,
    pub cached_bytes: usize,
}

/// Long-poll push consumer bound to one consumer group.
pub struct PushConsumer {
    client_id: ClientId,
    config: ConsumerConfig,
    manager: Arc<ClientManager>,
    listener: Arc<dyn MessageListener>,
    resolver: AssignmentResolver,
    subscriptions: std::sync::Mutex<HashSet<String>>,
    assignments: Mutex<HashMap<String, TopicAssignments>>,
    process_queues: DashMap<MessageQueue, Arc<ProcessQueue>>,
    cache: ConsumeCache,
    stats: ConsumerStats,
    lite: Option<LiteSubscription>,
    state: StateMachine,
    tasks: Mutex<TaskRegistry>,
}

impl PushConsumer {
    /// Create a consumer; call [`start`](Self::start) before use.
    pub fn new(
        manager: Arc<ClientManager>,
        config: ConsumerConfig,
        listener: Arc<dyn MessageListener>,
    ) -> Result<Arc<Self>> {
        config
            .validate()
            .map_err(|errors| Error::Validation(errors.join("; ")))?;

        let client_id = ClientId::generate();
        let lite = config.lite_bind_topic.as_ref().map(|bind_topic| {
            LiteSubscription::new(
                bind_topic.clone(),
                config.group.clone(),
                config.lite_subscription_quota,
                config.max_lite_topic_length,
            )
        });
        let cache = ConsumeCache::new(
            config.max_cached_message_count,
            config.max_cached_message_bytes,
        );
        let resolver = AssignmentResolver::new(Arc::clone(&manager), client_id.clone());

        Ok(Arc::new(Self {
            client_id,
            config,
            manager,
            listener,
            resolver,
            subscriptions: std::sync::Mutex::new(HashSet::new()),
            assignments: Mutex::new(HashMap::new()),
            process_queues: DashMap::new(),
            cache,
            stats: ConsumerStats::default(),
            lite,
            state: StateMachine::new(),
            tasks: Mutex::new(TaskRegistry::new()),
        }))
    }

    /// This consumer's client id.
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Consumer group this instance belongs to.
    pub fn group(&self) -> &str {
        &self.config.group
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServiceState {
        self.state.state()
    }

    /// Subscribe to a topic; takes effect on the next assignment rescan.
    pub fn subscribe(&self, topic: &str) -> Result<()> {
        if topic.trim().is_empty() {
            return Err(Error::Validation("topic is blank".to_string()));
        }
        self.subscriptions
            .lock()
            .expect("subscriptions poisoned")
            .insert(topic.to_string());
        Ok(())
    }

    /// Unsubscribe from a topic and drop its running poll loops.
    pub async fn unsubscribe(&self, topic: &str) {
        self.subscriptions
            .lock()
            .expect("subscriptions poisoned")
            .remove(topic);
        self.assignments.lock().await.remove(topic);
        let stale: Vec<MessageQueue> = self
            .process_queues
            .iter()
            .filter(|entry| entry.key().topic == topic)
            .map(|entry| entry.key().clone())
            .collect();
        for queue in stale {
            if let Some((_, process_queue)) = self.process_queues.remove(&queue) {
                process_queue.mark_dropped();
            }
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Register with the manager and start the rescan/resync loops.
    ///
    /// Idempotent: a second start is a logged no-op.
    pub async fn start(self: &Arc<Self>) {
        info!(client_id = %self.client_id, group = %self.config.group, "Begin to start the push consumer");
        if !self
            .state
            .transition(ServiceState::Ready, ServiceState::Starting)
        {
            warn!(client_id = %self.client_id, "The push consumer has been started before");
            return;
        }

        self.manager
            .register_observer(Arc::clone(self) as Arc<dyn ClientObserver>);

        let mut tasks = self.tasks.lock().await;

        let consumer = Arc::clone(self);
        tasks.spawn_periodic(
            "scan_assignments",
            self.config.scan_assignment_interval,
            move || {
                let consumer = Arc::clone(&consumer);
                async move { consumer.scan_assignments().await }
            },
        );

        if self.lite.is_some() {
            let consumer = Arc::clone(self);
            let period = self.config.lite_sync_interval;
            tasks.spawn("lite_sync", async move {
                loop {
                    tokio::time::sleep(period).await;
                    if let Err(e) = consumer.sync_all_lite_subscription().await {
                        warn!(client_id = %consumer.client_id, error = %e, "Scheduled lite subscription resync failed");
                    }
                }
            });
        }
        drop(tasks);

        self.state
            .transition(ServiceState::Starting, ServiceState::Started);
        info!(client_id = %self.client_id, "The push consumer starts successfully");
    }

    /// Stop the loops, drop every queue, and unregister from the manager.
    ///
    /// Idempotent: stopping a consumer that never started is a logged
    /// no-op.
    pub async fn shutdown(&self) {
        info!(client_id = %self.client_id, "Begin to shutdown the push consumer");
        if !self
            .state
            .transition(ServiceState::Started, ServiceState::Stopping)
        {
            warn!(client_id = %self.client_id, "Push consumer has not been started before");
            return;
        }

        self.tasks
            .lock()
            .await
            .shutdown_all(self.manager.config().shutdown_timeout)
            .await;

        for entry in self.process_queues.iter() {
            entry.value().mark_dropped();
        }
        self.process_queues.clear();

        self.manager.unregister_observer(&self.client_id);
        self.state
            .transition(ServiceState::Stopping, ServiceState::Stopped);
        info!(client_id = %self.client_id, "Shutdown the push consumer successfully");
    }

    fn check_running(&self) -> Result<()> {
        if self.state.is_started() {
            Ok(())
        } else {
            Err(Error::IllegalState(format!(
                "push consumer not running, state={}",
                self.state.state()
            )))
        }
    }

    // ========================================================================
    // Assignment rescan
    // ========================================================================

    /// Re-resolve every subscribed topic and reconcile the poll loops.
    ///
    /// Resolution failures are logged and leave the current queue set
    /// untouched; the next round retries.
    pub async fn scan_assignments(self: &Arc<Self>) {
        let topics: Vec<String> = self
            .subscriptions
            .lock()
            .expect("subscriptions poisoned")
            .iter()
            .cloned()
            .collect();
        for topic in topics {
            match self
                .resolver
                .resolve(&topic, &self.config.group, self.config.message_model)
                .await
            {
                Ok(latest) => self.apply_assignments(&topic, latest).await,
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Failed to resolve assignment, keeping current queue set")
                }
            }
        }
    }

    async fn apply_assignments(self: &Arc<Self>, topic: &str, latest: TopicAssignments) {
        let mut assignments = self.assignments.lock().await;
        if assignments.get(topic) == Some(&latest) {
            // Same queues, possibly in a different order: nothing to churn.
            debug!(topic, "Assignment unchanged");
            return;
        }

        let new_set = latest.queue_set();
        let stale: Vec<MessageQueue> = self
            .process_queues
            .iter()
            .filter(|entry| entry.key().topic == topic && !new_set.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        for queue in stale {
            if let Some((_, process_queue)) = self.process_queues.remove(&queue) {
                process_queue.mark_dropped();
                info!(%queue, "Dropped queue no longer assigned");
            }
        }

        for queue in latest.queues() {
            if !self.process_queues.contains_key(queue) {
                let process_queue = Arc::new(ProcessQueue::new(queue.clone()));
                self.process_queues
                    .insert(queue.clone(), Arc::clone(&process_queue));
                let consumer = Arc::clone(self);
                tokio::spawn(async move { consumer.queue_loop(process_queue).await });
                info!(%queue, "Scheduled poll loop for newly assigned queue");
            }
        }

        assignments.insert(topic.to_string(), latest);
    }

    /// The currently held assignment for a topic, if any.
    pub async fn current_assignment(&self, topic: &str) -> Option<TopicAssignments> {
        self.assignments.lock().await.get(topic).cloned()
    }

    /// Number of queues with a running poll loop.
    pub fn active_queue_count(&self) -> usize {
        self.process_queues.len()
    }

    // ========================================================================
    // Long-poll loop
    // ========================================================================

    async fn queue_loop(self: Arc<Self>, process_queue: Arc<ProcessQueue>) {
        let mut attempt_id = AttemptId::generate();
        loop {
            if process_queue.is_dropped()
                || matches!(
                    self.state.state(),
                    ServiceState::Stopping | ServiceState::Stopped
                )
            {
                break;
            }
            if self.cache.is_full() {
                // Flow control: wait for acks/nacks to drain the cache.
                tokio::time::sleep(self.config.flow_control_backoff).await;
                continue;
            }

            let request = ReceiveMessageRequest {
                group: self.config.group.clone(),
                queue: process_queue.queue.clone(),
                batch_size: self.config.receive_batch_size,
                long_polling_timeout: self.config.long_polling_timeout,
                attempt_id: attempt_id.clone(),
                auto_renew: true,
            };
            // The client-side deadline outlives the server-side wait.
            let deadline = self.config.long_polling_timeout + self.manager.config().request_timeout;

            match self
                .manager
                .receive_message(&process_queue.queue.endpoint, request, deadline)
                .await
            {
                Ok(response) => match response.status.check() {
                    Ok(()) => {
                        attempt_id = AttemptId::generate();
                        for message in response.messages {
                            if process_queue.is_dropped() {
                                break;
                            }
                            self.process_message(&process_queue.queue, message).await;
                        }
                    }
                    Err(e) => {
                        warn!(queue = %process_queue.queue, error = %e, "Receive answered with error status, re-polling");
                        attempt_id = AttemptId::generate();
                        tokio::time::sleep(self.config.flow_control_backoff).await;
                    }
                },
                Err(e @ Error::Timeout { .. }) => {
                    // Same logical attempt: re-poll with the id the broker
                    // already saw so it can detect the duplicate.
                    debug!(queue = %process_queue.queue, error = %e, "Long poll timed out, retrying attempt");
                }
                Err(e) => {
                    warn!(queue = %process_queue.queue, error = %e, "Receive failed, re-polling");
                    attempt_id = AttemptId::generate();
                    tokio::time::sleep(self.config.flow_control_backoff).await;
                }
            }
        }
        debug!(queue = %process_queue.queue, "Poll loop terminated");
    }

    async fn process_message(&self, queue: &MessageQueue, message: MessageView) {
        self.stats.received.fetch_add(1, Ordering::SeqCst);
        self.cache.add(message.body_size());

        let status = self.listener.consume(&message).await;
        let settled = match status {
            ConsumeStatus::Success => {
                self.stats.consumed_ok.fetch_add(1, Ordering::SeqCst);
                self.ack_message(queue, &message).await
            }
            ConsumeStatus::Failure => {
                self.stats.consumed_failed.fetch_add(1, Ordering::SeqCst);
                if message.delivery_attempt >= self.config.max_delivery_attempts {
                    self.forward_to_dead_letter_queue(queue, &message).await
                } else {
                    self.nack_message(queue, &message).await
                }
            }
        };
        if let Err(e) = settled {
            warn!(
                queue = %queue,
                message_id = %message.message_id,
                error = %e,
                "Failed to settle message, poll loop continues"
            );
        }

        self.cache.remove(message.body_size());
    }

    // ========================================================================
    // Ack / nack / dead-letter
    // ========================================================================

    /// Acknowledge a successfully consumed message.
    pub async fn ack_message(&self, queue: &MessageQueue, message: &MessageView) -> Result<()> {
        let request = AckMessageRequest {
            group: self.config.group.clone(),
            topic: message.topic.clone(),
            message_id: message.message_id.clone(),
            receipt_handle: message.receipt_handle.clone(),
        };
        let response = self
            .manager
            .ack_message(&queue.endpoint, request, self.manager.config().request_timeout)
            .await?;
        response.status.check()
    }

    /// Negatively acknowledge a message, signalling redelivery after
    /// backoff.
    pub async fn nack_message(&self, queue: &MessageQueue, message: &MessageView) -> Result<()> {
        let request = NackMessageRequest {
            group: self.config.group.clone(),
            topic: message.topic.clone(),
            message_id: message.message_id.clone(),
            receipt_handle: message.receipt_handle.clone(),
            delivery_attempt: message.delivery_attempt,
        };
        let response = self
            .manager
            .nack_message(&queue.endpoint, request, self.manager.config().request_timeout)
            .await?;
        response.status.check()
    }

    /// Forward a message that exhausted its retry budget to the DLQ,
    /// removing it from the normal retry path.
    pub async fn forward_to_dead_letter_queue(
        &self,
        queue: &MessageQueue,
        message: &MessageView,
    ) -> Result<()> {
        let request = ForwardMessageToDeadLetterQueueRequest {
            group: self.config.group.clone(),
            topic: message.topic.clone(),
            message_id: message.message_id.clone(),
            receipt_handle: message.receipt_handle.clone(),
            delivery_attempt: message.delivery_attempt,
            max_delivery_attempts: self.config.max_delivery_attempts,
        };
        let response = self
            .manager
            .forward_to_dead_letter_queue(
                &queue.endpoint,
                request,
                self.manager.config().request_timeout,
            )
            .await?;
        response.status.check()
    }

    // ========================================================================
    // Lite subscription surface
    // ========================================================================

    fn lite(&self) -> Result<&LiteSubscription> {
        self.lite
            .as_ref()
            .ok_or_else(|| Error::IllegalState("lite subscription not enabled".to_string()))
    }

    /// Add one lite topic under the configured quota.
    pub async fn subscribe_lite(&self, lite_topic: &str) -> Result<()> {
        self.check_running()?;
        self.lite()?.subscribe(&self.manager, lite_topic).await
    }

    /// Remove one lite topic.
    pub async fn unsubscribe_lite(&self, lite_topic: &str) -> Result<()> {
        self.check_running()?;
        self.lite()?.unsubscribe(&self.manager, lite_topic).await
    }

    /// Snapshot of the currently held lite topics.
    pub async fn lite_topic_set(&self) -> Result<HashSet<String>> {
        Ok(self.lite()?.topic_set().await)
    }

    /// Declare the complete local lite topic set to the server.
    pub async fn sync_all_lite_subscription(&self) -> Result<()> {
        self.lite()?.sync_all(&self.manager).await
    }

    /// Apply a server-pushed lite-unsubscribe command.
    pub async fn on_notify_unsubscribe_lite(
        &self,
        endpoint: &Endpoint,
        command: NotifyUnsubscribeLiteCommand,
    ) {
        if let Some(lite) = &self.lite {
            lite.on_notify_unsubscribe(endpoint, &command).await;
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.stats.received.load(Ordering::SeqCst),
            consumed_ok: self.stats.consumed_ok.load(Ordering::SeqCst),
            consumed_failed: self.stats.consumed_failed.load(Ordering::SeqCst),
            cached_count: self.cache.count(),
            cached_bytes: self.cache.bytes(),
        }
    }

    /// Distinct broker endpoints across all held assignments.
    async fn broker_endpoints(&self) -> Vec<Endpoint> {
        let assignments = self.assignments.lock().await;
        let mut seen = Vec::new();
        for topic_assignments in assignments.values() {
            for queue in topic_assignments.queues() {
                if !seen.contains(&queue.endpoint) {
                    seen.push(queue.endpoint.clone());
                }
            }
        }
        seen
    }
}

#[async_trait]
impl ClientObserver for PushConsumer {
    fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    async fn on_health_check(&self) -> Result<()> {
        for endpoint in self.broker_endpoints().await {
            let request = HealthCheckRequest {
                client_id: self.client_id.clone(),
            };
            if let Err(e) = self
                .manager
                .health_check(&endpoint, request, self.manager.config().request_timeout)
                .await
            {
                warn!(%endpoint, error = %e, "Health check failed");
            }
        }
        Ok(())
    }

    async fn on_heartbeat(&self) -> Result<()> {
        let topics: Vec<String> = self
            .subscriptions
            .lock()
            .expect("subscriptions poisoned")
            .iter()
            .cloned()
            .collect();
        for endpoint in self.broker_endpoints().await {
            let request = HeartbeatRequest {
                client_id: self.client_id.clone(),
                group: self.config.group.clone(),
                topics: topics.clone(),
            };
            match self
                .manager
                .heartbeat(&endpoint, request, self.manager.config().request_timeout)
                .await
            {
                Ok(response) => {
                    if let Err(e) = response.status.check() {
                        warn!(%endpoint, error = %e, "Heartbeat rejected");
                    }
                }
                Err(e) => warn!(%endpoint, error = %e, "Heartbeat failed"),
            }
        }
        Ok(())
    }

    async fn on_stats(&self) -> Result<()> {
        let snapshot = self.stats();
        info!(
            client_id = %self.client_id,
            group = %self.config.group,
            received = snapshot.received,
            consumed_ok = snapshot.consumed_ok,
            consumed_failed = snapshot.consumed_failed,
            cached_count = snapshot.cached_count,
            cached_bytes = snapshot.cached_bytes,
            "Consumer stats"
        );
        Ok(())
    }
}

impl std::fmt::Debug for PushConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushConsumer")
            .field("client_id", &self.client_id)
            .field("group", &self.config.group)
            .field("state", &self.state.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use bytes::Bytes;

    use crate::client::AddressScheme;
    use crate::config::{ClientConfig, MessageModel};
    use crate::consumer::route::{Broker, Partition, TopicRouteData};
    use crate::rpc::mock::MockConnectionFactory;
    use crate::types::BrokerId;

    struct StaticListener(ConsumeStatus);

    #[async_trait]
    impl MessageListener for StaticListener {
        async fn consume(&self, _message: &MessageView) -> ConsumeStatus {
            self.0
        }
    }

    fn name_server() -> Endpoint {
        Endpoint::new(AddressScheme::Plain, "nameserver", 9876)
    }

    fn broker(host: &str) -> Endpoint {
        Endpoint::new(AddressScheme::Plain, host, 8081)
    }

    fn route_with(hosts: &[&str]) -> TopicRouteData {
        TopicRouteData {
            partitions: hosts
                .iter()
                .enumerate()
                .map(|(i, host)| Partition {
                    topic: "orders".to_string(),
                    queue_id: i as u32,
                    broker: Broker {
                        id: BrokerId::PRIMARY,
                        endpoint: broker(host),
                    },
                })
                .collect(),
        }
    }

    fn consumer_config() -> ConsumerConfig {
        ConsumerConfig {
            message_model: MessageModel::Broadcasting,
            scan_assignment_interval: Duration::from_millis(50),
            flow_control_backoff: Duration::from_millis(10),
            ..ConsumerConfig::new("test-group")
        }
    }

    fn setup(
        config: ConsumerConfig,
        status: ConsumeStatus,
    ) -> (Arc<MockConnectionFactory>, Arc<ClientManager>, Arc<PushConsumer>) {
        let factory = Arc::new(MockConnectionFactory::new());
        let manager = ClientManager::new(ClientConfig::new(name_server()), factory.clone());
        let consumer =
            PushConsumer::new(Arc::clone(&manager), config, Arc::new(StaticListener(status)))
                .unwrap();
        (factory, manager, consumer)
    }

    fn message(attempt: i32) -> MessageView {
        MessageView {
            message_id: "m-0".to_string(),
            topic: "orders".to_string(),
            tag: None,
            body: Bytes::from_static(b"payload"),
            receipt_handle: "rh-0".to_string(),
            delivery_attempt: attempt,
        }
    }

    #[tokio::test]
    async fn test_subscribe_blank_topic_fails() {
        let (_, _, consumer) = setup(consumer_config(), ConsumeStatus::Success);
        assert!(matches!(
            consumer.subscribe("  ").unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_lite_calls_require_started_state() {
        let config = ConsumerConfig {
            lite_bind_topic: Some("orders".to_string()),
            ..consumer_config()
        };
        let (_, _, consumer) = setup(config, ConsumeStatus::Success);
        let err = consumer.subscribe_lite("lite-a").await.unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));
    }

    #[tokio::test]
    async fn test_lite_calls_require_capability() {
        let (_, _, consumer) = setup(consumer_config(), ConsumeStatus::Success);
        consumer.start().await;
        let err = consumer.subscribe_lite("lite-a").await.unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));
        consumer.shutdown().await;
    }

    #[tokio::test]
    async fn test_scan_assignments_spawns_loops() {
        let (factory, _, consumer) = setup(consumer_config(), ConsumeStatus::Success);
        factory
            .transport(&name_server())
            .set_route(route_with(&["broker-a", "broker-b"]));
        consumer.subscribe("orders").unwrap();

        consumer.scan_assignments().await;
        assert_eq!(consumer.active_queue_count(), 2);
        assert!(consumer.current_assignment("orders").await.is_some());
    }

    #[tokio::test]
    async fn test_rescan_with_reordered_route_causes_no_churn() {
        let (factory, _, consumer) = setup(consumer_config(), ConsumeStatus::Success);
        let transport = factory.transport(&name_server());
        transport.set_route(route_with(&["broker-a", "broker-b"]));
        consumer.subscribe("orders").unwrap();
        consumer.scan_assignments().await;

        let before: Vec<MessageQueue> = consumer
            .process_queues
            .iter()
            .map(|e| e.key().clone())
            .collect();
        let pointers: Vec<usize> = before
            .iter()
            .map(|q| Arc::as_ptr(consumer.process_queues.get(q).unwrap().value()) as usize)
            .collect();

        // Same queues, reversed order.
        let mut reversed = route_with(&["broker-a", "broker-b"]);
        reversed.partitions.reverse();
        transport.set_route(reversed);
        consumer.scan_assignments().await;

        for (queue, pointer) in before.iter().zip(pointers) {
            let current = Arc::as_ptr(consumer.process_queues.get(queue).unwrap().value()) as usize;
            assert_eq!(current, pointer, "poll loop was recreated needlessly");
        }
    }

    #[tokio::test]
    async fn test_rescan_drops_removed_queue() {
        let (factory, _, consumer) = setup(consumer_config(), ConsumeStatus::Success);
        let transport = factory.transport(&name_server());
        transport.set_route(route_with(&["broker-a", "broker-b"]));
        consumer.subscribe("orders").unwrap();
        consumer.scan_assignments().await;
        assert_eq!(consumer.active_queue_count(), 2);

        transport.set_route(route_with(&["broker-a"]));
        consumer.scan_assignments().await;
        assert_eq!(consumer.active_queue_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_assignment_is_valid() {
        let (factory, _, consumer) = setup(consumer_config(), ConsumeStatus::Success);
        factory
            .transport(&name_server())
            .set_route(TopicRouteData::default());
        consumer.subscribe("orders").unwrap();
        consumer.scan_assignments().await;
        assert_eq!(consumer.active_queue_count(), 0);
        assert!(consumer.current_assignment("orders").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_message_acks_on_success() {
        let (factory, _, consumer) = setup(consumer_config(), ConsumeStatus::Success);
        let queue = MessageQueue {
            topic: "orders".to_string(),
            queue_id: 0,
            endpoint: broker("broker-a"),
        };
        consumer.process_message(&queue, message(1)).await;

        let transport = factory.transport(&broker("broker-a"));
        assert_eq!(transport.ack_requests().len(), 1);
        assert!(transport.nack_requests().is_empty());
        assert_eq!(consumer.stats().consumed_ok, 1);
        assert_eq!(consumer.stats().cached_count, 0);
    }

    #[tokio::test]
    async fn test_process_message_nacks_on_failure() {
        let (factory, _, consumer) = setup(consumer_config(), ConsumeStatus::Failure);
        let queue = MessageQueue {
            topic: "orders".to_string(),
            queue_id: 0,
            endpoint: broker("broker-a"),
        };
        consumer.process_message(&queue, message(1)).await;

        let transport = factory.transport(&broker("broker-a"));
        assert_eq!(transport.nack_requests().len(), 1);
        assert!(transport.forward_requests().is_empty());
        assert_eq!(consumer.stats().consumed_failed, 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_forward_to_dlq() {
        let config = ConsumerConfig {
            max_delivery_attempts: 3,
            ..consumer_config()
        };
        let (factory, _, consumer) = setup(config, ConsumeStatus::Failure);
        let queue = MessageQueue {
            topic: "orders".to_string(),
            queue_id: 0,
            endpoint: broker("broker-a"),
        };
        consumer.process_message(&queue, message(3)).await;

        let transport = factory.transport(&broker("broker-a"));
        assert!(transport.nack_requests().is_empty());
        let forwards = transport.forward_requests();
        assert_eq!(forwards.len(), 1);
        assert_eq!(forwards[0].max_delivery_attempts, 3);
    }

    #[tokio::test]
    async fn test_ack_failure_resolves_with_cause_and_releases_cache() {
        let (factory, _, consumer) = setup(consumer_config(), ConsumeStatus::Success);
        let transport = factory.transport(&broker("broker-a"));
        transport.push_ack(Err(Error::Transport(std::io::ErrorKind::ConnectionReset)));

        let queue = MessageQueue {
            topic: "orders".to_string(),
            queue_id: 0,
            endpoint: broker("broker-a"),
        };
        // Direct ack call surfaces the underlying cause.
        transport.push_ack(Err(Error::Transport(std::io::ErrorKind::ConnectionReset)));
        let err = consumer.ack_message(&queue, &message(1)).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));

        // The pipeline absorbs the same failure and releases the cache.
        consumer.process_message(&queue, message(1)).await;
        assert_eq!(consumer.stats().cached_count, 0);
    }

    #[tokio::test]
    async fn test_start_shutdown_lifecycle() {
        let (_, manager, consumer) = setup(consumer_config(), ConsumeStatus::Success);
        consumer.start().await;
        assert_eq!(consumer.state(), ServiceState::Started);
        assert!(!manager.is_empty());

        consumer.start().await; // idempotent
        assert_eq!(consumer.state(), ServiceState::Started);

        consumer.shutdown().await;
        assert_eq!(consumer.state(), ServiceState::Stopped);
        assert!(manager.is_empty());
        assert_eq!(consumer.active_queue_count(), 0);
    }
}
