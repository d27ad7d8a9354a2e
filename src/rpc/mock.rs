//! In-memory mock transport for testing.
//!
//! Provides a scriptable implementation of [`RpcTransport`] and
//! [`ConnectionFactory`] so unit and integration tests can exercise the
//! pool, the scheduler rounds, and the full receive/ack/nack cycle without
//! a broker. Every call is recorded for later assertions; unscripted calls
//! answer with an OK status.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{
    AckMessageRequest, AckMessageResponse, ConnectionFactory,
    ForwardMessageToDeadLetterQueueRequest, ForwardMessageToDeadLetterQueueResponse,
    HealthCheckRequest, HealthCheckResponse, HeartbeatRequest, HeartbeatResponse,
    NackMessageRequest, NackMessageResponse, QueryAssignmentRequest, QueryAssignmentResponse,
    QueryRouteRequest, QueryRouteResponse, ReceiveMessageRequest, ReceiveMessageResponse,
    RpcTransport, Status, SyncLiteSubscriptionRequest, SyncLiteSubscriptionResponse,
};
use crate::client::Endpoint;
use crate::consumer::assignment::Assignment;
use crate::consumer::route::TopicRouteData;
use crate::error::{Error, Result};

/// Scriptable in-memory transport bound to one endpoint.
#[derive(Debug)]
pub struct MockTransport {
    endpoint: Endpoint,

    // Scripted behavior.
    route: Mutex<TopicRouteData>,
    assignments: Mutex<Vec<Assignment>>,
    receive_script: Mutex<VecDeque<Result<ReceiveMessageResponse>>>,
    receive_delay: Mutex<Duration>,
    ack_script: Mutex<VecDeque<Result<AckMessageResponse>>>,
    nack_script: Mutex<VecDeque<Result<NackMessageResponse>>>,
    sync_status: Mutex<Status>,
    heartbeat_status: Mutex<Status>,

    // Recorded traffic.
    receive_requests: Mutex<Vec<ReceiveMessageRequest>>,
    ack_requests: Mutex<Vec<AckMessageRequest>>,
    nack_requests: Mutex<Vec<NackMessageRequest>>,
    forward_requests: Mutex<Vec<ForwardMessageToDeadLetterQueueRequest>>,
    sync_requests: Mutex<Vec<SyncLiteSubscriptionRequest>>,
    heartbeats: AtomicU32,
    health_checks: AtomicU32,
    shutdown_calls: AtomicU32,
}

impl MockTransport {
    /// Create a transport for the endpoint with all calls answering OK.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            route: Mutex::new(TopicRouteData::default()),
            assignments: Mutex::new(Vec::new()),
            receive_script: Mutex::new(VecDeque::new()),
            receive_delay: Mutex::new(Duration::from_millis(10)),
            ack_script: Mutex::new(VecDeque::new()),
            nack_script: Mutex::new(VecDeque::new()),
            sync_status: Mutex::new(Status::ok()),
            heartbeat_status: Mutex::new(Status::ok()),
            receive_requests: Mutex::new(Vec::new()),
            ack_requests: Mutex::new(Vec::new()),
            nack_requests: Mutex::new(Vec::new()),
            forward_requests: Mutex::new(Vec::new()),
            sync_requests: Mutex::new(Vec::new()),
            heartbeats: AtomicU32::new(0),
            health_checks: AtomicU32::new(0),
            shutdown_calls: AtomicU32::new(0),
        }
    }

    /// Endpoint this transport is bound to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    // ------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------

    /// Set the route returned by query_route.
    pub fn set_route(&self, route: TopicRouteData) {
        *self.route.lock().unwrap() = route;
    }

    /// Set the assignments returned by query_assignment.
    pub fn set_assignments(&self, assignments: Vec<Assignment>) {
        *self.assignments.lock().unwrap() = assignments;
    }

    /// Queue one receive outcome; consumed in FIFO order. When the script
    /// runs dry, receive answers OK with no messages after the configured
    /// delay.
    pub fn push_receive(&self, result: Result<ReceiveMessageResponse>) {
        self.receive_script.lock().unwrap().push_back(result);
    }

    /// Delay applied to unscripted (empty) receive responses.
    pub fn set_receive_delay(&self, delay: Duration) {
        *self.receive_delay.lock().unwrap() = delay;
    }

    /// Queue one ack outcome.
    pub fn push_ack(&self, result: Result<AckMessageResponse>) {
        self.ack_script.lock().unwrap().push_back(result);
    }

    /// Queue one nack outcome.
    pub fn push_nack(&self, result: Result<NackMessageResponse>) {
        self.nack_script.lock().unwrap().push_back(result);
    }

    /// Status returned by every subsequent sync_lite_subscription call.
    pub fn set_sync_status(&self, status: Status) {
        *self.sync_status.lock().unwrap() = status;
    }

    /// Status returned by every subsequent heartbeat call.
    pub fn set_heartbeat_status(&self, status: Status) {
        *self.heartbeat_status.lock().unwrap() = status;
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// All recorded receive requests.
    pub fn receive_requests(&self) -> Vec<ReceiveMessageRequest> {
        self.receive_requests.lock().unwrap().clone()
    }

    /// All recorded ack requests.
    pub fn ack_requests(&self) -> Vec<AckMessageRequest> {
        self.ack_requests.lock().unwrap().clone()
    }

    /// All recorded nack requests.
    pub fn nack_requests(&self) -> Vec<NackMessageRequest> {
        self.nack_requests.lock().unwrap().clone()
    }

    /// All recorded dead-letter forward requests.
    pub fn forward_requests(&self) -> Vec<ForwardMessageToDeadLetterQueueRequest> {
        self.forward_requests.lock().unwrap().clone()
    }

    /// All recorded lite-subscription sync requests.
    pub fn sync_requests(&self) -> Vec<SyncLiteSubscriptionRequest> {
        self.sync_requests.lock().unwrap().clone()
    }

    /// Number of heartbeat calls answered.
    pub fn heartbeat_count(&self) -> u32 {
        self.heartbeats.load(Ordering::SeqCst)
    }

    /// Number of health-check calls answered.
    pub fn health_check_count(&self) -> u32 {
        self.health_checks.load(Ordering::SeqCst)
    }

    /// Number of shutdown calls received.
    pub fn shutdown_count(&self) -> u32 {
        self.shutdown_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn query_route(&self, _request: QueryRouteRequest) -> Result<QueryRouteResponse> {
        Ok(QueryRouteResponse {
            status: Status::ok(),
            route: self.route.lock().unwrap().clone(),
        })
    }

    async fn heartbeat(&self, _request: HeartbeatRequest) -> Result<HeartbeatResponse> {
        self.heartbeats.fetch_add(1, Ordering::SeqCst);
        Ok(HeartbeatResponse {
            status: self.heartbeat_status.lock().unwrap().clone(),
        })
    }

    async fn health_check(&self, _request: HealthCheckRequest) -> Result<HealthCheckResponse> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        Ok(HealthCheckResponse { status: Status::ok() })
    }

    async fn query_assignment(
        &self,
        _request: QueryAssignmentRequest,
    ) -> Result<QueryAssignmentResponse> {
        Ok(QueryAssignmentResponse {
            status: Status::ok(),
            assignments: self.assignments.lock().unwrap().clone(),
        })
    }

    async fn receive_message(
        &self,
        request: ReceiveMessageRequest,
    ) -> Result<ReceiveMessageResponse> {
        self.receive_requests.lock().unwrap().push(request);
        let scripted = self.receive_script.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => {
                let delay = *self.receive_delay.lock().unwrap();
                tokio::time::sleep(delay).await;
                Ok(ReceiveMessageResponse {
                    status: Status::ok(),
                    messages: Vec::new(),
                })
            }
        }
    }

    async fn ack_message(&self, request: AckMessageRequest) -> Result<AckMessageResponse> {
        self.ack_requests.lock().unwrap().push(request);
        let scripted = self.ack_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(AckMessageResponse { status: Status::ok() }))
    }

    async fn nack_message(&self, request: NackMessageRequest) -> Result<NackMessageResponse> {
        self.nack_requests.lock().unwrap().push(request);
        let scripted = self.nack_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(NackMessageResponse { status: Status::ok() }))
    }

    async fn forward_to_dead_letter_queue(
        &self,
        request: ForwardMessageToDeadLetterQueueRequest,
    ) -> Result<ForwardMessageToDeadLetterQueueResponse> {
        self.forward_requests.lock().unwrap().push(request);
        Ok(ForwardMessageToDeadLetterQueueResponse { status: Status::ok() })
    }

    async fn sync_lite_subscription(
        &self,
        request: SyncLiteSubscriptionRequest,
    ) -> Result<SyncLiteSubscriptionResponse> {
        self.sync_requests.lock().unwrap().push(request);
        Ok(SyncLiteSubscriptionResponse {
            status: self.sync_status.lock().unwrap().clone(),
        })
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handing out one shared [`MockTransport`] per endpoint.
///
/// Transports can be fetched (and scripted) before the pool ever connects;
/// `connect_count` exposes how many times the pool constructed a transport
/// for an endpoint.
#[derive(Default)]
pub struct MockConnectionFactory {
    transports: DashMap<Endpoint, Arc<MockTransport>>,
    connect_counts: DashMap<Endpoint, u32>,
    failing: DashMap<Endpoint, String>,
}

impl MockConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the transport for an endpoint.
    pub fn transport(&self, endpoint: &Endpoint) -> Arc<MockTransport> {
        self.transports
            .entry(endpoint.clone())
            .or_insert_with(|| Arc::new(MockTransport::new(endpoint.clone())))
            .clone()
    }

    /// Make connect fail for an endpoint with the given message.
    pub fn fail_connect(&self, endpoint: &Endpoint, message: impl Into<String>) {
        self.failing.insert(endpoint.clone(), message.into());
    }

    /// How many times the pool constructed a connection for the endpoint.
    pub fn connect_count(&self, endpoint: &Endpoint) -> u32 {
        self.connect_counts
            .get(endpoint)
            .map(|count| *count)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn RpcTransport>> {
        if let Some(message) = self.failing.get(endpoint) {
            return Err(Error::Connect {
                endpoint: endpoint.to_string(),
                message: message.clone(),
            });
        }
        *self.connect_counts.entry(endpoint.clone()).or_insert(0) += 1;
        Ok(self.transport(endpoint))
    }
}
