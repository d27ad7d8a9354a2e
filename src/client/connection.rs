//! Pooled connection wrapper.
//!
//! An [`RpcConnection`] pairs a transport with last-used bookkeeping and
//! per-call deadline enforcement. Connections are owned exclusively by the
//! pool: they are created lazily on the first RPC to an endpoint and
//! destroyed by the idle sweep or manager shutdown, never shared outside.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::client::Endpoint;
use crate::error::{Error, Result};
use crate::rpc::{
    AckMessageRequest, AckMessageResponse, ForwardMessageToDeadLetterQueueRequest,
    ForwardMessageToDeadLetterQueueResponse, HealthCheckRequest, HealthCheckResponse,
    HeartbeatRequest, HeartbeatResponse, NackMessageRequest, NackMessageResponse,
    QueryAssignmentRequest, QueryAssignmentResponse, QueryRouteRequest, QueryRouteResponse,
    ReceiveMessageRequest, ReceiveMessageResponse, RpcTransport, SyncLiteSubscriptionRequest,
    SyncLiteSubscriptionResponse,
};

/// One pooled connection to a single endpoint.
pub struct RpcConnection {
    endpoint: Endpoint,
    transport: Arc<dyn RpcTransport>,
    /// When the most recent RPC was issued on this connection.
    last_used: Mutex<Instant>,
}

impl RpcConnection {
    /// Wrap a freshly constructed transport.
    pub fn new(endpoint: Endpoint, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            endpoint,
            transport,
            last_used: Mutex::new(Instant::now()),
        }
    }

    /// Endpoint this connection reaches.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Time since the last RPC was issued.
    pub fn idle_duration(&self) -> Duration {
        self.last_used.lock().expect("last_used poisoned").elapsed()
    }

    fn touch(&self) {
        *self.last_used.lock().expect("last_used poisoned") = Instant::now();
    }

    /// Run one transport call under the caller's deadline.
    ///
    /// Issuing the call refreshes the idle clock, so a connection with an
    /// in-flight long poll never looks idle to the sweep.
    async fn call<T>(
        &self,
        timeout: Duration,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        self.touch();
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                millis: timeout.as_millis() as u64,
            }),
        }
    }

    pub async fn query_route(
        &self,
        request: QueryRouteRequest,
        timeout: Duration,
    ) -> Result<QueryRouteResponse> {
        self.call(timeout, self.transport.query_route(request)).await
    }

    pub async fn heartbeat(
        &self,
        request: HeartbeatRequest,
        timeout: Duration,
    ) -> Result<HeartbeatResponse> {
        self.call(timeout, self.transport.heartbeat(request)).await
    }

    pub async fn health_check(
        &self,
        request: HealthCheckRequest,
        timeout: Duration,
    ) -> Result<HealthCheckResponse> {
        self.call(timeout, self.transport.health_check(request)).await
    }

    pub async fn query_assignment(
        &self,
        request: QueryAssignmentRequest,
        timeout: Duration,
    ) -> Result<QueryAssignmentResponse> {
        self.call(timeout, self.transport.query_assignment(request))
            .await
    }

    pub async fn receive_message(
        &self,
        request: ReceiveMessageRequest,
        timeout: Duration,
    ) -> Result<ReceiveMessageResponse> {
        self.call(timeout, self.transport.receive_message(request))
            .await
    }

    pub async fn ack_message(
        &self,
        request: AckMessageRequest,
        timeout: Duration,
    ) -> Result<AckMessageResponse> {
        self.call(timeout, self.transport.ack_message(request)).await
    }

    pub async fn nack_message(
        &self,
        request: NackMessageRequest,
        timeout: Duration,
    ) -> Result<NackMessageResponse> {
        self.call(timeout, self.transport.nack_message(request)).await
    }

    pub async fn forward_to_dead_letter_queue(
        &self,
        request: ForwardMessageToDeadLetterQueueRequest,
        timeout: Duration,
    ) -> Result<ForwardMessageToDeadLetterQueueResponse> {
        self.call(timeout, self.transport.forward_to_dead_letter_queue(request))
            .await
    }

    pub async fn sync_lite_subscription(
        &self,
        request: SyncLiteSubscriptionRequest,
        timeout: Duration,
    ) -> Result<SyncLiteSubscriptionResponse> {
        self.call(timeout, self.transport.sync_lite_subscription(request))
            .await
    }

    /// Shut the underlying transport down.
    pub async fn shutdown(&self) -> Result<()> {
        self.transport.shutdown().await
    }
}

impl std::fmt::Debug for RpcConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcConnection")
            .field("endpoint", &self.endpoint)
            .field("idle", &self.idle_duration())
            .finish()
    }
}
