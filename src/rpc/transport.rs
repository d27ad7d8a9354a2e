//! Transport seams between the client engine and the wire.
//!
//! The engine never talks to a socket directly: it resolves an
//! [`RpcTransport`] through the connection pool and issues typed calls.
//! Production deployments plug in their channel implementation via
//! [`ConnectionFactory`]; tests plug in the in-memory
//! [`MockTransport`](super::mock::MockTransport).

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    AckMessageRequest, AckMessageResponse, ForwardMessageToDeadLetterQueueRequest,
    ForwardMessageToDeadLetterQueueResponse, HealthCheckRequest, HealthCheckResponse,
    HeartbeatRequest, HeartbeatResponse, NackMessageRequest, NackMessageResponse,
    QueryAssignmentRequest, QueryAssignmentResponse, QueryRouteRequest, QueryRouteResponse,
    ReceiveMessageRequest, ReceiveMessageResponse, SyncLiteSubscriptionRequest,
    SyncLiteSubscriptionResponse,
};
use crate::client::Endpoint;
use crate::error::Result;

/// One multiplexed channel to a single endpoint.
///
/// Implementations own serialization and the physical connection. Calls
/// must be safe to issue concurrently; per-call deadlines are enforced by
/// the caller, not the transport.
#[async_trait]
pub trait RpcTransport: std::fmt::Debug + Send + Sync {
    async fn query_route(&self, request: QueryRouteRequest) -> Result<QueryRouteResponse>;

    async fn heartbeat(&self, request: HeartbeatRequest) -> Result<HeartbeatResponse>;

    async fn health_check(&self, request: HealthCheckRequest) -> Result<HealthCheckResponse>;

    async fn query_assignment(
        &self,
        request: QueryAssignmentRequest,
    ) -> Result<QueryAssignmentResponse>;

    async fn receive_message(
        &self,
        request: ReceiveMessageRequest,
    ) -> Result<ReceiveMessageResponse>;

    async fn ack_message(&self, request: AckMessageRequest) -> Result<AckMessageResponse>;

    async fn nack_message(&self, request: NackMessageRequest) -> Result<NackMessageResponse>;

    async fn forward_to_dead_letter_queue(
        &self,
        request: ForwardMessageToDeadLetterQueueRequest,
    ) -> Result<ForwardMessageToDeadLetterQueueResponse>;

    async fn sync_lite_subscription(
        &self,
        request: SyncLiteSubscriptionRequest,
    ) -> Result<SyncLiteSubscriptionResponse>;

    /// Release the underlying channel. Idempotent.
    async fn shutdown(&self) -> Result<()>;
}

/// Builds transports for the connection pool.
///
/// # Contract
///
/// `connect` is invoked while the pool holds its exclusive lock, so
/// construction must be lazy: allocate the channel state but defer any
/// blocking handshake to the first call, the way a lazily-connecting
/// channel does.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Create a transport for the endpoint.
    ///
    /// A failure (e.g. secure-channel setup) surfaces as
    /// [`Error::Connect`](crate::error::Error::Connect) and is not cached
    /// by the pool.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn RpcTransport>>;
}
