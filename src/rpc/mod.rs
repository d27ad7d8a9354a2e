//! Typed request/response surface of the client-side RPC protocol.
//!
//! Wire encoding is out of scope for this crate: these are the in-memory
//! shapes exchanged with an [`RpcTransport`](transport::RpcTransport)
//! implementation, which owns serialization and the physical channel.
//!
//! Every response carries a [`Status`]; callers translate a non-OK status
//! into a typed error via [`Status::check`] before resolving, so all RPC
//! paths share identical error semantics.

pub mod mock;
pub mod transport;

use std::time::Duration;

use crate::consumer::assignment::{Assignment, MessageQueue};
use crate::consumer::route::TopicRouteData;
use crate::error::{Result, StatusCode};
use crate::message::MessageView;
use crate::types::{AttemptId, ClientId};

pub use transport::{ConnectionFactory, RpcTransport};

/// Status carried in every RPC response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Outcome code.
    pub code: StatusCode,
    /// Human-readable detail, empty on success.
    pub message: String,
}

impl Status {
    /// A successful status.
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: String::new(),
        }
    }

    /// A failed status with a detail message.
    pub fn error(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Translate a non-OK status into the matching typed error.
    pub fn check(&self) -> Result<()> {
        self.code.check(self.message.clone())
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}

/// Query the route topology of a topic from the name server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRouteRequest {
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRouteResponse {
    pub status: Status,
    pub route: TopicRouteData,
}

/// Keep this client registered with a broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatRequest {
    pub client_id: ClientId,
    pub group: String,
    /// Topics the client is subscribed to, reported for group bookkeeping.
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatResponse {
    pub status: Status,
}

/// Probe a broker for liveness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckRequest {
    pub client_id: ClientId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckResponse {
    pub status: Status,
}

/// Ask a broker for this consumer's queue assignment of a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAssignmentRequest {
    pub topic: String,
    pub group: String,
    pub client_id: ClientId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAssignmentResponse {
    pub status: Status,
    pub assignments: Vec<Assignment>,
}

/// Long-poll one queue for the next batch of messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveMessageRequest {
    pub group: String,
    pub queue: MessageQueue,
    /// Maximum messages returned in one response.
    pub batch_size: u32,
    /// Server-side wait bound before returning an empty response.
    pub long_polling_timeout: Duration,
    /// Identifier of this logical receive attempt; reused when the same
    /// attempt is retried after a timeout so the broker can detect
    /// duplicate redelivery attempts.
    pub attempt_id: AttemptId,
    /// Ask the broker to renew the delivery lease server-side so the
    /// client need not re-lease mid-poll.
    pub auto_renew: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveMessageResponse {
    pub status: Status,
    pub messages: Vec<MessageView>,
}

/// Acknowledge a successfully consumed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckMessageRequest {
    pub group: String,
    pub topic: String,
    pub message_id: String,
    pub receipt_handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckMessageResponse {
    pub status: Status,
}

/// Negatively acknowledge a message, requesting redelivery after backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NackMessageRequest {
    pub group: String,
    pub topic: String,
    pub message_id: String,
    pub receipt_handle: String,
    pub delivery_attempt: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NackMessageResponse {
    pub status: Status,
}

/// Move a message that exhausted its retry budget to the dead-letter queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardMessageToDeadLetterQueueRequest {
    pub group: String,
    pub topic: String,
    pub message_id: String,
    pub receipt_handle: String,
    pub delivery_attempt: i32,
    pub max_delivery_attempts: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardMessageToDeadLetterQueueResponse {
    pub status: Status,
}

/// Kind of lite-subscription synchronization being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteSubscriptionAction {
    /// Add the carried delta to the server-side set.
    PartialAdd,
    /// Remove the carried delta from the server-side set.
    PartialRemove,
    /// Declare the carried set as the complete authoritative state.
    CompleteAdd,
}

/// Synchronize lite-subscription state with the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncLiteSubscriptionRequest {
    pub action: LiteSubscriptionAction,
    /// Base topic the lite topics are bound to.
    pub topic: String,
    pub group: String,
    /// Delta for partial actions; the entire local set for `CompleteAdd`.
    pub lite_topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncLiteSubscriptionResponse {
    pub status: Status,
}

/// Server-pushed command telling a consumer to drop one lite topic.
///
/// Unsolicited and asynchronous: applied to local state without an RPC
/// round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyUnsubscribeLiteCommand {
    pub lite_topic: String,
}
