//! User-supplied consumption pipeline.

use async_trait::async_trait;

use crate::message::MessageView;

/// Outcome of one consumption attempt.
///
/// Derived fresh from every attempt and consumed exactly once to drive the
/// ack/nack/forward decision; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeStatus {
    /// The message was fully processed; acknowledge it.
    Success,
    /// Processing failed; request redelivery after backoff.
    Failure,
}

/// Callback consuming received messages.
///
/// Supplied by the embedding application; the engine treats the returned
/// status as opaque. Implementations run on the consumer's polling task,
/// so long-running work should be dispatched elsewhere.
#[async_trait]
pub trait MessageListener: Send + Sync {
    /// Consume one message and report the outcome.
    async fn consume(&self, message: &MessageView) -> ConsumeStatus;
}
