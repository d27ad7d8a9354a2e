//! Received-message value type.

use bytes::Bytes;

/// An immutable view of one received message.
///
/// Instances are produced by the receive path and handed to the
/// user-supplied listener; the engine only inspects the delivery metadata
/// (receipt handle, attempt counter) when deciding between ack, nack, and
/// dead-letter forwarding. Envelope decoding happens upstream in the
/// transport and is out of scope here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    /// Server-assigned message id, unique within the topic.
    pub message_id: String,
    /// Topic the message was published to.
    pub topic: String,
    /// Optional routing tag.
    pub tag: Option<String>,
    /// Undecoded message payload.
    pub body: Bytes,
    /// Opaque server token echoed back on ack/nack/forward for this
    /// delivery. A new token is issued on every redelivery.
    pub receipt_handle: String,
    /// 1-based counter of delivery attempts, incremented by the broker on
    /// every redelivery.
    pub delivery_attempt: i32,
}

impl MessageView {
    /// Payload size in bytes, as accounted by the flow-control cache.
    #[inline]
    pub fn body_size(&self) -> usize {
        self.body.len()
    }
}
