//! Crate-level error types and server-status translation.
//!
//! # Error Hierarchy
//!
//! The crate uses a single client-facing error enum plus a wire status code:
//!
//! - [`ClientError`]: everything a caller of this SDK can observe, from
//!   synchronous validation failures to wrapped transport errors
//! - [`StatusCode`]: status codes carried in every RPC response
//!
//! # Translation
//!
//! Every RPC response carries a [`Status`](crate::rpc::Status). A non-OK
//! status is translated into a typed [`ClientError`] via [`StatusCode`]'s
//! fixed mapping before the caller's future resolves, so the add/remove/
//! full-sync paths (and every other RPC) share identical error semantics.
//!
//! # Recoverability
//!
//! Transport and status errors are recoverable at the consumption-loop
//! level: the loop logs them and re-enters polling. Validation, quota, and
//! illegal-state errors are raised synchronously to the caller and never
//! retried.

use std::{io, result};

use num_derive::FromPrimitive;
use thiserror::Error as ThisError;

pub type Result<T> = result::Result<T, Error>;

/// Client-facing errors raised by the flowmq engine.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Malformed caller input (blank topic, over-length name, bad address).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A lite-subscription mutation would exceed the server-advertised quota.
    #[error("Lite subscription quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Operation invoked while the component is not in the required state.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Failed to construct a connection for an endpoint.
    #[error("Failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    /// An RPC did not complete within the caller's deadline.
    #[error("Request timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Network-level failure from the transport.
    #[error("Transport error: {0:?}")]
    Transport(io::ErrorKind),

    /// The server answered with a non-OK status code.
    #[error("Server status {code:?}: {message}")]
    Status { code: StatusCode, message: String },
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Transport(e.kind())
    }
}

impl Error {
    /// Whether the consumption loop may absorb this failure and re-poll.
    ///
    /// Transport, timeout, and server-status failures are transient from
    /// the loop's point of view; validation, quota, and state errors are
    /// caller mistakes and propagate instead.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Connect { .. } | Error::Timeout { .. } | Error::Transport(_) | Error::Status { .. }
        )
    }
}

/// Status codes reported by the server in every RPC response.
///
/// The numeric values are part of the wire contract; unknown values decode
/// to `None` via `FromPrimitive` and are surfaced as [`StatusCode::Unknown`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, Default)]
pub enum StatusCode {
    /// An unexpected server error.
    Unknown = -1,
    #[default]
    Ok = 0,
    /// The request referenced a topic the broker does not know.
    TopicNotFound = 1,
    /// The request referenced a consumer group the broker does not know.
    GroupNotFound = 2,
    /// A request field failed server-side validation.
    BadRequest = 3,
    /// The caller is not permitted to perform the operation.
    Forbidden = 4,
    /// The receipt handle in an ack/nack/forward request has expired.
    InvalidReceiptHandle = 5,
    /// The server is shedding load; retry after backoff.
    TooManyRequests = 6,
    /// The request exceeded the server-side processing deadline.
    DeadlineExceeded = 7,
    /// Adding the lite topic would exceed the per-client quota.
    LiteSubscriptionQuotaExceeded = 8,
    /// Internal broker failure.
    InternalServerError = 9,
}

impl StatusCode {
    /// Translate this code into the matching client error kind.
    ///
    /// Returns `Ok(())` for [`StatusCode::Ok`]; every other code maps to a
    /// fixed [`Error`] variant carrying the server's message.
    pub fn check(self, message: impl Into<String>) -> Result<()> {
        match self {
            StatusCode::Ok => Ok(()),
            // The one code with a dedicated error kind: callers match on it
            // to distinguish quota pressure from ordinary request failures.
            StatusCode::LiteSubscriptionQuotaExceeded => Err(Error::QuotaExceeded(message.into())),
            code => Err(Error::Status {
                code,
                message: message.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn test_status_code_from_primitive() {
        assert_eq!(StatusCode::from_i32(-1), Some(StatusCode::Unknown));
        assert_eq!(StatusCode::from_i32(0), Some(StatusCode::Ok));
        assert_eq!(StatusCode::from_i32(1), Some(StatusCode::TopicNotFound));
        assert_eq!(
            StatusCode::from_i32(8),
            Some(StatusCode::LiteSubscriptionQuotaExceeded)
        );
        assert_eq!(StatusCode::from_i32(9), Some(StatusCode::InternalServerError));
    }

    #[test]
    fn test_status_code_unknown_value() {
        assert_eq!(StatusCode::from_i32(999), None);
        assert_eq!(StatusCode::from_i32(-100), None);
    }

    #[test]
    fn test_check_ok_is_ok() {
        assert!(StatusCode::Ok.check("ignored").is_ok());
    }

    #[test]
    fn test_check_quota_code_maps_to_quota_error() {
        let err = StatusCode::LiteSubscriptionQuotaExceeded
            .check("quota exceeded 100")
            .unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded(_)));
    }

    #[test]
    fn test_check_non_ok_is_typed_error() {
        let err = StatusCode::TopicNotFound.check("no such topic").unwrap_err();
        match err {
            Error::Status { code, message } => {
                assert_eq!(code, StatusCode::TopicNotFound);
                assert_eq!(message, "no such topic");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::Timeout { millis: 100 }.is_recoverable());
        assert!(Error::Transport(io::ErrorKind::ConnectionReset).is_recoverable());
        assert!(
            Error::Status {
                code: StatusCode::InternalServerError,
                message: String::new(),
            }
            .is_recoverable()
        );
        assert!(!Error::Validation("blank".into()).is_recoverable());
        assert!(!Error::QuotaExceeded("quota 2".into()).is_recoverable());
        assert!(!Error::IllegalState("not started".into()).is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        match err {
            Error::Transport(kind) => assert_eq!(kind, io::ErrorKind::BrokenPipe),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_display_contains_context() {
        let err = Error::Connect {
            endpoint: "broker-0:8081".into(),
            message: "secure channel setup failed".into(),
        };
        let text = err.to_string();
        assert!(text.contains("broker-0:8081"));
        assert!(text.contains("secure channel"));
    }
}
