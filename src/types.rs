//! Type-safe wrappers for client-protocol primitives.
//!
//! These newtypes prevent mixing up identifiers that share an underlying
//! representation but carry different semantic meanings (a client id is not
//! an attempt id, a broker id is not a queue index).

use std::fmt;

use uuid::Uuid;

/// Unique identifier of one client instance within a process.
///
/// Generated once per producer/consumer instance and used as the key in the
/// observer registry and in every request that identifies the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a fresh, process-unique client id.
    pub fn generate() -> Self {
        ClientId(format!("flowmq.{}", Uuid::new_v4()))
    }

    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        ClientId(id.into())
    }

    /// Get the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        ClientId(value.to_string())
    }
}

/// Identifier of one logical receive attempt.
///
/// The broker uses the attempt id to detect duplicate redelivery attempts:
/// a timed-out long poll is retried with the *same* id, while a completed
/// cycle generates a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttemptId(String);

impl AttemptId {
    /// Generate a fresh attempt id.
    pub fn generate() -> Self {
        AttemptId(Uuid::new_v4().to_string())
    }

    /// Get the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A broker replica identifier within a partition's replica group.
///
/// The primary replica always carries id 0; higher ids are standby replicas
/// that serve as routing metadata only and are never consumed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BrokerId(pub u32);

impl BrokerId {
    /// Id of the primary (consumable) replica.
    pub const PRIMARY: Self = BrokerId(0);

    /// Create a new broker id from a raw value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        BrokerId(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Whether this replica is the primary for its partition.
    #[inline]
    pub const fn is_primary(self) -> bool {
        self.0 == Self::PRIMARY.0
    }
}

impl From<u32> for BrokerId {
    fn from(value: u32) -> Self {
        BrokerId(value)
    }
}

impl fmt::Display for BrokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
