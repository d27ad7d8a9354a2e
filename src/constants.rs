//! Centralized protocol and configuration constants.
//!
//! This module consolidates the magic numbers used throughout the flowmq
//! client engine. Having them in one place makes it easier to:
//!
//! - Understand the protocol constraints
//! - Update values consistently
//! - Document the rationale for each constant
//!
//! # Categories
//!
//! - **Scheduler Constants**: periods of the background rounds
//! - **Connection Constants**: pool sizing and idle eviction
//! - **Consumption Constants**: long polling and flow control
//! - **Lite Subscription Constants**: quota and validation limits

// =============================================================================
// Scheduler Constants
// =============================================================================

/// Default health-check round period in seconds.
///
/// Every round fans out to all registered observers, each of which probes
/// the brokers it currently talks to.
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 15;

/// Default heartbeat round period in seconds.
///
/// Heartbeats keep the client registered with every broker it consumes
/// from; missing too many in a row gets the client evicted from its group,
/// so this period is deliberately short relative to the idle sweep.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 10;

/// Default idle-connection sweep period in seconds.
pub const DEFAULT_IDLE_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default stats-logging round period in seconds.
pub const DEFAULT_STATS_INTERVAL_SECS: u64 = 60;

/// Default assignment rescan period in seconds.
///
/// How often a consumer re-resolves its queue assignment and diffs it
/// against the running poll loops.
pub const DEFAULT_SCAN_ASSIGNMENT_INTERVAL_SECS: u64 = 5;

/// Default lite-subscription full-resync period in seconds.
///
/// Each resync declares the complete local lite-topic set to the server,
/// reconciling any drift left by lost partial updates.
pub const DEFAULT_LITE_SYNC_INTERVAL_SECS: u64 = 30;

/// Default bound on waiting for background tasks during shutdown, in seconds.
///
/// Tasks that do not finish within this window are aborted with a loud
/// diagnostic; exceeding it is treated as a defect, not a normal outcome.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// Connection Constants
// =============================================================================

/// Default maximum idle time before a pooled connection is evicted (30 min).
///
/// A connection is idle from the moment its last RPC was issued. The sweep
/// only evicts connections strictly past this threshold, so anything with a
/// recent in-flight call survives the round.
pub const DEFAULT_CONNECTION_MAX_IDLE_SECS: u64 = 30 * 60;

/// Default per-RPC request timeout in seconds.
///
/// Applies to every unary call (route, heartbeat, ack, ...). The long-poll
/// receive path adds the long-polling timeout on top of this.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 3;

// =============================================================================
// Consumption Constants
// =============================================================================

/// Default server-side long-polling wait in seconds.
///
/// The receive call blocks broker-side up to this bound waiting for
/// messages before returning (possibly empty).
pub const DEFAULT_LONG_POLLING_TIMEOUT_SECS: u64 = 20;

/// Default number of messages requested per receive call.
pub const DEFAULT_RECEIVE_BATCH_SIZE: u32 = 32;

/// Default ceiling on locally cached, not-yet-consumed messages.
///
/// When the cache holds this many messages the queue's poll loop suspends
/// until acks/nacks drain it back under the ceiling.
pub const DEFAULT_MAX_CACHED_MESSAGE_COUNT: usize = 1024;

/// Default ceiling on locally cached message bytes (64 MiB).
pub const DEFAULT_MAX_CACHED_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Default pause before re-checking flow control when the cache is full,
/// in milliseconds.
pub const DEFAULT_FLOW_CONTROL_BACKOFF_MS: u64 = 100;

/// Default maximum delivery attempts before a message is forwarded to the
/// dead-letter queue instead of being nacked for redelivery.
pub const DEFAULT_MAX_DELIVERY_ATTEMPTS: i32 = 16;

// =============================================================================
// Lite Subscription Constants
// =============================================================================

/// Default quota on concurrently held lite topics.
///
/// The authoritative quota is advertised by the server; this is the
/// client-side default used when the deployment does not override it.
pub const DEFAULT_LITE_SUBSCRIPTION_QUOTA: usize = 100;

/// Maximum accepted length of a lite topic name, in bytes.
pub const DEFAULT_MAX_LITE_TOPIC_LENGTH: usize = 255;
