//! Named retry policies for consistent backoff behavior across RPC paths.
//!
//! This module replaces ad-hoc retry loops with standardized policies built
//! on the `backon` crate. Every policy includes jitter to prevent thundering
//! herd against a recovering broker.
//!
//! # Available Policies
//!
//! | Policy | Min Delay | Max Delay | Retries | Use Case |
//! |--------|-----------|-----------|---------|----------|
//! | `route_policy` | 100ms | 5s | 5 | Route/assignment queries |
//! | `heartbeat_policy` | 50ms | 2s | 3 | Heartbeat / health check |
//! | `fast_policy` | 5ms | 100ms | 3 | Hot path retries |
//!
//! Note that the push-consumption loop does not retry through these
//! policies: a failed receive/ack/nack is logged and the loop simply
//! re-enters polling on its own cadence.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

/// Policy for route and assignment queries against the name server.
///
/// Characteristics:
/// - Moderate initial delay (100ms) for network settling
/// - Long max delay (5s) to ride out a name-server restart
/// - Moderate retries (5) before the rescan round gives up until its
///   next tick
pub fn route_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(5)
        .with_jitter()
}

/// Policy for heartbeat and health-check rounds.
///
/// Kept short: the scheduler re-runs the round on its own period, so a
/// round that cannot reach a broker quickly should yield rather than pile
/// retries into the next tick.
pub fn heartbeat_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(3)
        .with_jitter()
}

/// Policy for hot path retries (minimal delay).
pub fn fast_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(5))
        .with_max_delay(Duration::from_millis(100))
        .with_max_times(3)
        .with_jitter()
}

/// Execute an async operation under the route retry policy.
pub async fn with_route_policy<F, Fut, T, E, C>(operation: F, condition: C) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::error::Error,
    C: FnMut(&E) -> bool,
{
    operation.retry(route_policy()).when(condition).await
}

/// Execute an async operation under the heartbeat retry policy.
pub async fn with_heartbeat_policy<F, Fut, T, E, C>(operation: F, condition: C) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::error::Error,
    C: FnMut(&E) -> bool,
{
    operation.retry(heartbeat_policy()).when(condition).await
}
