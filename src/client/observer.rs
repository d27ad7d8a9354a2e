//! Observer capability registered with the client manager.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ClientId;

/// A registered client instance driven by the shared background scheduler.
///
/// Every producer/consumer registers one observer; the manager's periodic
/// rounds fan out to the registered set. Each callback failure is isolated
/// to its observer: the manager logs it and continues the round for the
/// others, so implementations should return errors rather than panic.
#[async_trait]
pub trait ClientObserver: Send + Sync {
    /// Stable identifier of this client instance; the registry key.
    fn client_id(&self) -> &ClientId;

    /// Probe the brokers this client talks to.
    async fn on_health_check(&self) -> Result<()>;

    /// Send one heartbeat round to keep group membership alive.
    async fn on_heartbeat(&self) -> Result<()>;

    /// Log a snapshot of this client's counters.
    async fn on_stats(&self) -> Result<()>;
}
