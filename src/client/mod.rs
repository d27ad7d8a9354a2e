//! Connection-and-liveness layer shared by all client instances.
//!
//! The [`ClientManager`] owns the per-endpoint connection pool and the
//! background scheduler; individual producers and consumers register as
//! [`ClientObserver`]s and are driven by its periodic rounds.

mod connection;
mod endpoint;
mod manager;
mod observer;
mod scheduler;
mod state;

pub use connection::RpcConnection;
pub use endpoint::{AddressScheme, Endpoint};
pub use manager::ClientManager;
pub use observer::ClientObserver;
pub use scheduler::{TaskRegistry, TaskStatus};
pub use state::{ServiceState, StateMachine};
