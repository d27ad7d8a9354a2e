//! Service lifecycle state machine.
//!
//! Every long-lived component (the client manager, each consumer) carries
//! one [`StateMachine`]. Transitions are compare-and-swap operations, so a
//! repeated start or stop is an observable no-op rather than an error.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle states of a long-lived component.
///
/// Legal progression: `Ready → Starting → Started → Stopping → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceState {
    /// Constructed, not yet started.
    Ready = 0,
    /// Start in progress.
    Starting = 1,
    /// Fully operational.
    Started = 2,
    /// Shutdown in progress.
    Stopping = 3,
    /// Fully stopped; terminal.
    Stopped = 4,
}

impl ServiceState {
    fn from_u8(value: u8) -> ServiceState {
        match value {
            0 => ServiceState::Ready,
            1 => ServiceState::Starting,
            2 => ServiceState::Started,
            3 => ServiceState::Stopping,
            _ => ServiceState::Stopped,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Ready => "ready",
            ServiceState::Starting => "starting",
            ServiceState::Started => "started",
            ServiceState::Stopping => "stopping",
            ServiceState::Stopped => "stopped",
        };
        write!(f, "{name}")
    }
}

/// Atomic holder of a component's [`ServiceState`].
#[derive(Debug)]
pub struct StateMachine(AtomicU8);

impl StateMachine {
    /// A machine in the `Ready` state.
    pub fn new() -> Self {
        StateMachine(AtomicU8::new(ServiceState::Ready as u8))
    }

    /// Current state.
    pub fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Attempt `from → to`; returns whether the swap happened.
    ///
    /// A failed transition leaves the state untouched, which is what makes
    /// repeated start/stop calls idempotent.
    pub fn transition(&self, from: ServiceState, to: ServiceState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Whether the component is fully operational.
    pub fn is_started(&self) -> bool {
        self.state() == ServiceState::Started
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
