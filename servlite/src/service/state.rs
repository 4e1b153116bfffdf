//! Service lifecycle state machine.
//!
//! ```text
//! Stopped ──start()──→ Starting ──ready──→ Running ──stop()──→ Stopping ──→ Stopped
//!                         │                 │
//!                         └──boot failed────┴──→ Stopped
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Lifecycle state of the embedded service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ServiceState {
    /// No runtime exists. `start()` is accepted.
    Stopped = 0,

    /// A runtime is booting; readiness has not been observed.
    Starting = 1,

    /// Readiness observed, the port is published.
    Running = 2,

    /// Shutdown in progress (transient).
    Stopping = 3,
}

impl ServiceState {
    pub fn can_start(&self) -> bool {
        matches!(self, ServiceState::Stopped)
    }

    pub fn can_stop(&self) -> bool {
        matches!(self, ServiceState::Running)
    }

    /// Starting and Stopping are transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceState::Starting | ServiceState::Stopping)
    }

    /// Check if transition to target state is valid.
    pub fn can_transition_to(&self, target: ServiceState) -> bool {
        use ServiceState::*;
        matches!(
            (self, target),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                // boot failed after readiness
                | (Running, Stopped)
                | (Stopping, Stopped)
                // stop() aborted (stale handle)
                | (Stopping, Running)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Stopped => "stopped",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Stopping => "stopping",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ServiceState::Starting,
            2 => ServiceState::Running,
            3 => ServiceState::Stopping,
            _ => ServiceState::Stopped,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic cell holding a [`ServiceState`].
///
/// Every change goes through [`transition`](Self::transition), so two
/// concurrent callers can never both leave the same state.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: ServiceState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> ServiceState {
        ServiceState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Roll a failed start back to `Stopped`.
    ///
    /// Only leaves states a run can own (`Starting`, `Running`, `Stopping`).
    /// Returns the state that was left, or `None` if already `Stopped`.
    pub(crate) fn roll_back(&self) -> Option<ServiceState> {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |raw| {
                let current = ServiceState::from_u8(raw);
                (current != ServiceState::Stopped).then_some(ServiceState::Stopped as u8)
            })
            .ok()
            .map(ServiceState::from_u8)
    }

    /// Move from `from` to `to`. Returns the actual state on mismatch.
    pub(crate) fn transition(&self, from: ServiceState, to: ServiceState) -> Result<(), ServiceState> {
        debug_assert!(from.can_transition_to(to), "invalid transition {from} -> {to}");
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(ServiceState::from_u8)
    }
}
