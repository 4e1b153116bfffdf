//! Boot listener that re-attaches the log sink once the runtime's logging
//! reset is done.

use servlite_shared::errors::ServliteResult;

use crate::logging::LogBridge;
use crate::runtime::{BootEvent, BootPhase, PhaseHook};

/// Re-registers the bridge's forwarder at `ContextInitialized`.
///
/// The embedded runtime empties the log root while it boots. This hook fires
/// after that reset and before readiness, so the consumer receives every
/// record from readiness onwards.
pub struct SinkReattachListener {
    bridge: LogBridge,
}

impl SinkReattachListener {
    pub fn new(bridge: LogBridge) -> Self {
        Self { bridge }
    }
}

impl PhaseHook for SinkReattachListener {
    fn phase(&self) -> BootPhase {
        BootPhase::ContextInitialized
    }

    fn on_phase(&self, event: &BootEvent<'_>) -> ServliteResult<()> {
        if !self.bridge.has_sink() {
            tracing::debug!(phase = %event.phase, "No log sink to re-attach");
            return Ok(());
        }
        let sink = self.bridge.reattach()?;
        tracing::debug!(phase = %event.phase, sink, "Log sink re-attached");
        Ok(())
    }
}
