//! Rollback of a failed `start()`.

use std::sync::atomic::Ordering;
use std::time::Duration;

use super::ControllerInner;
use crate::runtime::EmbeddedRuntime;

/// Restores the controller to `Stopped` if a start does not complete.
///
/// Holds the runtime while it boots so a failure can shut it down. Disarmed
/// and emptied on success. Must be dropped while the caller still holds the
/// `active` lock, so no `stop()` or `start()` can interleave with the rollback.
pub(super) struct StartGuard<'a> {
    inner: &'a ControllerInner,
    run_id: u64,
    runtime: Option<Box<dyn EmbeddedRuntime>>,
    shutdown_timeout: Duration,
    armed: bool,
}

impl<'a> StartGuard<'a> {
    pub(super) fn new(inner: &'a ControllerInner, run_id: u64, shutdown_timeout: Duration) -> Self {
        Self {
            inner,
            run_id,
            runtime: None,
            shutdown_timeout,
            armed: true,
        }
    }

    pub(super) fn set_runtime(&mut self, runtime: Box<dyn EmbeddedRuntime>) {
        self.runtime = Some(runtime);
    }

    pub(super) fn runtime(&mut self) -> Option<&mut Box<dyn EmbeddedRuntime>> {
        self.runtime.as_mut()
    }

    /// Take ownership of the runtime (success path).
    pub(super) fn take_runtime(&mut self) -> Option<Box<dyn EmbeddedRuntime>> {
        self.runtime.take()
    }

    /// After disarming, Drop will not roll back.
    pub(super) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        if let Some(mut runtime) = self.runtime.take()
            && let Err(e) = runtime.shutdown(self.shutdown_timeout)
        {
            tracing::warn!(run_id = self.run_id, "Failed to shut down runtime during rollback: {}", e);
        }

        // The runtime may have emptied the log root before failing.
        let bridge = &self.inner.bridge;
        if bridge.has_sink()
            && bridge.active().is_none()
            && let Err(e) = bridge.reattach()
        {
            tracing::warn!("Failed to re-attach log sink during rollback: {}", e);
        }
        tracing::warn!(run_id = self.run_id, "Service start failed, rolled back");

        if self.inner.state.roll_back().is_none() {
            tracing::warn!(run_id = self.run_id, "Rollback found the service already stopped");
        }
        self.inner
            .metrics
            .boot_failures
            .fetch_add(1, Ordering::Relaxed);
    }
}
