//! Typed boot-phase subscriptions.
//!
//! Boot phases are an ordered enum instead of event classes, and hooks declare
//! the one phase they care about. `BootHooks` fires phases strictly in order and
//! refuses to announce readiness before `ContextInitialized`, so anything hooked
//! on that phase always runs before the readiness observers.

use std::fmt;

use serde::Serialize;
use servlite_shared::errors::{ServliteError, ServliteResult};

use crate::context::RunContext;

/// Named point within the embedded runtime's startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootPhase {
    /// Boot entry point called, nothing initialized yet.
    Starting,

    /// Options resolved, executor built. Logging has not been reconfigured.
    EnvironmentPrepared,

    /// Cross-cutting subsystems (logging, context wiring) are settled.
    /// The listener is not bound yet.
    ContextInitialized,
}

impl BootPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootPhase::Starting => "starting",
            BootPhase::EnvironmentPrepared => "environment_prepared",
            BootPhase::ContextInitialized => "context_initialized",
        }
    }
}

impl fmt::Display for BootPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Passed to phase hooks.
#[derive(Debug)]
pub struct BootEvent<'a> {
    pub phase: BootPhase,
    pub context: &'a RunContext,
}

/// One-time signal that the service accepts connections on `port`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyEvent {
    pub port: u16,
}

/// Hook subscribed to exactly one boot phase.
pub trait PhaseHook: Send + Sync + 'static {
    /// The phase this hook fires on. Other phases never reach it.
    fn phase(&self) -> BootPhase;

    /// Called when the runtime reaches [`phase`](Self::phase).
    /// An error aborts the boot.
    fn on_phase(&self, event: &BootEvent<'_>) -> ServliteResult<()>;
}

/// Observer of the readiness event.
pub trait ReadyObserver: Send + Sync + 'static {
    fn on_ready(&self, event: &ReadyEvent);
}

impl<F> ReadyObserver for F
where
    F: Fn(&ReadyEvent) + Send + Sync + 'static,
{
    fn on_ready(&self, event: &ReadyEvent) {
        self(event)
    }
}

struct FnHook<F> {
    phase: BootPhase,
    f: F,
}

impl<F> PhaseHook for FnHook<F>
where
    F: Fn(&BootEvent<'_>) -> ServliteResult<()> + Send + Sync + 'static,
{
    fn phase(&self) -> BootPhase {
        self.phase
    }

    fn on_phase(&self, event: &BootEvent<'_>) -> ServliteResult<()> {
        (self.f)(event)
    }
}

/// Registry of boot hooks owned by one runtime instance.
#[derive(Default)]
pub struct BootHooks {
    hooks: Vec<Box<dyn PhaseHook>>,
    observers: Vec<Box<dyn ReadyObserver>>,
    reached: Option<BootPhase>,
}

impl BootHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<H: PhaseHook>(&mut self, hook: H) {
        self.hooks.push(Box::new(hook));
    }

    /// Subscribe a closure to `phase`.
    pub fn on_phase<F>(&mut self, phase: BootPhase, f: F)
    where
        F: Fn(&BootEvent<'_>) -> ServliteResult<()> + Send + Sync + 'static,
    {
        self.subscribe(FnHook { phase, f });
    }

    pub fn on_ready<O: ReadyObserver>(&mut self, observer: O) {
        self.observers.push(Box::new(observer));
    }

    /// Latest phase fired so far.
    pub fn reached(&self) -> Option<BootPhase> {
        self.reached
    }

    /// Fire `phase` to the hooks subscribed to it.
    ///
    /// # Errors
    ///
    /// Fails if `phase` does not come after the last fired phase, or with the
    /// first error returned by a hook.
    pub fn fire(&mut self, phase: BootPhase, context: &RunContext) -> ServliteResult<()> {
        if let Some(reached) = self.reached
            && phase <= reached
        {
            return Err(ServliteError::Internal(format!(
                "boot phase {} fired after {}",
                phase, reached
            )));
        }
        self.reached = Some(phase);
        tracing::debug!(phase = %phase, "Boot phase reached");

        let event = BootEvent { phase, context };
        for hook in self.hooks.iter().filter(|hook| hook.phase() == phase) {
            hook.on_phase(&event)?;
        }
        Ok(())
    }

    /// Announce readiness to every observer.
    ///
    /// # Errors
    ///
    /// Fails if `ContextInitialized` has not been fired yet.
    pub fn fire_ready(&self, event: ReadyEvent) -> ServliteResult<()> {
        if self.reached < Some(BootPhase::ContextInitialized) {
            return Err(ServliteError::Internal(format!(
                "readiness announced before {}",
                BootPhase::ContextInitialized
            )));
        }

        tracing::debug!(port = event.port, "Announcing readiness");
        for observer in &self.observers {
            observer.on_ready(&event);
        }
        Ok(())
    }
}
