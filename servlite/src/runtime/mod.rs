//! Embedded runtime abstraction.
//!
//! The lifecycle controller never talks to a web server directly. It asks a
//! [`RuntimeFactory`] for a fresh [`EmbeddedRuntime`] per run, subscribes its
//! hooks, and drives `boot` / `shutdown`. [`WebRuntime`] is the production
//! implementation (tokio + axum); tests substitute scripted runtimes.

mod hooks;
mod options;
mod routes;
mod web;

use std::time::Duration;

use servlite_shared::errors::ServliteResult;

use crate::context::RunContext;

pub use hooks::{BootEvent, BootHooks, BootPhase, PhaseHook, ReadyEvent, ReadyObserver};
pub use options::ServiceOptions;
pub use web::{WebRuntime, WebRuntimeFactory};

/// One run of an embedded service.
pub trait EmbeddedRuntime: Send {
    /// Hook registry. Subscriptions must be made before [`boot`](Self::boot).
    fn hooks(&mut self) -> &mut BootHooks;

    /// Bring the service up. Blocks until the runtime is ready or has failed.
    ///
    /// A successful boot fires the readiness event exactly once before
    /// returning.
    fn boot(&mut self) -> ServliteResult<()>;

    /// Stop accepting work and release resources, waiting at most `timeout`
    /// for in-flight requests. Calling it on a runtime that never booted is a
    /// no-op.
    fn shutdown(&mut self, timeout: Duration) -> ServliteResult<()>;
}

/// Creates a fresh runtime for each run.
pub trait RuntimeFactory: Send + Sync + 'static {
    fn create(
        &self,
        options: &ServiceOptions,
        context: RunContext,
    ) -> ServliteResult<Box<dyn EmbeddedRuntime>>;
}
