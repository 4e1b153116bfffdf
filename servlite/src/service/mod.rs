//! Service lifecycle controller.
//!
//! Owns at most one embedded runtime at a time and exposes start/stop to the
//! operator surface. Start and stop block the caller; use
//! [`spawn_start`](ServiceLifecycleController::spawn_start) and
//! [`spawn_stop`](ServiceLifecycleController::spawn_stop) from a thread that
//! must stay responsive.

mod guard;
mod listener;
mod metrics;
mod state;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use servlite_shared::constants::{logging::LIFECYCLE_TARGET, threads};
use servlite_shared::errors::{ServliteError, ServliteResult};

use crate::context::RunContext;
use crate::logging::{LogBridge, LoggingPipeline};
use crate::port::PortHandoff;
use crate::runtime::{EmbeddedRuntime, ReadyEvent, RuntimeFactory, ServiceOptions};

use guard::StartGuard;
use metrics::LifecycleMetricsStorage;
use state::StateCell;

pub use listener::SinkReattachListener;
pub use metrics::LifecycleMetrics;
pub use state::ServiceState;

/// Identifies one successful run. Required to stop it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ServiceHandle {
    run_id: u64,
    port: u16,
}

impl ServiceHandle {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Port the run's listener is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub state: ServiceState,
    /// Last published port, 0 if no run ever booted.
    pub port: u16,
    pub run_id: Option<u64>,
    pub app_name: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

struct ActiveRun {
    handle: ServiceHandle,
    runtime: Box<dyn EmbeddedRuntime>,
    options: ServiceOptions,
    started_at: DateTime<Utc>,
}

pub(crate) struct ControllerInner {
    factory: Arc<dyn RuntimeFactory>,
    bridge: LogBridge,
    port: Arc<PortHandoff>,
    state: Arc<StateCell>,
    /// Held for the whole boot, so stop() never observes a half-started run.
    active: Mutex<Option<ActiveRun>>,
    next_run: AtomicU64,
    metrics: LifecycleMetricsStorage,
}

/// Start/stop controller for the embedded service.
///
/// **Cloning**: cheap, all clones drive the same service.
#[derive(Clone)]
pub struct ServiceLifecycleController {
    inner: Arc<ControllerInner>,
}

impl ServiceLifecycleController {
    pub fn new<F: RuntimeFactory>(factory: F, bridge: LogBridge) -> Self {
        Self::with_shared_factory(Arc::new(factory), bridge)
    }

    pub fn with_shared_factory(factory: Arc<dyn RuntimeFactory>, bridge: LogBridge) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                factory,
                bridge,
                port: Arc::new(PortHandoff::new()),
                state: Arc::new(StateCell::new(ServiceState::Stopped)),
                active: Mutex::new(None),
                next_run: AtomicU64::new(1),
                metrics: LifecycleMetricsStorage::default(),
            }),
        }
    }

    // ========================================================================
    // START
    // ========================================================================

    /// Boot a new runtime with `options` and block until it is ready.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if the service is not `Stopped`. No side effects.
    /// - `Config` if `options` are invalid. No side effects.
    /// - `BootFailure` if the runtime fails to boot or returns without
    ///   announcing readiness. The controller is back to `Stopped`.
    pub fn start(&self, options: ServiceOptions) -> ServliteResult<ServiceHandle> {
        options.validate()?;

        let inner = &*self.inner;
        if let Err(actual) = inner
            .state
            .transition(ServiceState::Stopped, ServiceState::Starting)
        {
            inner.metrics.rejections.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(target: LIFECYCLE_TARGET, state = %actual, "start() rejected");
            return Err(ServliteError::AlreadyRunning(format!("service is {}", actual)));
        }

        inner.metrics.starts.fetch_add(1, Ordering::Relaxed);
        let run_id = inner.next_run.fetch_add(1, Ordering::Relaxed);
        // Declared before the guard so the rollback runs under the lock.
        let mut active = inner.active.lock();
        let mut guard = StartGuard::new(inner, run_id, options.shutdown_timeout);

        tracing::info!(
            target: LIFECYCLE_TARGET,
            run_id,
            host = %options.host,
            port = options.port,
            "Starting service"
        );

        inner.port.reset();
        let context = RunContext::builder()
            .with(Arc::clone(&inner.port))
            .with(Arc::new(inner.bridge.pipeline().clone()))
            .with(Arc::new(options.clone()))
            .build();

        let mut runtime = inner.factory.create(&options, context)?;
        runtime
            .hooks()
            .subscribe(SinkReattachListener::new(inner.bridge.clone()));
        let state = Arc::clone(&inner.state);
        let port = Arc::clone(&inner.port);
        runtime
            .hooks()
            .on_ready(move |event: &ReadyEvent| on_ready(&state, &port, event));
        guard.set_runtime(runtime);

        if let Some(runtime) = guard.runtime() {
            runtime.boot().map_err(into_boot_failure)?;
        }

        if !inner.port.is_published() {
            return Err(ServliteError::BootFailure(
                "runtime finished booting without announcing a bound port".into(),
            ));
        }

        let runtime = guard
            .take_runtime()
            .ok_or_else(|| ServliteError::Internal("runtime missing after boot".into()))?;
        let handle = ServiceHandle {
            run_id,
            port: inner.port.read(),
        };
        *active = Some(ActiveRun {
            handle,
            runtime,
            options,
            started_at: Utc::now(),
        });
        guard.disarm();

        tracing::info!(target: LIFECYCLE_TARGET, run_id, port = handle.port, "Service started");
        Ok(handle)
    }

    /// Run [`start`](Self::start) on a named background thread and hand the
    /// outcome to `on_done`.
    pub fn spawn_start<F>(&self, options: ServiceOptions, on_done: F) -> ServliteResult<JoinHandle<()>>
    where
        F: FnOnce(ServliteResult<ServiceHandle>) + Send + 'static,
    {
        let controller = self.clone();
        let handle = thread::Builder::new()
            .name(threads::STARTER.to_string())
            .spawn(move || on_done(controller.start(options)))?;
        Ok(handle)
    }

    // ========================================================================
    // STOP
    // ========================================================================

    /// Shut down the run identified by `handle` and block until it is gone.
    ///
    /// # Errors
    ///
    /// - `NotRunning` if the service is not `Running`. No side effects.
    /// - `InvalidArgument` if `handle` belongs to an earlier run. The current
    ///   run keeps running.
    pub fn stop(&self, handle: ServiceHandle) -> ServliteResult<()> {
        let inner = &*self.inner;
        if let Err(actual) = inner
            .state
            .transition(ServiceState::Running, ServiceState::Stopping)
        {
            inner.metrics.rejections.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(target: LIFECYCLE_TARGET, state = %actual, "stop() rejected");
            return Err(ServliteError::NotRunning(format!("service is {}", actual)));
        }

        let run = {
            let mut active = inner.active.lock();
            match active.take() {
                Some(run) if run.handle == handle => run,
                Some(run) => {
                    let current = run.handle.run_id;
                    *active = Some(run);
                    let _ = inner
                        .state
                        .transition(ServiceState::Stopping, ServiceState::Running);
                    return Err(ServliteError::InvalidArgument(format!(
                        "handle for run {} is stale, current run is {}",
                        handle.run_id, current
                    )));
                }
                // A start that failed after readiness has already rolled back.
                None => {
                    let _ = inner
                        .state
                        .transition(ServiceState::Stopping, ServiceState::Stopped);
                    return Err(ServliteError::NotRunning(
                        "service has no active run".into(),
                    ));
                }
            }
        };

        tracing::info!(target: LIFECYCLE_TARGET, run_id = handle.run_id, "Stopping service");
        let ActiveRun {
            mut runtime,
            options,
            ..
        } = run;
        let result = runtime.shutdown(options.shutdown_timeout);
        drop(runtime);

        if let Err(actual) = inner
            .state
            .transition(ServiceState::Stopping, ServiceState::Stopped)
        {
            tracing::warn!(target: LIFECYCLE_TARGET, state = %actual, "Unexpected state after stop");
        }
        inner.metrics.stops.fetch_add(1, Ordering::Relaxed);

        match &result {
            Ok(()) => tracing::info!(target: LIFECYCLE_TARGET, run_id = handle.run_id, "Service stopped"),
            Err(e) => tracing::warn!(
                target: LIFECYCLE_TARGET,
                run_id = handle.run_id,
                "Service stopped with error: {}",
                e
            ),
        }
        result
    }

    /// Run [`stop`](Self::stop) on a named background thread and hand the
    /// outcome to `on_done`.
    pub fn spawn_stop<F>(&self, handle: ServiceHandle, on_done: F) -> ServliteResult<JoinHandle<()>>
    where
        F: FnOnce(ServliteResult<()>) + Send + 'static,
    {
        let controller = self.clone();
        let join = thread::Builder::new()
            .name(threads::STOPPER.to_string())
            .spawn(move || on_done(controller.stop(handle)))?;
        Ok(join)
    }

    /// Stop the current run, if any. Used on process exit.
    pub fn shutdown(&self) -> ServliteResult<bool> {
        let Some(handle) = self.handle() else {
            return Ok(false);
        };
        match self.stop(handle) {
            Ok(()) => Ok(true),
            Err(e) if e.is_rejection() => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn state(&self) -> ServiceState {
        self.inner.state.get()
    }

    /// Last published port, delegating to the port hand-off.
    ///
    /// [`UNSET_PORT`](crate::port::UNSET_PORT) before the first successful
    /// boot. After a stop, and while the next run boots, the previous run's
    /// port is still returned.
    pub fn current_port(&self) -> u16 {
        self.inner.port.read()
    }

    /// Handle of the active run. `None` while a start is in progress.
    pub fn handle(&self) -> Option<ServiceHandle> {
        self.inner
            .active
            .try_lock()
            .and_then(|active| active.as_ref().map(|run| run.handle))
    }

    pub fn status(&self) -> ServiceStatus {
        let state = self.state();
        let port = self.current_port();
        let active = self.inner.active.try_lock();
        let run = active.as_deref().and_then(Option::as_ref);
        ServiceStatus {
            state,
            port,
            run_id: run.map(|r| r.handle.run_id),
            app_name: run.map(|r| r.options.app_name.clone()),
            started_at: run.map(|r| r.started_at),
        }
    }

    pub fn bridge(&self) -> &LogBridge {
        &self.inner.bridge
    }

    pub fn pipeline(&self) -> &LoggingPipeline {
        self.inner.bridge.pipeline()
    }

    pub fn metrics(&self) -> LifecycleMetrics {
        LifecycleMetrics::new(self.inner.metrics.clone())
    }
}

/// Readiness handler: publish the port, then mark the run `Running`.
///
/// Ignores duplicate readiness and readiness outside `Starting`.
fn on_ready(state: &StateCell, port: &PortHandoff, event: &ReadyEvent) {
    if state.get() != ServiceState::Starting {
        tracing::warn!(
            target: LIFECYCLE_TARGET,
            port = event.port,
            state = %state.get(),
            "Ignoring readiness outside of start"
        );
        return;
    }

    if port.publish(event.port) {
        let _ = state.transition(ServiceState::Starting, ServiceState::Running);
        tracing::info!(target: LIFECYCLE_TARGET, port = event.port, "Service ready");
    }
}

fn into_boot_failure(err: ServliteError) -> ServliteError {
    match err {
        ServliteError::BootFailure(_) => err,
        other => ServliteError::BootFailure(other.to_string()),
    }
}
