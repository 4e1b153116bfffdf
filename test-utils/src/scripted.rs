//! Scripted embedded runtime.
//!
//! Walks the same boot phases as the web runtime without binding a socket,
//! and lets a test choose where the boot fails and what it announces.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use servlite::{
    BootHooks, BootPhase, EmbeddedRuntime, LoggingPipeline, ReadyEvent, RunContext,
    RuntimeFactory, ServiceOptions, ServliteError, ServliteResult,
};

/// What the next runtime created by a [`ScriptedFactory`] does.
#[derive(Debug, Clone)]
pub struct Script {
    /// Port announced at readiness.
    pub port: u16,
    /// Fail right before firing this phase.
    pub fail_at: Option<BootPhase>,
    /// Fail after readiness was announced.
    pub fail_after_ready: bool,
    /// Return from boot without announcing readiness.
    pub skip_ready: bool,
    /// Announce readiness a second time with this port.
    pub duplicate_ready: Option<u16>,
    /// Empty the log root after `EnvironmentPrepared`, like the web runtime.
    pub reconfigure_logging: bool,
    /// Logged from a named worker thread after `ContextInitialized`, before readiness.
    pub worker_log: Option<String>,
    /// Sleep before the first phase.
    pub boot_delay: Duration,
    /// Sleep between readiness and returning from boot.
    pub ready_delay: Duration,
    /// Sleep inside shutdown.
    pub shutdown_delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            port: 8080,
            fail_at: None,
            fail_after_ready: false,
            skip_ready: false,
            duplicate_ready: None,
            reconfigure_logging: true,
            worker_log: None,
            boot_delay: Duration::ZERO,
            ready_delay: Duration::ZERO,
            shutdown_delay: Duration::ZERO,
        }
    }
}

/// Name of the thread emitting [`Script::worker_log`].
pub const WORKER_THREAD: &str = "scripted-worker";

#[derive(Clone, Default)]
pub struct ScriptedFactory {
    script: Arc<Mutex<Script>>,
    created: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            ..Default::default()
        }
    }

    /// Replace the script used by subsequently created runtimes.
    pub fn set_script(&self, script: Script) {
        *self.script.lock() = script;
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl RuntimeFactory for ScriptedFactory {
    fn create(
        &self,
        _options: &ServiceOptions,
        context: RunContext,
    ) -> ServliteResult<Box<dyn EmbeddedRuntime>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedRuntime {
            script: self.script.lock().clone(),
            context,
            hooks: BootHooks::new(),
            shutdowns: Arc::clone(&self.shutdowns),
            booted: false,
        }))
    }
}

struct ScriptedRuntime {
    script: Script,
    context: RunContext,
    hooks: BootHooks,
    shutdowns: Arc<AtomicUsize>,
    booted: bool,
}

impl ScriptedRuntime {
    fn phase(&mut self, phase: BootPhase) -> ServliteResult<()> {
        if self.script.fail_at == Some(phase) {
            return Err(ServliteError::BootFailure(format!(
                "scripted failure at {}",
                phase
            )));
        }
        self.hooks.fire(phase, &self.context)
    }
}

impl EmbeddedRuntime for ScriptedRuntime {
    fn hooks(&mut self) -> &mut BootHooks {
        &mut self.hooks
    }

    fn boot(&mut self) -> ServliteResult<()> {
        if !self.script.boot_delay.is_zero() {
            thread::sleep(self.script.boot_delay);
        }

        self.phase(BootPhase::Starting)?;
        self.phase(BootPhase::EnvironmentPrepared)?;
        if self.script.reconfigure_logging
            && let Some(pipeline) = self.context.get::<LoggingPipeline>()
        {
            pipeline.reconfigure("info")?;
        }
        self.phase(BootPhase::ContextInitialized)?;
        self.booted = true;

        if let Some(message) = self.script.worker_log.clone() {
            thread::Builder::new()
                .name(WORKER_THREAD.to_string())
                .spawn(move || tracing::info!(target: "servlite::scripted", "{}", message))?
                .join()
                .map_err(|_| ServliteError::Internal("scripted worker panicked".into()))?;
        }

        if self.script.skip_ready {
            return Ok(());
        }
        self.hooks.fire_ready(ReadyEvent {
            port: self.script.port,
        })?;
        if let Some(port) = self.script.duplicate_ready {
            self.hooks.fire_ready(ReadyEvent { port })?;
        }

        if !self.script.ready_delay.is_zero() {
            thread::sleep(self.script.ready_delay);
        }
        if self.script.fail_after_ready {
            return Err(ServliteError::BootFailure(
                "scripted failure after readiness".into(),
            ));
        }
        Ok(())
    }

    fn shutdown(&mut self, _timeout: Duration) -> ServliteResult<()> {
        if std::mem::take(&mut self.booted) {
            if !self.script.shutdown_delay.is_zero() {
                thread::sleep(self.script.shutdown_delay);
            }
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
