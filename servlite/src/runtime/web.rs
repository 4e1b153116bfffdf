//! Production runtime: a tokio multi-thread executor serving axum routes.

use std::time::{Duration, Instant};

use servlite_shared::constants::threads;
use servlite_shared::errors::{ServliteError, ServliteResult};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::hooks::{BootHooks, BootPhase, ReadyEvent};
use super::options::ServiceOptions;
use super::routes;
use super::{EmbeddedRuntime, RuntimeFactory};
use crate::context::RunContext;
use crate::logging::LoggingPipeline;

/// Server state that only exists after a successful bind.
struct LiveServer {
    executor: Runtime,
    shutdown_tx: oneshot::Sender<()>,
    server: JoinHandle<std::io::Result<()>>,
    port: u16,
}

/// Embedded HTTP service.
///
/// Boot sequence:
/// 1. `Starting`
/// 2. build the executor, then `EnvironmentPrepared`
/// 3. reconfigure logging (empties the log root), then `ContextInitialized`
/// 4. bind the listener, spawn the server, then readiness
pub struct WebRuntime {
    options: ServiceOptions,
    context: RunContext,
    hooks: BootHooks,
    live: Option<LiveServer>,
}

impl WebRuntime {
    pub fn new(options: ServiceOptions, context: RunContext) -> Self {
        Self {
            options,
            context,
            hooks: BootHooks::new(),
            live: None,
        }
    }

    /// Bound port while the server is up.
    pub fn port(&self) -> Option<u16> {
        self.live.as_ref().map(|live| live.port)
    }

    fn build_executor(&self) -> ServliteResult<Runtime> {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.options.worker_threads)
            .thread_name(threads::WORKER)
            .enable_all()
            .build()
            .map_err(|e| ServliteError::BootFailure(format!("failed to build executor: {}", e)))
    }
}

impl EmbeddedRuntime for WebRuntime {
    fn hooks(&mut self) -> &mut BootHooks {
        &mut self.hooks
    }

    fn boot(&mut self) -> ServliteResult<()> {
        if self.live.is_some() {
            return Err(ServliteError::Internal("runtime already booted".into()));
        }

        self.hooks.fire(BootPhase::Starting, &self.context)?;
        let addr = self.options.socket_addr()?;
        let executor = self.build_executor()?;

        self.hooks.fire(BootPhase::EnvironmentPrepared, &self.context)?;
        if let Some(pipeline) = self.context.get::<LoggingPipeline>() {
            pipeline.reconfigure(&self.options.log_filter)?;
        }
        self.hooks.fire(BootPhase::ContextInitialized, &self.context)?;

        let listener = executor
            .block_on(TcpListener::bind(addr))
            .map_err(|e| ServliteError::BootFailure(format!("failed to bind {}: {}", addr, e)))?;
        let port = listener.local_addr()?.port();

        let app = routes::router(self.context.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = executor.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tracing::info!(%addr, port, "Embedded web server listening");
        self.live = Some(LiveServer {
            executor,
            shutdown_tx,
            server,
            port,
        });

        self.hooks.fire_ready(ReadyEvent { port })
    }

    fn shutdown(&mut self, timeout: Duration) -> ServliteResult<()> {
        let Some(LiveServer {
            executor,
            shutdown_tx,
            server,
            port,
        }) = self.live.take()
        else {
            return Ok(());
        };

        // One budget for draining the server and tearing down the executor
        let deadline = Instant::now() + timeout;
        let _ = shutdown_tx.send(());
        let outcome = executor.block_on(async { tokio::time::timeout(timeout, server).await });
        match outcome {
            Ok(Ok(Ok(()))) => tracing::debug!(port, "Web server drained"),
            Ok(Ok(Err(e))) => tracing::warn!(port, error = %e, "Web server exited with error"),
            Ok(Err(e)) => tracing::warn!(port, error = %e, "Web server task failed"),
            Err(_) => tracing::warn!(
                port,
                timeout_secs = timeout.as_secs(),
                "Graceful shutdown timed out, abandoning in-flight requests"
            ),
        }

        executor.shutdown_timeout(deadline.saturating_duration_since(Instant::now()));
        tracing::info!(port, "Embedded web server stopped");
        Ok(())
    }
}

impl Drop for WebRuntime {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            let _ = live.shutdown_tx.send(());
            live.executor.shutdown_background();
        }
    }
}

/// Factory producing a [`WebRuntime`] per run.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebRuntimeFactory;

impl RuntimeFactory for WebRuntimeFactory {
    fn create(
        &self,
        options: &ServiceOptions,
        context: RunContext,
    ) -> ServliteResult<Box<dyn EmbeddedRuntime>> {
        options.validate()?;
        Ok(Box::new(WebRuntime::new(options.clone(), context)))
    }
}
