//! Process logging pipeline with a replaceable root sink.
//!
//! Every `tracing` event in the process flows through [`RootSinkLayer`], which
//! turns it into a [`LogRecord`] and hands it to whichever [`SinkRegistration`]
//! currently occupies the root slot.
//!
//! ```text
//! tracing::info!() ──→ EnvFilter (reloadable) ──┬──→ fmt layer (stderr)
//!                                               └──→ RootSinkLayer ──→ root slot ──→ forwarder
//! ```
//!
//! The root slot is an `ArcSwapOption`: installing a registration is a single
//! atomic swap, so a re-registration never opens a window where records are
//! lost. [`LoggingPipeline::reconfigure`] is the one operation that empties the
//! slot; it models what an embedded runtime does to logging while it boots.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use servlite_shared::errors::{ServliteError, ServliteResult};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, reload};

use super::bridge::SinkRegistration;
use super::record::LogRecord;

type FilterHandle = reload::Handle<EnvFilter, Registry>;

thread_local! {
    /// Set while a record is being forwarded on this thread. A forwarder that
    /// logs would otherwise recurse into itself.
    static IN_DISPATCH: Cell<bool> = const { Cell::new(false) };
}

/// Cloneable handle to the logging pipeline.
#[derive(Clone, Default)]
pub struct LoggingPipeline {
    inner: Arc<PipelineInner>,
}

#[derive(Default)]
struct PipelineInner {
    root: ArcSwapOption<SinkRegistration>,
    filter: Mutex<Option<FilterHandle>>,
    dropped: AtomicU64,
    global: AtomicBool,
}

impl LoggingPipeline {
    /// Create a detached pipeline (not installed as the global subscriber).
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer feeding this pipeline's root slot.
    pub fn layer(&self) -> RootSinkLayer {
        RootSinkLayer {
            pipeline: self.clone(),
        }
    }

    /// Whether this pipeline backs the process-global subscriber.
    pub fn is_global(&self) -> bool {
        self.inner.global.load(Ordering::Acquire)
    }

    /// Install `registration` at the root, returning the displaced one.
    ///
    /// Single atomic swap: every record is seen by either the old or the new
    /// registration, never by neither.
    pub fn install(&self, registration: Arc<SinkRegistration>) -> Option<Arc<SinkRegistration>> {
        self.inner.root.swap(Some(registration))
    }

    /// Registration currently occupying the root slot.
    pub fn active(&self) -> Option<Arc<SinkRegistration>> {
        self.inner.root.load_full()
    }

    /// Reload the level filter and reset the root slot to its default (empty).
    /// `RUST_LOG` keeps precedence over `filter`, as in [`init`].
    ///
    /// Records emitted after this call and before the next [`install`](Self::install)
    /// are dropped and counted in [`dropped`](Self::dropped).
    pub fn reconfigure(&self, filter: &str) -> ServliteResult<()> {
        tracing::debug!(filter, "Reconfiguring logging pipeline");

        if let Some(handle) = self.inner.filter.lock().as_ref() {
            let env_filter = resolve_filter(env_override(), filter)?;
            handle.reload(env_filter).map_err(|e| {
                ServliteError::Internal(format!("failed to reload log filter: {}", e))
            })?;
        }

        self.inner.root.store(None);
        Ok(())
    }

    /// Number of records that found no registration at the root.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Deliver a record to the active registration.
    pub fn dispatch(&self, record: LogRecord) {
        self.dispatch_with(|| record);
    }

    fn dispatch_with(&self, build: impl FnOnce() -> LogRecord) {
        if IN_DISPATCH.with(Cell::get) {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let root = self.inner.root.load();
        match root.as_ref() {
            Some(registration) => {
                IN_DISPATCH.with(|flag| flag.set(true));
                registration.emit(build());
                IN_DISPATCH.with(|flag| flag.set(false));
            }
            None => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn attach_filter(&self, handle: FilterHandle) {
        *self.inner.filter.lock() = Some(handle);
    }
}

/// `tracing_subscriber` layer that forwards every event to the root slot.
pub struct RootSinkLayer {
    pipeline: LoggingPipeline,
}

impl<S: Subscriber> Layer<S> for RootSinkLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.pipeline.dispatch_with(|| LogRecord::from_event(event));
    }
}

fn env_override() -> Option<String> {
    std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|directives| !directives.trim().is_empty())
}

/// A parseable `RUST_LOG` wins over the requested filter.
fn resolve_filter(env_override: Option<String>, requested: &str) -> ServliteResult<EnvFilter> {
    if let Some(directives) = env_override
        && let Ok(env_filter) = EnvFilter::try_new(&directives)
    {
        return Ok(env_filter);
    }
    EnvFilter::try_new(requested)
        .map_err(|e| ServliteError::Config(format!("invalid log filter '{}': {}", requested, e)))
}

/// Install the process-global subscriber and return its pipeline.
///
/// The subscriber is `registry` + reloadable `EnvFilter` + a `fmt` layer on
/// stderr + the root sink layer. `RUST_LOG` takes precedence over `filter`.
/// Safe to call multiple times; later calls return the first pipeline.
///
/// # Errors
///
/// Fails if `filter` cannot be parsed or if another global subscriber was
/// installed by someone else.
pub fn init(filter: &str) -> ServliteResult<LoggingPipeline> {
    static GLOBAL: OnceLock<LoggingPipeline> = OnceLock::new();
    static INIT_LOCK: Mutex<()> = parking_lot::const_mutex(());

    let _guard = INIT_LOCK.lock();
    if let Some(pipeline) = GLOBAL.get() {
        return Ok(pipeline.clone());
    }

    let env_filter = resolve_filter(env_override(), filter)?;
    let (filter_layer, handle) = reload::Layer::new(env_filter);

    let pipeline = LoggingPipeline::new();
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false),
        )
        .with(pipeline.layer())
        .try_init()
        .map_err(|e| {
            ServliteError::Internal(format!("failed to install global subscriber: {}", e))
        })?;

    pipeline.attach_filter(handle);
    pipeline.inner.global.store(true, Ordering::Release);
    let _ = GLOBAL.set(pipeline.clone());

    tracing::debug!("Logging pipeline initialized");
    Ok(pipeline)
}
