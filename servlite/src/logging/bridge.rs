//! Log bridge between the process logging pipeline and a single consumer.
//!
//! The bridge owns the consumer's forwarder and knows how to (re)install it at
//! the pipeline root. Registering again after the embedded runtime has reset
//! logging is what [`SinkReattachListener`](crate::service::SinkReattachListener)
//! does during boot.

use std::any::Any;
use std::io::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use servlite_shared::errors::{ServliteError, ServliteResult};
use tokio::sync::mpsc;

use super::pipeline::LoggingPipeline;
use super::record::LogRecord;

/// Identifier of one sink registration. Increases with every (re)registration.
pub type SinkId = u64;

/// Terminal recipient of log records.
///
/// Called on the thread that emitted the record. Implementations must not do
/// display work inline; they hand the record to the consumer's own queue.
pub trait LogForwarder: Send + Sync + 'static {
    fn forward(&self, record: LogRecord) -> ServliteResult<()>;
}

impl<F> LogForwarder for F
where
    F: Fn(LogRecord) -> ServliteResult<()> + Send + Sync + 'static,
{
    fn forward(&self, record: LogRecord) -> ServliteResult<()> {
        self(record)
    }
}

/// Forwarder that posts records into an unbounded queue.
///
/// `send` never blocks, so the emitting thread only pays for the enqueue.
/// The receiving side is drained by whoever owns the display.
#[derive(Clone)]
pub struct QueueForwarder {
    tx: mpsc::UnboundedSender<LogRecord>,
}

impl QueueForwarder {
    /// Create a forwarder and the receiver its records land in.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LogRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl LogForwarder for QueueForwarder {
    fn forward(&self, record: LogRecord) -> ServliteResult<()> {
        self.tx
            .send(record)
            .map_err(|_| ServliteError::LogDelivery("display queue closed".into()))
    }
}

// ============================================================================
// SINK REGISTRATION
// ============================================================================

/// One binding of a forwarder into the pipeline root.
///
/// Failures of the forwarder are caught here: they are reported on stderr and
/// counted, and the registration keeps delivering subsequent records.
pub struct SinkRegistration {
    id: SinkId,
    forwarder: Arc<dyn LogForwarder>,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl SinkRegistration {
    pub fn new(id: SinkId, forwarder: Arc<dyn LogForwarder>) -> Self {
        Self {
            id,
            forwarder,
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> SinkId {
        self.id
    }

    /// Records successfully handed to the forwarder.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Records whose forwarding returned an error or panicked.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Forward one record. Never panics and never returns the failure.
    pub fn emit(&self, record: LogRecord) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.forwarder.forward(record)));

        let error = match outcome {
            Ok(Ok(())) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Ok(Err(e)) => e,
            Err(payload) => ServliteError::LogDelivery(format!(
                "forwarder panicked: {}",
                panic_message(payload.as_ref())
            )),
        };

        self.failed.fetch_add(1, Ordering::Relaxed);
        report_fallback(self.id, &error);
    }
}

/// Fallback channel for delivery failures. Deliberately bypasses tracing.
fn report_fallback(id: SinkId, error: &ServliteError) {
    let _ = writeln!(
        std::io::stderr(),
        "[servlite] log delivery failed on sink #{}: {}",
        id,
        error
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

// ============================================================================
// LOG BRIDGE
// ============================================================================

/// Process-wide bridge from the logging pipeline to one consumer.
///
/// **Cloning**: cheap, all clones share the forwarder and the pipeline.
#[derive(Clone)]
pub struct LogBridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    pipeline: LoggingPipeline,
    forwarder: Mutex<Option<Arc<dyn LogForwarder>>>,
    next_id: AtomicU64,
}

impl LogBridge {
    pub fn new(pipeline: LoggingPipeline) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                pipeline,
                forwarder: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn pipeline(&self) -> &LoggingPipeline {
        &self.inner.pipeline
    }

    /// Install `forwarder` as the sole recipient of subsequent records.
    ///
    /// Replaces any prior recipient with a single atomic swap at the root.
    pub fn register_sink<F: LogForwarder>(&self, forwarder: F) -> SinkId {
        self.register_shared(Arc::new(forwarder))
    }

    /// Same as [`register_sink`](Self::register_sink) for an already shared forwarder.
    pub fn register_shared(&self, forwarder: Arc<dyn LogForwarder>) -> SinkId {
        // Held across the install so a concurrent reattach cannot put a
        // superseded forwarder back at the root.
        let mut slot = self.inner.forwarder.lock();
        *slot = Some(Arc::clone(&forwarder));
        self.install(forwarder)
    }

    /// Whether a forwarder was ever registered.
    pub fn has_sink(&self) -> bool {
        self.inner.forwarder.lock().is_some()
    }

    /// Re-install the last registered forwarder under a fresh registration.
    ///
    /// # Errors
    ///
    /// Fails if no forwarder was ever registered.
    pub fn reattach(&self) -> ServliteResult<SinkId> {
        let slot = self.inner.forwarder.lock();
        let forwarder = slot
            .clone()
            .ok_or_else(|| ServliteError::Internal("no log sink registered".into()))?;
        Ok(self.install(forwarder))
    }

    /// Hand a record to the active registration (dropped if there is none).
    pub fn emit(&self, record: LogRecord) {
        self.inner.pipeline.dispatch(record);
    }

    /// Registration currently at the pipeline root.
    pub fn active(&self) -> Option<Arc<SinkRegistration>> {
        self.inner.pipeline.active()
    }

    fn install(&self, forwarder: Arc<dyn LogForwarder>) -> SinkId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .inner
            .pipeline
            .install(Arc::new(SinkRegistration::new(id, forwarder)));

        tracing::debug!(
            sink = id,
            replaced = ?previous.map(|p| p.id()),
            "Log sink registered"
        );
        id
    }
}
