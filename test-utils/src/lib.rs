//! Shared fixtures for servlite integration tests.

mod forwarder;
mod scripted;

use std::sync::OnceLock;

use parking_lot::{Mutex, MutexGuard};
use servlite::LoggingPipeline;

pub use forwarder::RecordingForwarder;
pub use scripted::{Script, ScriptedFactory, WORKER_THREAD};

// Every LogBridge built on the global pipeline competes for the same root slot.
static TEST_LOCK: Mutex<()> = parking_lot::const_mutex(());
static GLOBAL: OnceLock<LoggingPipeline> = OnceLock::new();

/// Serialized access to the process-global logging pipeline.
pub struct LoggingContext {
    pub pipeline: LoggingPipeline,
    // Hold the lock until the test is done
    pub _guard: MutexGuard<'static, ()>,
}

/// Install the global subscriber once and lock it for the calling test.
pub fn logging() -> LoggingContext {
    let guard = TEST_LOCK.lock();
    let pipeline = GLOBAL
        .get_or_init(|| servlite::logging::init("info").expect("install global subscriber"))
        .clone();

    LoggingContext {
        pipeline,
        _guard: guard,
    }
}
