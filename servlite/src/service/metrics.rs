//! Lifecycle counters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Storage for controller-wide counters. All counters are monotonic.
#[derive(Clone, Default)]
pub(crate) struct LifecycleMetricsStorage {
    /// Accepted start() calls
    pub(crate) starts: Arc<AtomicU64>,
    /// Runs whose boot failed
    pub(crate) boot_failures: Arc<AtomicU64>,
    /// Completed stop() calls
    pub(crate) stops: Arc<AtomicU64>,
    /// start()/stop() calls rejected by the state guard
    pub(crate) rejections: Arc<AtomicU64>,
}

/// Handle for querying lifecycle counters.
///
/// Cloneable, lightweight handle (only Arc pointers).
#[derive(Clone)]
pub struct LifecycleMetrics {
    storage: LifecycleMetricsStorage,
}

impl LifecycleMetrics {
    pub(crate) fn new(storage: LifecycleMetricsStorage) -> Self {
        Self { storage }
    }

    /// Total accepted `start()` calls, successful or not.
    pub fn starts_total(&self) -> u64 {
        self.storage.starts.load(Ordering::Relaxed)
    }

    /// Total runs whose boot failed and were rolled back to Stopped.
    pub fn boot_failures_total(&self) -> u64 {
        self.storage.boot_failures.load(Ordering::Relaxed)
    }

    pub fn stops_total(&self) -> u64 {
        self.storage.stops.load(Ordering::Relaxed)
    }

    /// Total `start()`/`stop()` calls rejected because of the current state.
    pub fn rejections_total(&self) -> u64 {
        self.storage.rejections.load(Ordering::Relaxed)
    }
}
