use std::sync::Arc;

use parking_lot::Mutex;
use servlite::{LogForwarder, LogRecord, ServliteResult};

/// Forwarder that keeps every record it receives.
#[derive(Clone, Default)]
pub struct RecordingForwarder {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl RecordingForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|r| r.message().to_owned())
            .collect()
    }

    /// Whether any record's message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|r| r.message().contains(needle))
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogForwarder for RecordingForwarder {
    fn forward(&self, record: LogRecord) -> ServliteResult<()> {
        self.records.lock().push(record);
        Ok(())
    }
}
