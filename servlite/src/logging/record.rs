//! Immutable log records handed to the bridge's forwarder.

use std::fmt::{self, Write as _};
use std::thread::{self, ThreadId};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::field::{Field, Visit};
use tracing::{Event, Level};

/// Identity of the thread that emitted a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadIdentity {
    name: Option<String>,
    id: ThreadId,
}

impl ThreadIdentity {
    /// Capture the identity of the calling thread.
    pub fn current() -> Self {
        let current = thread::current();
        Self {
            name: current.name().map(str::to_owned),
            id: current.id(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }
}

impl fmt::Display for ThreadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "{:?}", self.id),
        }
    }
}

/// A single log statement, captured on the emitting thread.
///
/// Records are immutable once built. They are rendered as
/// `ISO8601 [thread] LEVEL logger - message`.
#[derive(Debug, Clone)]
pub struct LogRecord {
    timestamp: DateTime<Utc>,
    thread: ThreadIdentity,
    level: Level,
    logger: String,
    message: String,
}

impl LogRecord {
    /// Build a record stamped with the current time and calling thread.
    pub fn new(level: Level, logger: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            thread: ThreadIdentity::current(),
            level,
            logger: logger.into(),
            message: message.into(),
        }
    }

    /// Build a record from a tracing event.
    ///
    /// The `message` field becomes the message body; every other field is
    /// appended as ` key=value`.
    pub fn from_event(event: &Event<'_>) -> Self {
        let mut visitor = RenderVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        Self::new(*metadata.level(), metadata.target(), visitor.finish())
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn thread(&self) -> &ThreadIdentity {
        &self.thread
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn logger(&self) -> &str {
        &self.logger
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} {} - {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.thread,
            self.level,
            self.logger,
            self.message
        )
    }
}

/// Renders event fields into a single message line.
#[derive(Default)]
struct RenderVisitor {
    message: String,
    fields: String,
}

impl RenderVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_owned()
        } else {
            self.message + &self.fields
        }
    }
}

impl Visit for RenderVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
