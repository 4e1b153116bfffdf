//! Error types shared by every servlite crate.

use thiserror::Error;

/// Result alias used across servlite.
pub type ServliteResult<T> = Result<T, ServliteError>;

/// Errors surfaced by the lifecycle controller, the embedded runtime and the
/// log bridge.
#[derive(Debug, Error)]
pub enum ServliteError {
    /// `start` called while the service is not `Stopped`.
    #[error("service already running: {0}")]
    AlreadyRunning(String),

    /// `stop` called while the service is not `Running`.
    #[error("service not running: {0}")]
    NotRunning(String),

    /// The embedded runtime failed to boot. State has been reset to `Stopped`.
    #[error("boot failure: {0}")]
    BootFailure(String),

    /// A log forwarder failed. Recovered inside the bridge, never returned to
    /// the thread that emitted the record.
    #[error("log delivery failure: {0}")]
    LogDelivery(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServliteError {
    /// Returns true for state-machine misuse (`AlreadyRunning`, `NotRunning`).
    ///
    /// Rejections leave the service untouched; callers may simply report them.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ServliteError::AlreadyRunning(_) | ServliteError::NotRunning(_)
        )
    }
}
