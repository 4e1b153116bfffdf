//! Shared constants between the library and the console.

/// Embedded service defaults
pub mod service {
    use std::time::Duration;

    /// Default bind host (loopback only).
    pub const DEFAULT_HOST: &str = "127.0.0.1";

    /// Default HTTP port. Port 0 asks the OS for an ephemeral port.
    pub const DEFAULT_PORT: u16 = 8080;

    /// Default number of tokio worker threads serving requests.
    pub const DEFAULT_WORKER_THREADS: usize = 2;

    /// Upper bound for graceful shutdown before the runtime is torn down.
    pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default application name, shown by the index route.
    pub const DEFAULT_APP_NAME: &str = "servlite";
}

/// Logging defaults
pub mod logging {
    /// Filter used when neither the caller nor RUST_LOG provide one.
    pub const DEFAULT_FILTER: &str = "info";

    /// Target used by the library's own lifecycle logs.
    pub const LIFECYCLE_TARGET: &str = "servlite::lifecycle";
}

/// Thread names
pub mod threads {
    /// Prefix for tokio worker threads of the embedded runtime
    pub const WORKER: &str = "servlite-worker";

    /// Background thread running a blocking start()
    pub const STARTER: &str = "servlite-start";

    /// Background thread running a blocking stop()
    pub const STOPPER: &str = "servlite-stop";
}
