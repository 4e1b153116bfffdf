//! Options for one run of the embedded service.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use servlite_shared::constants::{logging as log_const, service};
use servlite_shared::errors::{ServliteError, ServliteResult};

/// Configuration handed to the runtime factory at `start`.
///
/// `port = 0` asks the OS for an ephemeral port; the bound port is published
/// through the port hand-off once the server is ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    /// Bind address of the HTTP listener.
    pub host: String,

    pub port: u16,

    /// Worker threads of the runtime's executor.
    pub worker_threads: usize,

    /// Upper bound for graceful shutdown before remaining tasks are abandoned.
    pub shutdown_timeout: Duration,

    /// Level filter applied when the runtime reconfigures logging during boot.
    pub log_filter: String,

    /// Display name used in greetings and status output.
    pub app_name: String,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            host: service::DEFAULT_HOST.to_string(),
            port: service::DEFAULT_PORT,
            worker_threads: service::DEFAULT_WORKER_THREADS,
            shutdown_timeout: service::DEFAULT_SHUTDOWN_TIMEOUT,
            log_filter: log_const::DEFAULT_FILTER.to_string(),
            app_name: service::DEFAULT_APP_NAME.to_string(),
        }
    }
}

impl ServiceOptions {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Reject options the runtime cannot boot with.
    pub fn validate(&self) -> ServliteResult<()> {
        self.host.parse::<IpAddr>().map_err(|_| {
            ServliteError::Config(format!("host '{}' is not an IP address", self.host))
        })?;

        if self.worker_threads == 0 {
            return Err(ServliteError::Config(
                "worker_threads must be at least 1".into(),
            ));
        }

        if self.shutdown_timeout.is_zero() {
            return Err(ServliteError::Config(
                "shutdown_timeout must be greater than zero".into(),
            ));
        }

        if self.app_name.trim().is_empty() {
            return Err(ServliteError::Config("app_name must not be empty".into()));
        }

        if self.log_filter.trim().is_empty() {
            return Err(ServliteError::Config("log_filter must not be empty".into()));
        }
        tracing_subscriber::EnvFilter::try_new(&self.log_filter).map_err(|e| {
            ServliteError::Config(format!("invalid log filter '{}': {}", self.log_filter, e))
        })?;

        Ok(())
    }

    /// Socket address the listener binds to.
    pub fn socket_addr(&self) -> ServliteResult<SocketAddr> {
        let ip = self.host.parse::<IpAddr>().map_err(|_| {
            ServliteError::Config(format!("host '{}' is not an IP address", self.host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
