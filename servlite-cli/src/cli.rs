use std::time::Duration;

use clap::{Args, Parser};
use servlite::ServiceOptions;
use servlite_shared::constants::{logging, service};

#[derive(Parser, Debug)]
#[command(
    name = "servlite",
    author,
    version,
    about = "Operator console for the servlite embedded web service",
    long_about = "Reads commands from stdin (start, stop, port, open, status, wait, quit) \
                  and prints every log record of the service as it is emitted."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    /// Start the service before reading commands
    #[arg(long)]
    pub start: bool,
}

/// Service options shared by every console command.
#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Address the HTTP listener binds to
    #[arg(long, env = "SERVLITE_HOST", default_value = service::DEFAULT_HOST)]
    pub host: String,

    /// HTTP port (0 = pick an ephemeral port)
    #[arg(long, short, env = "SERVLITE_PORT", default_value_t = service::DEFAULT_PORT)]
    pub port: u16,

    /// Worker threads serving requests
    #[arg(long, env = "SERVLITE_WORKER_THREADS", default_value_t = service::DEFAULT_WORKER_THREADS)]
    pub worker_threads: usize,

    /// Seconds to wait for in-flight requests on stop
    #[arg(
        long = "shutdown-timeout",
        env = "SERVLITE_SHUTDOWN_TIMEOUT_SECS",
        default_value_t = service::DEFAULT_SHUTDOWN_TIMEOUT.as_secs()
    )]
    pub shutdown_timeout_secs: u64,

    /// Log filter (RUST_LOG syntax)
    #[arg(long, env = "SERVLITE_LOG", default_value = logging::DEFAULT_FILTER)]
    pub log: String,

    /// Application name shown by the index page
    #[arg(long, env = "SERVLITE_APP_NAME", default_value = service::DEFAULT_APP_NAME)]
    pub app_name: String,
}

impl GlobalFlags {
    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            host: self.host.clone(),
            port: self.port,
            worker_threads: self.worker_threads,
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
            log_filter: self.log.clone(),
            app_name: self.app_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_map_onto_options() {
        let cli = Cli::try_parse_from([
            "servlite",
            "--port",
            "0",
            "--shutdown-timeout",
            "3",
            "--app-name",
            "demo",
        ])
        .unwrap();
        let options = cli.global.service_options();
        assert_eq!(options.port, 0);
        assert_eq!(options.shutdown_timeout, Duration::from_secs(3));
        assert_eq!(options.app_name, "demo");
        assert_eq!(options.worker_threads, service::DEFAULT_WORKER_THREADS);
        assert!(!cli.start);
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
