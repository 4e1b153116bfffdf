#![allow(dead_code)]

use assert_cmd::Command;
use std::time::Duration;

/// Console binary on an ephemeral port, isolated from the caller's env.
pub fn servlite() -> Command {
    let bin_path = env!("CARGO_BIN_EXE_servlite");
    let mut cmd = Command::new(bin_path);
    // You can override this with .timeout(Duration::from_secs(N))
    cmd.timeout(Duration::from_secs(60));
    cmd.env_remove("RUST_LOG")
        .env("SERVLITE_PORT", "0")
        .env("SERVLITE_LOG", "info")
        .env("SERVLITE_SHUTDOWN_TIMEOUT_SECS", "5");
    cmd
}

/// Console fed with `commands`, one per line.
pub fn script(commands: &[&str]) -> Command {
    let mut cmd = servlite();
    let mut input = commands.join("\n");
    input.push('\n');
    cmd.write_stdin(input);
    cmd
}
