//! Console commands, one stdin line each.

pub mod open;
pub mod start;
pub mod status;
pub mod stop;

use clap::{Parser, Subcommand};

/// One console line. The first word is the command.
#[derive(Parser, Debug)]
#[command(multicall = true)]
pub struct ConsoleLine {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the service in the background
    Start(start::StartArgs),

    /// Stop the running service
    Stop,

    /// Print the last published port (0 before the first start)
    Port,

    /// Print the URL of the service
    Open,

    /// Show lifecycle state and counters
    Status(status::StatusArgs),

    /// Wait until pending start/stop operations complete
    Wait,

    /// Stop the service and exit
    #[command(alias = "exit")]
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, clap::Error> {
        ConsoleLine::try_parse_from(line.split_whitespace()).map(|l| l.command)
    }

    #[test]
    fn test_parse_commands() {
        assert!(matches!(parse("stop").unwrap(), Command::Stop));
        assert!(matches!(parse("exit").unwrap(), Command::Quit));
        assert!(matches!(
            parse("start --port 0").unwrap(),
            Command::Start(start::StartArgs { port: Some(0) })
        ));
        assert!(matches!(
            parse("status --json").unwrap(),
            Command::Status(status::StatusArgs { json: true })
        ));
    }

    #[test]
    fn test_unknown_command_is_error() {
        assert!(parse("bogus").is_err());
        assert!(parse("port extra").is_err());
    }
}
