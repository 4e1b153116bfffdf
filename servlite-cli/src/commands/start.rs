use clap::Args;

use crate::console::Console;

#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// Override the configured port for this run (0 = ephemeral)
    #[arg(long, short)]
    pub port: Option<u16>,
}

/// Start in the background; the outcome is printed when boot completes.
pub fn execute(args: StartArgs, console: &mut Console) -> anyhow::Result<()> {
    let mut options = console.options().clone();
    if let Some(port) = args.port {
        options.port = port;
    }

    println!(
        "Starting {} on {}:{}",
        options.app_name, options.host, options.port
    );
    let join = console
        .controller()
        .spawn_start(options, |result| match result {
            Ok(handle) => println!("Started on port {}", handle.port()),
            Err(e) => eprintln!("Error: {}", e),
        })?;
    console.track(join);
    Ok(())
}
