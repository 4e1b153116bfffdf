//! servlite - operator console for the embedded web service

mod cli;
mod commands;
mod console;
mod display;

use std::io;

use clap::Parser;
use servlite::{LogBridge, QueueForwarder, ServiceLifecycleController, WebRuntimeFactory};

use cli::Cli;
use commands::start::StartArgs;
use console::Console;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let options = cli.global.service_options();
    options.validate()?;

    let pipeline = servlite::logging::init(&options.log_filter)?;
    let bridge = LogBridge::new(pipeline);
    let (forwarder, rx) = QueueForwarder::channel();
    bridge.register_sink(forwarder);
    let display = display::spawn(rx)?;

    let controller = ServiceLifecycleController::new(WebRuntimeFactory, bridge.clone());
    let mut console = Console::new(controller, options);

    let result = if cli.start {
        commands::start::execute(StartArgs::default(), &mut console)
    } else {
        Ok(())
    }
    .and_then(|()| console.run(io::stdin().lock()));
    let finished = console.finish();

    // Flush queued records before exiting
    display::detach(&bridge);
    if display.join().is_err() {
        eprintln!("Error: log display thread panicked");
    }

    result.and(finished)
}
