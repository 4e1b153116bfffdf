use clap::Args;

use crate::console::Console;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: StatusArgs, console: &Console) -> anyhow::Result<()> {
    let controller = console.controller();
    let status = controller.status();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("state: {}", status.state);
    println!("port: {}", status.port);
    if let Some(run_id) = status.run_id {
        println!("run: {}", run_id);
    }
    if let Some(app_name) = &status.app_name {
        println!("app: {}", app_name);
    }
    if let Some(started_at) = status.started_at {
        println!(
            "started: {}",
            started_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        );
    }

    let metrics = controller.metrics();
    println!(
        "starts: {}, boot failures: {}, stops: {}",
        metrics.starts_total(),
        metrics.boot_failures_total(),
        metrics.stops_total()
    );
    println!("dropped log records: {}", controller.pipeline().dropped());
    Ok(())
}
