use crate::console::Console;

pub fn execute(console: &mut Console) -> anyhow::Result<()> {
    let controller = console.controller().clone();
    let Some(handle) = controller.handle() else {
        eprintln!(
            "Error: service not running: service is {}",
            controller.state()
        );
        return Ok(());
    };

    println!("Stopping run {}", handle.run_id());
    let join = controller.spawn_stop(handle, |result| match result {
        Ok(()) => println!("Stopped"),
        Err(e) => eprintln!("Error: {}", e),
    })?;
    console.track(join);
    Ok(())
}
