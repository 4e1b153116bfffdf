use servlite::UNSET_PORT;

use crate::console::Console;

/// Print the service URL. Reports an error while no port was ever published.
pub fn execute(console: &Console) -> anyhow::Result<()> {
    let port = console.controller().current_port();
    if port == UNSET_PORT {
        eprintln!("Error: port is 0, start the service first");
        return Ok(());
    }

    println!("http://localhost:{}/", port);
    Ok(())
}
