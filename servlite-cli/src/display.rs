//! Log display: drains the bridge's queue on a dedicated thread.

use std::io::{self, Write};
use std::thread::{self, JoinHandle};

use servlite::{LogBridge, LogRecord, ServliteResult};
use tokio::sync::mpsc::UnboundedReceiver;

const DISPLAY_THREAD: &str = "servlite-display";

/// Print every queued record on stdout until the queue closes.
pub fn spawn(mut rx: UnboundedReceiver<LogRecord>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(DISPLAY_THREAD.to_string())
        .spawn(move || {
            while let Some(record) = rx.blocking_recv() {
                let mut out = io::stdout().lock();
                if writeln!(out, "{}", record).is_err() {
                    break;
                }
            }
        })
}

/// Replace the queue forwarder with a discarding one, closing the queue.
pub fn detach(bridge: &LogBridge) {
    bridge.register_sink(|_record: LogRecord| -> ServliteResult<()> { Ok(()) });
}
