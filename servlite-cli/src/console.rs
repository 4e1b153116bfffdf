//! Line-oriented control surface.
//!
//! Start and stop run on background threads so the console keeps reading
//! commands while the service boots; `wait` joins them.

use std::io::BufRead;
use std::thread::JoinHandle;

use clap::Parser;
use servlite::{ServiceLifecycleController, ServiceOptions};

use crate::commands::{self, Command, ConsoleLine};

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct Console {
    controller: ServiceLifecycleController,
    options: ServiceOptions,
    pending: Vec<JoinHandle<()>>,
}

impl Console {
    pub fn new(controller: ServiceLifecycleController, options: ServiceOptions) -> Self {
        Self {
            controller,
            options,
            pending: Vec::new(),
        }
    }

    pub fn controller(&self) -> &ServiceLifecycleController {
        &self.controller
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Remember a background operation so `wait` and `quit` can join it.
    pub fn track(&mut self, join: JoinHandle<()>) {
        self.pending.retain(|j| !j.is_finished());
        self.pending.push(join);
    }

    /// Read commands until `quit` or end of input.
    pub fn run<R: BufRead>(&mut self, input: R) -> anyhow::Result<()> {
        for line in input.lines() {
            let line = line?;
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.is_empty() {
                continue;
            }

            let command = match ConsoleLine::try_parse_from(words.iter().copied()) {
                Ok(parsed) => parsed.command,
                Err(e) => {
                    // Help goes to stdout, parse errors to stderr
                    let _ = e.print();
                    continue;
                }
            };

            if self.execute(command)? == Flow::Quit {
                break;
            }
        }
        Ok(())
    }

    /// Join pending operations and stop a running service.
    pub fn finish(&mut self) -> anyhow::Result<()> {
        self.wait();
        if self.controller.shutdown()? {
            println!("Stopped");
        }
        Ok(())
    }

    fn execute(&mut self, command: Command) -> anyhow::Result<Flow> {
        match command {
            Command::Start(args) => commands::start::execute(args, self)?,
            Command::Stop => commands::stop::execute(self)?,
            Command::Port => println!("{}", self.controller.current_port()),
            Command::Open => commands::open::execute(self)?,
            Command::Status(args) => commands::status::execute(args, self)?,
            Command::Wait => self.wait(),
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn wait(&mut self) {
        for join in self.pending.drain(..) {
            if join.join().is_err() {
                tracing::warn!("Background lifecycle operation panicked");
            }
        }
    }
}
