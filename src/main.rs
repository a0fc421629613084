//! gui-agent: timeout-bounded GUI automation for phones and emulators.
//!
//! This is the main entry point for the `gui-agent` CLI. It parses arguments,
//! installs the parent watchdog and interrupt handling, dispatches to the
//! command handler, reclaims any leftover subprocesses and prints exactly one
//! result record.

pub mod adapter;
mod cli;
mod commands;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod events;
pub mod executor;
pub mod exit_codes;
pub mod fs;
mod interrupt;
mod logging;
pub mod process;
pub mod providers;
pub mod result;
pub mod session;

#[cfg(test)]
mod test_support;

use cli::Cli;
use config::Config;
use error::GuiAgentError;
use events::{Event, EventAction, EventLog};
use interrupt::Guarded;
use process::{DEFAULT_CLEANUP_GRACE, SubprocessRegistry, watchdog};
use result::FailureReport;
use result::output::{is_success, render};
use serde_json::{Value, json};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error};

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init_logging(cli.log_level);
    let format = cli.output_format();

    let registry = Arc::new(SubprocessRegistry::new());
    let config = Config::resolve(cli.config.as_deref());
    let (grace, events) = match &config {
        Ok(config) => (config.cleanup_grace(), EventLog::from_config(&config.events)),
        Err(_) => (DEFAULT_CLEANUP_GRACE, EventLog::disabled()),
    };
    debug!(events = ?events.path(), ?grace, "starting");
    watchdog::start(Arc::clone(&registry), grace);

    let command = cli.command;
    let worker_registry = Arc::clone(&registry);
    let outcome = interrupt::run_guarded(Arc::clone(&registry), grace, move || {
        commands::run(command, config, worker_registry)
    });

    let (mut record, exit) = match outcome {
        Guarded::Completed(record) => {
            let exit = if is_success(&record) {
                exit_codes::SUCCESS
            } else {
                exit_codes::FAILURE
            };
            (record, exit)
        }
        Guarded::Interrupted { signal, reclaimed } => {
            let err = GuiAgentError::Interrupted { reclaimed };
            events.record(Event::new(EventAction::Interrupted).with_details(json!({
                "signal": signal,
                "terminated_subprocesses": reclaimed,
            })));
            (commands::record(&FailureReport::from_error(&err, None)), err.exit_code())
        }
        Guarded::Panicked { reclaimed } => {
            error!(reclaimed, "command aborted unexpectedly");
            let mut report = FailureReport::new(
                "internal_error",
                "gui-agent aborted unexpectedly; see stderr for details.",
            );
            report.terminated_subprocesses = Some(reclaimed);
            (commands::record(&report), exit_codes::FAILURE)
        }
    };

    // Tail cleanup: nothing spawned by this invocation may outlive it.
    let leftover = registry.cleanup(grace);
    if leftover > 0 {
        debug!(leftover, "reclaimed subprocesses after command");
        add_terminated(&mut record, leftover);
    }

    println!("{}", render(&record, format));
    ExitCode::from(u8::try_from(exit).unwrap_or(1))
}

/// Add `count` to the record's `terminated_subprocesses`.
fn add_terminated(record: &mut Value, count: usize) {
    let Some(fields) = record.as_object_mut() else {
        return;
    };
    let previous = fields
        .get("terminated_subprocesses")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    fields.insert(
        "terminated_subprocesses".to_string(),
        Value::from(previous + count as u64),
    );
}
