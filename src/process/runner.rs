//! Spawn subprocesses that are tracked for guaranteed cleanup.
//!
//! Every external command the crate runs (adapter bridges, `adb`, caption
//! commands) goes through [`run_tracked`], which places the child in its own
//! process group, registers it with the [`SubprocessRegistry`], feeds stdin,
//! captures stdout/stderr and waits for exit.

use super::registry::{SubprocessRegistry, TrackedProcess};
use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Grace given to processes a finished leader left running in its group.
const STRAY_GRACE: Duration = Duration::from_millis(500);

/// How long to keep reading output after the leader and its group are gone.
/// Bounds the wait on pipes inherited by processes outside the group.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Captured result of a finished tracked command.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Stdout decoded lossily.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr decoded lossily and trimmed.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Run `command` to completion as a tracked subprocess.
///
/// The wait has no deadline of its own: callers that need one run this inside
/// the timeout executor, whose cleanup terminates the child and lets this
/// function return with the signalled exit status.
///
/// Once the child exits, anything it left running in its process group is
/// terminated, so a bridge that backgrounds a helper cannot hold the call
/// open through the inherited output pipes.
pub fn run_tracked(
    registry: &SubprocessRegistry,
    mut command: Command,
    stdin: Option<Vec<u8>>,
) -> Result<CapturedOutput> {
    let program = command.get_program().to_string_lossy().into_owned();

    command
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let child = command
        .spawn()
        .with_context(|| format!("failed to execute '{}'", program))?;
    let process = TrackedProcess::new(child);
    registry.register(process.clone());
    debug!(pid = process.pid(), program = %program, "spawned tracked subprocess");

    if let (Some(input), Some(mut pipe)) = (stdin, process.take_stdin()) {
        // Not joined: a group member that inherited stdin and never reads it
        // must not block the caller. The write fails once every reader is gone.
        thread::spawn(move || {
            let _ = pipe.write_all(&input);
        });
    }
    let stdout_reader = process.take_stdout().map(drain);
    let stderr_reader = process.take_stderr().map(drain);

    let status = loop {
        match process.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to check status of '{}'", program));
            }
        }
    };

    if registry.reclaim_group(&process, STRAY_GRACE) {
        warn!(pid = process.pid(), program = %program, "terminated processes left behind in subprocess group");
    }

    let stdout = collect(stdout_reader, &program, "stdout");
    let stderr = collect(stderr_reader, &program, "stderr");

    debug!(pid = process.pid(), code = ?status.code(), "tracked subprocess exited");
    Ok(CapturedOutput {
        status,
        stdout,
        stderr,
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

fn collect(reader: Option<Receiver<Vec<u8>>>, program: &str, stream: &str) -> Vec<u8> {
    let Some(reader) = reader else {
        return Vec::new();
    };
    match reader.recv_timeout(PIPE_DRAIN_TIMEOUT) {
        Ok(buf) => buf,
        Err(_) => {
            warn!(program = %program, stream, "output pipe still held open, giving up on it");
            Vec::new()
        }
    }
}
