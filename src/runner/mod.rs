//! Child process supervision
//!
//! Runs the guarded command with inherited stdio and races three events:
//! the child finishing, a termination signal arriving for us, and the
//! cancel scope firing.
//!
//! - Cancellation kills the child outright and reports `Cancelled`.
//! - A signal is forwarded unchanged to the child, and the child's own exit
//!   status is reported once it finishes.
//! - Normal completion maps the status: exit code as-is, signal `n` as
//!   `Signaled(n)`.

pub mod signals;

use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};

use tokio::process::Child;
use tracing::{debug, warn};

use crate::cancel::CancelScope;
use crate::error::{Error, Result};
use crate::types::{Command, ExecutionOutcome};
use signals::{SignalSource, TerminationSignals};

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run `command` to completion. No retries; a command that cannot be
    /// started is `Error::ProcessStart`, never a numeric outcome.
    pub async fn execute(&self, scope: &CancelScope, command: &Command) -> Result<ExecutionOutcome> {
        let mut signals = TerminationSignals::subscribe()?;
        let child = spawn(command)?;
        debug!(program = command.program(), pid = ?child.id(), "command started");

        supervise(child, &mut signals, scope).await
    }
}

pub(crate) fn spawn(command: &Command) -> Result<Child> {
    tokio::process::Command::new(command.program())
        .args(command.arguments())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| Error::ProcessStart {
            program: command.program().to_string(),
            source,
        })
}

pub(crate) async fn supervise<S: SignalSource>(
    mut child: Child,
    signals: &mut S,
    scope: &CancelScope,
) -> Result<ExecutionOutcome> {
    let status = tokio::select! {
        status = child.wait() => status.map_err(Error::ProcessWait)?,
        signal = signals.recv() => {
            relay(&child, signal);
            wait_relaying(&mut child, signals).await?
        }
        cause = scope.cancelled() => {
            warn!(%cause, pid = ?child.id(), "killing command");
            child.kill().await.map_err(Error::ProcessKill)?;
            return Ok(ExecutionOutcome::Cancelled(cause));
        }
    };

    Ok(outcome_from(status))
}

/// Once a signal has been relayed the child alone decides how it ends.
async fn wait_relaying<S: SignalSource>(child: &mut Child, signals: &mut S) -> Result<ExitStatus> {
    loop {
        tokio::select! {
            status = child.wait() => return status.map_err(Error::ProcessWait),
            signal = signals.recv() => relay(child, signal),
        }
    }
}

fn relay(child: &Child, signal: i32) {
    match child.id() {
        Some(pid) => {
            debug!(signal, pid, "forwarding signal to command");
            if let Err(e) = signals::forward(pid, signal) {
                warn!("Failed to forward signal {} to pid {}: {}", signal, pid, e);
            }
        }
        None => debug!(signal, "command already exited, signal not forwarded"),
    }
}

fn outcome_from(status: ExitStatus) -> ExecutionOutcome {
    if let Some(code) = status.code() {
        return ExecutionOutcome::Exited(code);
    }
    match status.signal() {
        Some(signal) => ExecutionOutcome::Signaled(signal),
        None => ExecutionOutcome::Exited(1),
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
