//! Termination signals relayed to the child
//!
//! The subscription lives exactly as long as one `execute` call: the streams
//! are created before spawning and dropped with the `TerminationSignals`
//! value on every exit path.

use std::future::Future;
use std::io;

use tokio::signal::unix::{signal, Signal, SignalKind};

use crate::error::{Error, Result};

/// Source of signals that should be passed on to the child.
pub trait SignalSource: Send {
    /// Next signal number. Stays pending when no more can arrive.
    fn recv(&mut self) -> impl Future<Output = i32> + Send;
}

/// SIGINT and SIGTERM delivered to this process.
pub struct TerminationSignals {
    interrupt: Signal,
    terminate: Signal,
}

impl TerminationSignals {
    pub fn subscribe() -> Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).map_err(Error::SignalSetup)?,
            terminate: signal(SignalKind::terminate()).map_err(Error::SignalSetup)?,
        })
    }
}

impl SignalSource for TerminationSignals {
    async fn recv(&mut self) -> i32 {
        tokio::select! {
            Some(()) = self.interrupt.recv() => libc::SIGINT,
            Some(()) = self.terminate.recv() => libc::SIGTERM,
            else => std::future::pending().await,
        }
    }
}

/// Send `signal` to process `pid`.
pub fn forward(pid: u32, signal: i32) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, signal) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
