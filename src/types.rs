use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Exit code when the lock could not be acquired within the wait timeout.
pub const EXIT_LOCK_TIMEOUT: i32 = 200;

/// Exit code for validation, configuration, connection, provider and
/// process-start failures.
pub const EXIT_INTERNAL_ERROR: i32 = 201;

/// Longest lock name the server accepts.
pub const MAX_LOCK_NAME_LEN: usize = 64;

const DERIVED_NAME_PREFIX: &str = "lockrun-";

/// A validated advisory lock name.
///
/// Only ASCII alphanumerics, `_`, `-` and `.` are allowed, without `..` or
/// `--` runs, so the name can never be read as SQL or comment syntax.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockName(String);

impl LockName {
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("lock name is required")
        } else if name.len() > MAX_LOCK_NAME_LEN {
            Some("lock name too long (max 64 characters)")
        } else if !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
        {
            Some("use only alphanumeric, underscore, hyphen, dot")
        } else if name.contains("..") {
            Some("lock name contains consecutive dots")
        } else if name.contains("--") {
            Some("lock name contains consecutive hyphens")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::InvalidLockName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    /// Derive a stable name from the command line.
    ///
    /// Arguments are joined with NUL so `["echo", "a b"]` and `["echo a", "b"]`
    /// hash differently.
    pub fn derive_from(command: &Command) -> Self {
        let digest = Sha256::digest(command.args().join("\0").as_bytes());
        let mut name = format!("{DERIVED_NAME_PREFIX}{digest:x}");
        name.truncate(MAX_LOCK_NAME_LEN);
        Self(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How long `GET_LOCK` may block, in whole seconds. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimeout(u32);

impl WaitTimeout {
    pub fn from_secs(secs: i64) -> Result<Self> {
        match u32::try_from(secs) {
            Ok(secs) if secs > 0 => Ok(Self(secs)),
            _ => Err(Error::InvalidTimeout(secs)),
        }
    }

    pub fn as_secs(self) -> u32 {
        self.0
    }
}

/// Program plus arguments. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command(Vec<String>);

impl Command {
    pub fn new(args: Vec<String>) -> Result<Self> {
        if args.is_empty() {
            return Err(Error::EmptyCommand);
        }
        Ok(Self(args))
    }

    pub fn program(&self) -> &str {
        &self.0[0]
    }

    pub fn arguments(&self) -> &[String] {
        &self.0[1..]
    }

    pub fn args(&self) -> &[String] {
        &self.0
    }
}

/// Why a running command was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    Requested,
    DeadlineExceeded,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Requested => f.write_str("cancellation requested"),
            CancelCause::DeadlineExceeded => f.write_str("maximum runtime exceeded"),
        }
    }
}

/// How a child process that actually ran came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Normal exit with this status code.
    Exited(i32),
    /// Terminated by this signal number.
    Signaled(i32),
    /// Killed by us.
    Cancelled(CancelCause),
}

impl ExecutionOutcome {
    /// Shell convention: exit status as-is, `128 + n` for signal `n`.
    /// A cancelled run is our failure, not the command's.
    pub fn exit_code(&self) -> i32 {
        match *self {
            ExecutionOutcome::Exited(code) => code,
            ExecutionOutcome::Signaled(signal) => 128 + signal,
            ExecutionOutcome::Cancelled(_) => EXIT_INTERNAL_ERROR,
        }
    }
}

/// Non-error result of a lock-guarded run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    /// The lock was held while the body ran; this is the body's output.
    Ran(T),
    /// The wait bound elapsed before the lock became free.
    LockTimeout,
}
