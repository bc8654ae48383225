//! Error taxonomy for lockrun
//!
//! Lock contention is not represented here: a wait that times
//! out is an ordinary outcome (`Guarded::LockTimeout`), not a fault.

use std::io;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid lock name {name:?}: {reason}")]
    InvalidLockName { name: String, reason: &'static str },

    #[error("timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(i64),

    #[error("command is required")]
    EmptyCommand,

    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("{key} is required (set {var} or pass --{key})")]
    MissingSetting { key: &'static str, var: String },

    #[error("invalid {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("failed to connect to MySQL: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("MySQL ping did not answer within {0} seconds")]
    ConnectTimeout(u64),

    #[error("failed to {op} lock: {source}")]
    Provider {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("lock provider connection is closed")]
    ProviderClosed,

    #[error("failed to start command {program:?}: {source}")]
    ProcessStart {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for command: {0}")]
    ProcessWait(#[source] io::Error),

    #[error("failed to kill command: {0}")]
    ProcessKill(#[source] io::Error),

    #[error("failed to subscribe to termination signals: {0}")]
    SignalSetup(#[source] io::Error),
}

impl Error {
    /// True for failures caught before any external system was contacted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidLockName { .. } | Error::InvalidTimeout(_) | Error::EmptyCommand
        )
    }

    /// True when the command never got as far as running.
    pub fn is_start_failure(&self) -> bool {
        matches!(self, Error::EmptyCommand | Error::ProcessStart { .. })
    }
}
