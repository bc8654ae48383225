pub mod cancel;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod lock;
pub mod runner;
pub mod types;

// Re-export main types
pub use types::*;

pub use cancel::CancelScope;
pub use config::Config;
pub use coordinator::ExecutionCoordinator;
pub use error::{Error, Result};
pub use lock::{LockProvider, MySqlLockProvider};
pub use runner::ProcessRunner;
