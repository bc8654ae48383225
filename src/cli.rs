use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::cancel::CancelScope;
use crate::config::Config;
use crate::coordinator::ExecutionCoordinator;
use crate::lock::MySqlLockProvider;
use crate::runner::ProcessRunner;
use crate::types::{
    Command, ExecutionOutcome, Guarded, LockName, WaitTimeout, EXIT_INTERNAL_ERROR,
    EXIT_LOCK_TIMEOUT,
};

const AFTER_HELP: &str = "\
Connection settings may also come from LOCKRUN_HOST, LOCKRUN_PORT, LOCKRUN_USER,
LOCKRUN_PASSWORD and LOCKRUN_DATABASE (a .env file is read if present).

SIGINT and SIGTERM are passed on to the command. Once it has exited they are
ignored until the lock is released, which takes at most release_timeout_secs.

Exit codes:
   0-255   Exit status of the command (128+N when killed by signal N)
   200     Failed to acquire the lock within --timeout
   201     lockrun itself failed (bad input, MySQL connection, command not found)

Example:
  lockrun --lock-name daily-report --timeout 10 -- ./generate_report.sh";

#[derive(Parser, Debug)]
#[command(name = "lockrun", version)]
#[command(about = "Acquire a MySQL advisory lock and run a command", long_about = None)]
#[command(after_help = AFTER_HELP)]
pub struct Cli {
    /// Name of the advisory lock (derived from the command when omitted)
    #[arg(long)]
    pub lock_name: Option<String>,

    /// Max seconds to wait for the lock
    #[arg(long, allow_negative_numbers = true)]
    pub timeout: i64,

    /// Kill the command once it has run this many seconds
    #[arg(long)]
    pub max_runtime: Option<u64>,

    /// Path to a TOML settings file
    #[arg(long, env = "LOCKRUN_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// MySQL host
    #[arg(long)]
    pub host: Option<String>,

    /// MySQL port (default: 3306)
    #[arg(long)]
    pub port: Option<u16>,

    /// MySQL username
    #[arg(long)]
    pub user: Option<String>,

    /// MySQL password
    #[arg(long)]
    pub password: Option<String>,

    /// MySQL database name
    #[arg(long)]
    pub database: Option<String>,

    /// Command to run once the lock is acquired
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Parse process arguments, run, and return the process exit code.
pub async fn run_cli() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { EXIT_INTERNAL_ERROR } else { 0 };
        }
    };

    let result = run(cli).await;

    match &result {
        Ok(Guarded::Ran(ExecutionOutcome::Cancelled(cause))) => {
            eprintln!("Command was killed: {}", cause)
        }
        Ok(_) => {}
        Err(e) => eprintln!("Error: {:#}", e),
    }

    exit_code(&result)
}

/// Resolve inputs, take the lock, run the command, release the lock.
pub async fn run(cli: Cli) -> Result<Guarded<ExecutionOutcome>> {
    let command = Command::new(cli.command)?;
    let lock_name = resolve_lock_name(cli.lock_name, &command)?;
    WaitTimeout::from_secs(cli.timeout)?;

    let config = Config::builder()
        .config_path(cli.config)
        .host(cli.host)
        .port(cli.port)
        .user(cli.user)
        .password(cli.password)
        .database(cli.database)
        .max_runtime_secs(cli.max_runtime)
        .build()?;

    let provider = MySqlLockProvider::open(&config).await?;
    let mut coordinator =
        ExecutionCoordinator::new(provider).with_release_timeout(config.release_timeout);

    let runner = ProcessRunner::new();
    let scope = CancelScope::new();
    let result = coordinator
        .with_lock(lock_name.as_str(), cli.timeout, || async {
            if let Some(limit) = config.max_runtime {
                scope.cancel_after(limit);
            }
            runner.execute(&scope, &command).await
        })
        .await;
    coordinator.close().await;

    match result? {
        Guarded::LockTimeout => {
            eprintln!(
                "Failed to acquire lock '{}' within {} seconds",
                lock_name, cli.timeout
            );
            Ok(Guarded::LockTimeout)
        }
        Guarded::Ran(outcome) => {
            let outcome = outcome.with_context(|| format!("lock '{}'", lock_name))?;
            Ok(Guarded::Ran(outcome))
        }
    }
}

fn resolve_lock_name(explicit: Option<String>, command: &Command) -> crate::error::Result<LockName> {
    match explicit {
        Some(name) => LockName::parse(name),
        None => Ok(LockName::derive_from(command)),
    }
}

pub fn exit_code(result: &Result<Guarded<ExecutionOutcome>>) -> i32 {
    match result {
        Ok(Guarded::Ran(outcome)) => outcome.exit_code(),
        Ok(Guarded::LockTimeout) => EXIT_LOCK_TIMEOUT,
        Err(_) => EXIT_INTERNAL_ERROR,
    }
}
