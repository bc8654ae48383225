/// lockrun
///
/// Runs a command while holding a MySQL advisory lock, so at most one copy
/// of a job runs across every host sharing the database.

use lockrun::cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // Logs go to stderr; the command owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let code = cli::run_cli().await;
    std::process::exit(code);
}
