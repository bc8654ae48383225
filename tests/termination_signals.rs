//! Real SIGINT/SIGTERM delivery to the runner.
//!
//! Kept in its own test binary: the signals are sent to this process, and
//! every live subscription in the process would see them.

use std::time::Duration;

use lockrun::runner::signals::{forward, SignalSource, TerminationSignals};
use lockrun::{CancelScope, Command, ExecutionOutcome, ProcessRunner};

#[tokio::test]
async fn termination_signals_reach_the_child() {
    // The subscription turns a signal to us into a value instead of killing us.
    let mut signals = TerminationSignals::subscribe().unwrap();
    forward(std::process::id(), libc::SIGINT).unwrap();
    let received = tokio::time::timeout(Duration::from_secs(5), signals.recv())
        .await
        .unwrap();
    assert_eq!(received, libc::SIGINT);
    drop(signals);

    // End to end: SIGTERM to lockrun is relayed and the child's trap decides.
    let command = Command::new(vec![
        "sh".to_string(),
        "-c".to_string(),
        "trap 'exit 143' TERM; while :; do sleep 0.1; done".to_string(),
    ])
    .unwrap();

    tokio::spawn(async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        forward(std::process::id(), libc::SIGTERM).unwrap();
    });

    let outcome = ProcessRunner::new()
        .execute(&CancelScope::new(), &command)
        .await
        .unwrap();

    assert_eq!(outcome, ExecutionOutcome::Exited(143));
}
