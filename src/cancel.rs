use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::types::CancelCause;

/// Cancellation handle that remembers why it fired.
///
/// Clones share state; the first `cancel` decides the cause.
#[derive(Clone, Default)]
pub struct CancelScope {
    token: CancellationToken,
    cause: Arc<OnceLock<CancelCause>>,
}

impl CancelScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self, cause: CancelCause) {
        let _ = self.cause.set(cause);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancelled, with the recorded cause.
    pub async fn cancelled(&self) -> CancelCause {
        self.token.cancelled().await;
        self.cause.get().copied().unwrap_or(CancelCause::Requested)
    }

    /// Cancel with `DeadlineExceeded` once `after` has elapsed.
    /// Must be called from within a tokio runtime.
    pub fn cancel_after(&self, after: Duration) {
        let scope = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(after) => scope.cancel(CancelCause::DeadlineExceeded),
                _ = scope.token.cancelled() => {}
            }
        });
    }
}
