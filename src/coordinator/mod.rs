//! Lock-guarded execution
//!
//! `ExecutionCoordinator` owns one lock provider and runs bodies under a
//! named lock: validate, acquire, run the body once, then always attempt the
//! release before reporting the body's result.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::DEFAULT_RELEASE_TIMEOUT_SECS;
use crate::error::Result;
use crate::lock::LockProvider;
use crate::types::{Guarded, LockName, WaitTimeout};

pub struct ExecutionCoordinator<P: LockProvider> {
    provider: P,
    release_timeout: Duration,
    /// Set between a successful acquire and the release attempt, so a lock
    /// orphaned by a dropped `with_lock` future is released on `close`.
    held: Option<LockName>,
}

impl<P: LockProvider> ExecutionCoordinator<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            release_timeout: Duration::from_secs(DEFAULT_RELEASE_TIMEOUT_SECS),
            held: None,
        }
    }

    /// Deadline for each release, independent of whatever stopped the body.
    pub fn with_release_timeout(mut self, timeout: Duration) -> Self {
        self.release_timeout = timeout;
        self
    }

    /// Run `body` while holding the lock `name`, waiting at most
    /// `timeout_secs` for it.
    ///
    /// Invalid input fails before the provider is contacted. A lock still
    /// recorded from an interrupted earlier call is released before the new
    /// acquire. If the wait
    /// elapses the body is never run and `Guarded::LockTimeout` is returned.
    /// Otherwise the body runs exactly once and a release is attempted
    /// exactly once afterwards. A failed release is logged and does not
    /// change the returned `Guarded::Ran(output)`.
    pub async fn with_lock<F, Fut, T>(
        &mut self,
        name: &str,
        timeout_secs: i64,
        body: F,
    ) -> Result<Guarded<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let name = LockName::parse(name)?;
        let timeout = WaitTimeout::from_secs(timeout_secs)?;

        // Left over from a dropped `with_lock` future.
        self.release_held().await;

        debug!(lock = %name, timeout_secs = timeout.as_secs(), "acquiring lock");
        if !self.provider.acquire(&name, timeout).await? {
            info!(lock = %name, timeout_secs = timeout.as_secs(), "lock not acquired within timeout");
            return Ok(Guarded::LockTimeout);
        }
        debug!(lock = %name, "lock acquired");
        self.held = Some(name);

        let output = body().await;

        self.release_held().await;
        Ok(Guarded::Ran(output))
    }

    async fn release_held(&mut self) {
        let Some(name) = self.held.take() else {
            return;
        };

        match tokio::time::timeout(self.release_timeout, self.provider.release(&name)).await {
            Ok(Ok(true)) => debug!(lock = %name, "lock released"),
            Ok(Ok(false)) => warn!(lock = %name, "lock was no longer held at release"),
            Ok(Err(e)) => warn!(lock = %name, "Failed to release lock: {}", e),
            Err(_) => warn!(
                lock = %name,
                "Lock release did not finish within {}s",
                self.release_timeout.as_secs()
            ),
        }
    }

    /// Release anything still held, then close the provider.
    pub async fn close(mut self) {
        self.release_held().await;
        self.provider.close().await;
    }
}
