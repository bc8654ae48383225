//! Named advisory locks held on a single connection
//!
//! A provider owns exactly one session with the coordination service. The
//! lock it acquires belongs to that session, so it must be released through
//! the same provider and is never pooled or shared.

use std::future::Future;

use crate::error::Result;
use crate::types::{LockName, WaitTimeout};

#[cfg(test)]
pub mod memory;
pub mod mysql;

pub use mysql::MySqlLockProvider;

pub trait LockProvider: Send {
    /// Block server-side for up to `timeout` waiting for `name`.
    ///
    /// `Ok(false)` means the wait elapsed without the lock. That is contention,
    /// not a failure.
    fn acquire(
        &mut self,
        name: &LockName,
        timeout: WaitTimeout,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Release `name` on this connection. `Ok(false)` when nothing was held.
    fn release(&mut self, name: &LockName) -> impl Future<Output = Result<bool>> + Send;

    /// Drop the connection. Safe to call more than once.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
