//! In-process lock server for tests
//!
//! Mirrors the session semantics of `GET_LOCK`: a lock belongs to the
//! connection that took it, and closing that connection frees it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use super::LockProvider;
use crate::error::{Error, Result};
use crate::types::{LockName, WaitTimeout};

#[derive(Default)]
struct ServerState {
    held: Mutex<HashMap<String, u64>>,
    released: Notify,
    next_session: AtomicU64,
}

/// Shared namespace that every provider from `connect()` contends on.
#[derive(Clone, Default)]
pub struct MemoryLockServer {
    state: Arc<ServerState>,
}

impl MemoryLockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self) -> MemoryLockProvider {
        MemoryLockProvider {
            server: self.clone(),
            session: self.state.next_session.fetch_add(1, Ordering::SeqCst),
            closed: false,
            calls: Arc::new(CallLog::default()),
        }
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.state.held.lock().unwrap().contains_key(name)
    }

    fn try_take(&self, name: &str, session: u64) -> bool {
        let mut held = self.state.held.lock().unwrap();
        match held.get(name) {
            Some(owner) => *owner == session,
            None => {
                held.insert(name.to_string(), session);
                true
            }
        }
    }

    fn give_back(&self, name: &str, session: u64) -> bool {
        let mut held = self.state.held.lock().unwrap();
        let released = held.get(name) == Some(&session);
        if released {
            held.remove(name);
        }
        drop(held);
        self.state.released.notify_waiters();
        released
    }

    fn end_session(&self, session: u64) {
        self.state
            .held
            .lock()
            .unwrap()
            .retain(|_, owner| *owner != session);
        self.state.released.notify_waiters();
    }
}

/// Per-provider call counters plus switches for injecting faults.
#[derive(Default)]
pub struct CallLog {
    pub acquires: AtomicUsize,
    pub releases: AtomicUsize,
    pub fail_acquire: AtomicBool,
    pub fail_release: AtomicBool,
    /// `release` never completes.
    pub hang_release: AtomicBool,
}

impl CallLog {
    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

pub struct MemoryLockProvider {
    server: MemoryLockServer,
    session: u64,
    closed: bool,
    pub calls: Arc<CallLog>,
}

fn injected(op: &'static str) -> Error {
    Error::Provider {
        op,
        source: sqlx::Error::Protocol(format!("injected {op} failure")),
    }
}

impl LockProvider for MemoryLockProvider {
    async fn acquire(&mut self, name: &LockName, timeout: WaitTimeout) -> Result<bool> {
        self.calls.acquires.fetch_add(1, Ordering::SeqCst);
        if self.closed {
            return Err(Error::ProviderClosed);
        }
        if self.calls.fail_acquire.load(Ordering::SeqCst) {
            return Err(injected("acquire"));
        }

        let deadline = Instant::now() + Duration::from_secs(u64::from(timeout.as_secs()));
        loop {
            // Registered before the check so a release in between is not missed.
            let released = self.server.state.released.notified();
            if self.server.try_take(name.as_str(), self.session) {
                return Ok(true);
            }
            if tokio::time::timeout_at(deadline, released).await.is_err() {
                return Ok(false);
            }
        }
    }

    async fn release(&mut self, name: &LockName) -> Result<bool> {
        self.calls.releases.fetch_add(1, Ordering::SeqCst);
        if self.closed {
            return Err(Error::ProviderClosed);
        }
        if self.calls.fail_release.load(Ordering::SeqCst) {
            return Err(injected("release"));
        }
        if self.calls.hang_release.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self.server.give_back(name.as_str(), self.session))
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.server.end_session(self.session);
        }
    }
}
