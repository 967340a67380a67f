//! Code-generation readiness barrier (spec §4.E/§9: a plain handshake, not
//! an extra LLM round).
//!
//! Both sides generate their own artifact independently once a protocol
//! document is accepted. Before either side starts dispatching application
//! traffic through the interpreter, it waits for its peer's `ready`
//! `codeGeneration` frame — a [`tokio::sync::Notify`]-backed barrier rather
//! than a polling loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::{NegError, Result};

/// One side's view of the code-generation handshake.
#[derive(Clone)]
pub struct CodeGenBarrier {
    notify: Arc<Notify>,
    peer_ready: Arc<std::sync::atomic::AtomicBool>,
}

impl CodeGenBarrier {
    /// Build a fresh, unsignaled barrier.
    pub fn new() -> Self {
        Self { notify: Arc::new(Notify::new()), peer_ready: Arc::new(std::sync::atomic::AtomicBool::new(false)) }
    }

    /// Record that the peer's `codeGeneration` frame reported `ready` and
    /// wake anyone waiting.
    pub fn signal_peer_ready(&self) {
        self.peer_ready.store(true, std::sync::atomic::Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Wait until the peer has signaled readiness, or `timeout` elapses.
    pub async fn await_peer_ready(&self, timeout: Duration) -> Result<()> {
        if self.peer_ready.load(std::sync::atomic::Ordering::SeqCst) {
            return Ok(());
        }
        tokio::time::timeout(timeout, self.notify.notified())
            .await
            .map_err(|_| NegError::Timeout("peer code-generation readiness".to_string()))?;
        Ok(())
    }
}

impl Default for CodeGenBarrier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn already_ready_returns_immediately() {
        let barrier = CodeGenBarrier::new();
        barrier.signal_peer_ready();
        barrier.await_peer_ready(Duration::from_millis(10)).await.unwrap();
    }

    #[tokio::test]
    async fn waits_until_signaled() {
        let barrier = CodeGenBarrier::new();
        let waiter = barrier.clone();
        let handle = tokio::spawn(async move { waiter.await_peer_ready(Duration::from_secs(1)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        barrier.signal_peer_ready();

        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn times_out_if_never_signaled() {
        let barrier = CodeGenBarrier::new();
        let err = barrier.await_peer_ready(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, NegError::Timeout(_)));
    }
}
