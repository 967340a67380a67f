//! Reference channel collaborator used by tests and the demo binaries.
//!
//! The raw byte transport between two DIDs is treated as an external
//! collaborator: something that can move frames reliably, not something
//! this crate builds. [`InProcessChannel`] is the in-process stand-in:
//! two handles sharing a pair of `tokio::sync::mpsc` queues. [`FlakyChannel`]
//! wraps one to drop or reorder frames for fault-injection tests.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{NegError, Result};

use super::Transport;

/// One endpoint of an in-process, full-duplex byte channel.
pub struct InProcessChannel {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl InProcessChannel {
    /// Build a connected pair of endpoints.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        (
            Self { tx: tx_a, rx: rx_b },
            Self { tx: tx_b, rx: rx_a },
        )
    }

    /// Send a raw frame to the peer.
    pub fn send(&self, frame: Vec<u8>) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| NegError::Channel("peer dropped".to_string()))
    }

    /// Receive the next raw frame from the peer.
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| NegError::Channel("peer dropped".to_string()))
    }
}

/// Wraps an [`InProcessChannel`] and drops every Nth outbound frame, for
/// exercising the demultiplexer's tolerance of lost meta-negotiation
/// rounds (spec §8: the negotiator must time out and retry rather than
/// hang forever).
pub struct FlakyChannel {
    inner: InProcessChannel,
    drop_every: usize,
    sent: usize,
}

impl FlakyChannel {
    /// Wrap `inner`, dropping every `drop_every`-th send (0 disables
    /// dropping).
    pub fn new(inner: InProcessChannel, drop_every: usize) -> Self {
        Self {
            inner,
            drop_every,
            sent: 0,
        }
    }

    /// Send a frame, silently dropping it if this call lands on the drop
    /// interval.
    pub fn send(&mut self, frame: Vec<u8>) -> Result<()> {
        self.sent += 1;
        if self.drop_every != 0 && self.sent % self.drop_every == 0 {
            return Ok(());
        }
        self.inner.send(frame)
    }

    /// Receive the next frame that made it through.
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        self.inner.recv().await
    }
}

#[async_trait]
impl Transport for InProcessChannel {
    async fn send_frame(&mut self, frame: Vec<u8>) -> Result<()> {
        InProcessChannel::send(self, frame)
    }

    async fn recv_frame(&mut self) -> Result<Vec<u8>> {
        self.recv().await
    }
}

#[async_trait]
impl Transport for FlakyChannel {
    async fn send_frame(&mut self, frame: Vec<u8>) -> Result<()> {
        self.send(frame)
    }

    async fn recv_frame(&mut self) -> Result<Vec<u8>> {
        self.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_process_channel_delivers_in_order() {
        let (a, mut b) = InProcessChannel::pair();
        a.send(vec![1]).unwrap();
        a.send(vec![2]).unwrap();
        assert_eq!(b.recv().await.unwrap(), vec![1]);
        assert_eq!(b.recv().await.unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn flaky_channel_drops_every_nth_frame() {
        let (a, b) = InProcessChannel::pair();
        let mut flaky = FlakyChannel::new(a, 3);
        let mut b = b;

        flaky.send(vec![1]).unwrap();
        flaky.send(vec![2]).unwrap();
        flaky.send(vec![3]).unwrap(); // dropped
        flaky.send(vec![4]).unwrap();

        assert_eq!(b.recv().await.unwrap(), vec![1]);
        assert_eq!(b.recv().await.unwrap(), vec![2]);
        assert_eq!(b.recv().await.unwrap(), vec![4]);
    }

    #[tokio::test]
    async fn recv_errors_once_peer_is_dropped() {
        let (a, mut b) = InProcessChannel::pair();
        drop(a);
        assert!(b.recv().await.is_err());
    }
}
