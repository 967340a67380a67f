//! TCP transport for the demo binaries (spec §6: "assume a reliable
//! bidirectional byte channel is already available" — this is that
//! channel's one real, non-in-process implementation).
//!
//! Frames are length-prefixed (`u32` big-endian) over a plain
//! [`tokio::net::TcpStream`]; no TLS of its own, since every byte on the
//! wire after the initial key exchange is already AES-GCM sealed by the
//! [`super::SecureChannel`] riding on top.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use async_trait::async_trait;

use crate::error::{NegError, Result};

use super::Transport;

/// One end of a length-prefixed TCP byte stream.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Dial a peer.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await.map_err(|e| NegError::Channel(format!("connect {addr}: {e}")))?;
        Ok(Self { stream })
    }

    /// Accept a single inbound connection on `addr`, then stop listening.
    pub async fn accept_one(addr: &str) -> Result<Self> {
        let listener = TcpListenerHandle::bind(addr).await?;
        listener.accept().await
    }
}

/// A bound listening socket that can accept more than one inbound
/// connection, so a provider can install a standing new-session callback
/// instead of stopping after its first peer (spec §4.G).
pub struct TcpListenerHandle {
    listener: TcpListener,
}

impl TcpListenerHandle {
    /// Bind a listening socket at `addr`.
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| NegError::Channel(format!("bind {addr}: {e}")))?;
        Ok(Self { listener })
    }

    /// The address actually bound (useful when `addr` used port 0).
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.listener.local_addr().map_err(|e| NegError::Channel(format!("local_addr: {e}")))
    }

    /// Accept the next inbound connection. Call repeatedly to serve more
    /// than one dialer on the same listener.
    pub async fn accept(&self) -> Result<TcpTransport> {
        let (stream, peer) = self.listener.accept().await.map_err(|e| NegError::Channel(format!("accept: {e}")))?;
        tracing::info!(%peer, "accepted inbound connection");
        Ok(TcpTransport { stream })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send_frame(&mut self, frame: Vec<u8>) -> Result<()> {
        let len = u32::try_from(frame.len()).map_err(|_| NegError::Channel("frame too large".to_string()))?;
        self.stream.write_all(&len.to_be_bytes()).await.map_err(|e| NegError::Channel(e.to_string()))?;
        self.stream.write_all(&frame).await.map_err(|e| NegError::Channel(e.to_string()))?;
        Ok(())
    }

    async fn recv_frame(&mut self) -> Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        self.stream
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| NegError::Channel(format!("connection closed: {e}")))?;
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut frame = vec![0u8; len];
        self.stream.read_exact(&mut frame).await.map_err(|e| NegError::Channel(format!("connection closed: {e}")))?;
        Ok(frame)
    }
}
