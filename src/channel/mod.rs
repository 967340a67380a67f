//! The encrypted session transport between two DID-identified agents
//! (spec §4.B).
//!
//! A [`SecureChannel`] carries framed bytes (see [`crate::framing`]) between
//! peers. Session establishment exchanges X25519 public keys and derives a
//! short-term AES-GCM key via HKDF-SHA256; every frame after that is sealed
//! under the current key with the frame's header byte as associated data.

pub mod crypto;
pub mod reference;
pub mod tcp;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use crypto::{
    AeadCipher, CryptoError, KeyExchange, KeyId, KeyMaterial, Keyring, NonceSequencer, PublicKey,
};

use crate::error::{NegError, Result};
use crate::framing::Header;

/// The raw, unauthenticated byte transport a [`SecureChannel`] rides on
/// (spec §6: "assume a reliable bidirectional byte channel is already
/// available"). Implemented by [`reference::InProcessChannel`] and
/// [`reference::FlakyChannel`] for tests and the demo binaries; a real
/// deployment would implement it over TCP or QUIC.
#[async_trait]
pub trait Transport: Send {
    /// Send one raw frame to the peer.
    async fn send_frame(&mut self, frame: Vec<u8>) -> Result<()>;
    /// Receive the next raw frame from the peer.
    async fn recv_frame(&mut self) -> Result<Vec<u8>>;
}

/// Channel session lifecycle (grounded on the HELLO/ACCEPT handshake
/// pattern, adapted to a key-exchange handshake instead of a capability
/// handshake).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No handshake has started.
    Initial,
    /// Our ephemeral public key has been sent, awaiting the peer's.
    KeyExchangeSent,
    /// Shared key derived; ready to send and receive sealed frames.
    Established,
    /// A close frame was sent or received.
    Closed,
}

/// One side of an encrypted session between two DIDs.
pub struct SecureChannel {
    session_id: String,
    state: SessionState,
    exchange: KeyExchange,
    keyring: Keyring,
    cipher: Option<AeadCipher>,
    nonces: NonceSequencer,
    last_activity: Instant,
    timeout: Duration,
}

impl SecureChannel {
    /// Start a new channel for the given session id.
    pub fn new(session_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            session_id: session_id.into(),
            state: SessionState::Initial,
            exchange: KeyExchange::new(),
            keyring: Keyring::new(),
            cipher: None,
            nonces: NonceSequencer::new(),
            last_activity: Instant::now(),
            timeout,
        }
    }

    /// The session id this channel negotiates under.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the channel is ready to seal/open frames.
    pub fn is_established(&self) -> bool {
        self.state == SessionState::Established
    }

    /// Whether the channel has been idle past its timeout.
    pub fn is_expired(&self) -> bool {
        self.last_activity.elapsed() > self.timeout
    }

    /// Our ephemeral public key, to hand to the peer out of band or over an
    /// initial cleartext handshake frame.
    pub fn local_public_key(&self) -> &PublicKey {
        self.exchange.public_key()
    }

    /// Mark the local public key as sent.
    pub fn mark_key_sent(&mut self) {
        self.state = SessionState::KeyExchangeSent;
        self.touch();
    }

    /// Consume the peer's public key, derive the session key, and install
    /// it as the current key (spec §4.B: HKDF-SHA256 over the X25519
    /// shared secret, bound to the session id).
    pub fn complete_handshake(&mut self, peer_public: PublicKey) -> Result<()> {
        self.exchange.set_peer_public(peer_public);
        let key = self
            .exchange
            .derive_session_key(&self.session_id)
            .ok_or_else(|| NegError::Protocol("key exchange incomplete".to_string()))?;
        self.install_key(KeyId::new(format!("{}-0", self.session_id)), key)?;
        self.state = SessionState::Established;
        self.touch();
        Ok(())
    }

    /// Install a new current key, e.g. after a mid-session rotation agreed
    /// over the meta-protocol.
    pub fn install_key(&mut self, id: KeyId, material: KeyMaterial) -> Result<()> {
        let cipher = AeadCipher::new(material.clone()).map_err(CryptoError::from)?;
        self.keyring.install(id, material);
        self.cipher = Some(cipher);
        Ok(())
    }

    /// The id of the key currently sealing outbound frames.
    pub fn current_key_id(&self) -> Option<&KeyId> {
        self.keyring.current().map(|(id, _)| id)
    }

    /// Seal a payload for transmission, using `header` as associated data.
    pub fn seal(&mut self, header: Header, payload: &[u8]) -> Result<Vec<u8>> {
        if !self.is_established() {
            return Err(NegError::SessionNotEstablished);
        }
        if self.is_expired() {
            return Err(NegError::SessionExpired);
        }
        let cipher = self.cipher.as_ref().expect("established implies cipher");
        let nonce = self.nonces.next();
        let sealed = cipher
            .encrypt(payload, &nonce, &[header.encode()])
            .map_err(CryptoError::from)?;
        self.touch();
        Ok(sealed)
    }

    /// Open a sealed payload received under `header`.
    pub fn open(&mut self, header: Header, sealed: &[u8]) -> Result<Vec<u8>> {
        if !self.is_established() {
            return Err(NegError::SessionNotEstablished);
        }
        if self.is_expired() {
            return Err(NegError::SessionExpired);
        }
        let cipher = self.cipher.as_ref().expect("established implies cipher");
        let opened = cipher
            .decrypt(sealed, &[header.encode()])
            .map_err(CryptoError::from)?;
        self.touch();
        Ok(opened)
    }

    /// Mark the channel closed.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Exchange ephemeral public keys over `transport` and establish `channel`
/// (spec §4.B). Both sides race the same two steps — send then receive —
/// so it doesn't matter which end dials and which accepts.
pub async fn handshake_over(channel: &mut SecureChannel, transport: &mut dyn Transport) -> Result<()> {
    let local = channel.local_public_key().as_bytes().to_vec();
    transport.send_frame(local).await?;
    channel.mark_key_sent();

    let peer_bytes = transport.recv_frame().await?;
    let peer = crypto::PublicKey::from_slice(&peer_bytes).map_err(|e| NegError::Protocol(e.to_string()))?;
    channel.complete_handshake(peer)
}
