//! X25519 key exchange for short-term session key establishment.
//!
//! Two DID-identified agents each generate an ephemeral X25519 key pair,
//! exchange public keys during session establishment, and derive a shared
//! AES-GCM key via HKDF-SHA256 over the Diffie-Hellman output (spec §4.B).

use thiserror::Error;

use super::keyring::KeyMaterial;

/// Errors from key exchange operations.
#[derive(Debug, Error)]
pub enum KeyExchangeError {
    /// Invalid public key encoding.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// X25519 public key (32 bytes).
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Wrap raw bytes as a public key.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse from a variable-length slice (as received over the wire,
    /// base64-decoded).
    pub fn from_slice(slice: &[u8]) -> Result<Self, KeyExchangeError> {
        if slice.len() != 32 {
            return Err(KeyExchangeError::InvalidPublicKey(format!(
                "expected 32 bytes, got {}",
                slice.len()
            )));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use base64::Engine as _;
        write!(
            f,
            "PublicKey({})",
            base64::engine::general_purpose::STANDARD.encode(&self.0[..4])
        )
    }
}

/// X25519 ephemeral key pair.
pub struct KeyPair {
    secret: x25519_dalek::StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair for this session establishment.
    pub fn generate() -> Self {
        use rand::rngs::OsRng;
        use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519Public::from(&secret);

        Self {
            secret,
            public: PublicKey::from_bytes(public.to_bytes()),
        }
    }

    /// Our public key, to send to the peer.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Perform Diffie-Hellman against the peer's public key.
    pub fn diffie_hellman(&self, peer_public: &PublicKey) -> KeyMaterial {
        use x25519_dalek::PublicKey as X25519Public;

        let peer = X25519Public::from(*peer_public.as_bytes());
        let shared = self.secret.diffie_hellman(&peer);
        KeyMaterial::new(shared.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Drives one side of an X25519 exchange through to a derived session key.
#[derive(Debug)]
pub struct KeyExchange {
    key_pair: KeyPair,
    shared_secret: Option<KeyMaterial>,
}

impl KeyExchange {
    /// Start a new exchange with a fresh ephemeral key pair.
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::generate(),
            shared_secret: None,
        }
    }

    /// Our public key to advertise to the peer.
    pub fn public_key(&self) -> &PublicKey {
        self.key_pair.public_key()
    }

    /// Consume the peer's public key and compute the shared secret.
    pub fn set_peer_public(&mut self, peer_public: PublicKey) {
        self.shared_secret = Some(self.key_pair.diffie_hellman(&peer_public));
    }

    /// Derive the AES-GCM session key from the shared secret, bound to a
    /// context string (spec §4.B: HKDF info includes the session id so two
    /// sessions between the same pair of DIDs never share a key).
    pub fn derive_session_key(&self, context: &str) -> Option<KeyMaterial> {
        self.shared_secret
            .as_ref()
            .and_then(|secret| secret.derive(context.as_bytes(), 32).ok())
    }

    /// Whether the peer's public key has been consumed.
    pub fn is_complete(&self) -> bool {
        self.shared_secret.is_some()
    }
}

impl Default for KeyExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diffie_hellman_is_symmetric() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let alice_shared = alice.diffie_hellman(bob.public_key());
        let bob_shared = bob.diffie_hellman(alice.public_key());

        assert_eq!(alice_shared.as_bytes(), bob_shared.as_bytes());
    }

    #[test]
    fn key_exchange_flow_derives_matching_session_key() {
        let mut alice = KeyExchange::new();
        let alice_public = alice.public_key().clone();

        let mut bob = KeyExchange::new();
        let bob_public = bob.public_key().clone();

        alice.set_peer_public(bob_public);
        bob.set_peer_public(alice_public);

        assert!(alice.is_complete());
        assert!(bob.is_complete());

        let alice_session = alice.derive_session_key("session-1").unwrap();
        let bob_session = bob.derive_session_key("session-1").unwrap();
        assert_eq!(alice_session.as_bytes(), bob_session.as_bytes());

        let alice_other = alice.derive_session_key("session-2").unwrap();
        assert_ne!(alice_session.as_bytes(), alice_other.as_bytes());
    }

    #[test]
    fn public_key_from_slice_rejects_wrong_size() {
        assert!(PublicKey::from_slice(&[0u8; 16]).is_err());
        assert!(PublicKey::from_slice(&[0u8; 32]).is_ok());
    }
}
