//! Cryptography for the encrypted session transport (spec §4.B).
//!
//! - **X25519** establishes a shared secret between the two DID-identified
//!   agents at session setup.
//! - **HKDF-SHA256** derives a 256-bit AES-GCM key from that shared secret,
//!   bound to the session id.
//! - **AES-256-GCM** seals every application frame, with the 1-byte
//!   `framing::Header` as associated data.

mod aead;
mod error;
mod exchange;
mod keyring;

pub use aead::{AeadCipher, AeadError, AEAD_TAG_SIZE, MIN_KEY_SIZE, NONCE_SIZE};
pub use error::CryptoError;
pub use exchange::{KeyExchange, KeyExchangeError, KeyPair, PublicKey};
pub use keyring::{KeyId, KeyMaterial, Keyring, KeyringError};

/// Generates the next nonce for a session, mixing a monotonic counter with
/// fresh randomness so nonce reuse cannot occur even under clock skew
/// between retries.
#[derive(Debug, Clone, Default)]
pub struct NonceSequencer {
    counter: u64,
}

impl NonceSequencer {
    /// Start a fresh sequencer (counter at zero).
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    /// Produce the next nonce: `[counter:8][random:4]`.
    pub fn next(&mut self) -> [u8; NONCE_SIZE] {
        use rand::RngCore;

        let mut nonce = [0u8; NONCE_SIZE];
        nonce[0..8].copy_from_slice(&self.counter.to_le_bytes());
        rand::thread_rng().fill_bytes(&mut nonce[8..12]);
        self.counter = self.counter.wrapping_add(1);
        nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_sequencer_counter_increments() {
        let mut seq = NonceSequencer::new();
        let n0 = seq.next();
        let n1 = seq.next();
        assert_eq!(&n0[0..8], &0u64.to_le_bytes()[..]);
        assert_eq!(&n1[0..8], &1u64.to_le_bytes()[..]);
        assert_ne!(n0, n1);
    }
}
