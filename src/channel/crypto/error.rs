//! Unified cryptographic error type for the session transport.
//!
//! # Epistemic classification
//!
//! | Variant | Falsified belief |
//! |---------|-------------------|
//! | `Aead` | Data was properly encrypted/formatted under the current key |
//! | `Keyring` | The requested key id was installed and retrievable |
//! | `Exchange` | The peer's public key was well-formed |

use thiserror::Error;

use super::aead::AeadError;
use super::exchange::KeyExchangeError;
use super::keyring::KeyringError;

/// Unified error type for all cryptographic operations on the channel.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD encryption/decryption error.
    #[error("aead: {0}")]
    Aead(#[source] AeadError),

    /// Keyring lookup or derivation error.
    #[error("keyring: {0}")]
    Keyring(#[source] KeyringError),

    /// X25519 key exchange error.
    #[error("key exchange: {0}")]
    Exchange(#[source] KeyExchangeError),
}

impl From<AeadError> for CryptoError {
    fn from(err: AeadError) -> Self {
        CryptoError::Aead(err)
    }
}

impl From<KeyringError> for CryptoError {
    fn from(err: KeyringError) -> Self {
        CryptoError::Keyring(err)
    }
}

impl From<KeyExchangeError> for CryptoError {
    fn from(err: KeyExchangeError) -> Self {
        CryptoError::Exchange(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aead_error_converts_and_preserves_source() {
        use std::error::Error;
        let err: CryptoError = AeadError::DataTooShort.into();
        assert!(matches!(err, CryptoError::Aead(_)));
        assert!(err.source().is_some());
    }
}
