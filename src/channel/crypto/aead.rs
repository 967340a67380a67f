//! AES-256-GCM authenticated encryption for the session transport layer.
//!
//! Every application frame after session establishment is sealed with
//! AES-GCM under the session's current short-term key (spec §4.B). The
//! header byte (`framing::Header`) is passed as associated data so a
//! tampered `ProtocolType` bit invalidates the frame.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use thiserror::Error;

use super::keyring::KeyMaterial;

/// Nonce size for AES-256-GCM (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size for AES-256-GCM (128 bits).
pub const AEAD_TAG_SIZE: usize = 16;

/// Minimum accepted key size (256 bits).
pub const MIN_KEY_SIZE: usize = 32;

/// Errors from AEAD operations.
#[derive(Debug, Error)]
pub enum AeadError {
    /// Key material was too short for AES-256.
    #[error("invalid AEAD key: {0}")]
    InvalidKey(String),

    /// Encryption failed (only possible on malformed internal state).
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed: auth tag mismatch, wrong key, or corrupted data.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Ciphertext shorter than nonce + tag.
    #[error("ciphertext too short")]
    DataTooShort,
}

/// AES-256-GCM cipher bound to one key.
pub struct AeadCipher {
    cipher: Aes256Gcm,
}

impl AeadCipher {
    /// Build a cipher from key material; requires at least 32 bytes.
    pub fn new(key: KeyMaterial) -> Result<Self, AeadError> {
        if key.len() < MIN_KEY_SIZE {
            return Err(AeadError::InvalidKey(format!(
                "key too short: {} bytes (need {MIN_KEY_SIZE})",
                key.len()
            )));
        }
        let key_bytes: [u8; 32] = key.as_bytes()[..32]
            .try_into()
            .map_err(|_| AeadError::InvalidKey("key conversion failed".to_string()))?;
        Ok(Self {
            cipher: Aes256Gcm::new(&key_bytes.into()),
        })
    }

    /// Encrypt `plaintext` under `nonce`, authenticating `associated_data`.
    ///
    /// Returns `nonce || ciphertext || tag`.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        nonce: &[u8; NONCE_SIZE],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, AeadError> {
        let nonce_obj = Nonce::from_slice(nonce);
        let payload = Payload {
            msg: plaintext,
            aad: associated_data,
        };
        let ciphertext = self
            .cipher
            .encrypt(nonce_obj, payload)
            .map_err(|e| AeadError::EncryptionFailed(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(nonce);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Encrypt with a freshly generated random nonce.
    pub fn encrypt_auto_nonce(
        &self,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, AeadError> {
        use rand::RngCore;
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);
        self.encrypt(plaintext, &nonce, associated_data)
    }

    /// Decrypt `nonce || ciphertext || tag`, verifying `associated_data`.
    pub fn decrypt(
        &self,
        sealed: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, AeadError> {
        if sealed.len() < NONCE_SIZE + AEAD_TAG_SIZE {
            return Err(AeadError::DataTooShort);
        }
        let nonce = Nonce::from_slice(&sealed[..NONCE_SIZE]);
        let ciphertext = &sealed[NONCE_SIZE..];
        let payload = Payload {
            msg: ciphertext,
            aad: associated_data,
        };
        self.cipher
            .decrypt(nonce, payload)
            .map_err(|e| AeadError::DecryptionFailed(e.to_string()))
    }
}

impl std::fmt::Debug for AeadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> KeyMaterial {
        KeyMaterial::new(vec![0x42u8; 32])
    }

    fn test_nonce() -> [u8; NONCE_SIZE] {
        [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let cipher = AeadCipher::new(test_key()).unwrap();
        let plaintext = b"hello provider";
        let aad = b"header-byte";

        let sealed = cipher.encrypt(plaintext, &test_nonce(), aad).unwrap();
        assert!(sealed.len() > plaintext.len());

        let opened = cipher.decrypt(&sealed, aad).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn tamper_detection() {
        let cipher = AeadCipher::new(test_key()).unwrap();
        let mut sealed = cipher.encrypt(b"payload", &test_nonce(), b"aad").unwrap();
        let idx = NONCE_SIZE + 1;
        sealed[idx] ^= 0xFF;
        assert!(cipher.decrypt(&sealed, b"aad").is_err());
    }

    #[test]
    fn wrong_associated_data_fails() {
        let cipher = AeadCipher::new(test_key()).unwrap();
        let sealed = cipher.encrypt(b"payload", &test_nonce(), b"correct").unwrap();
        assert!(cipher.decrypt(&sealed, b"wrong").is_err());
    }

    #[test]
    fn wrong_key_fails() {
        let cipher1 = AeadCipher::new(KeyMaterial::new(vec![1u8; 32])).unwrap();
        let cipher2 = AeadCipher::new(KeyMaterial::new(vec![2u8; 32])).unwrap();
        let sealed = cipher1.encrypt(b"payload", &test_nonce(), b"").unwrap();
        assert!(cipher2.decrypt(&sealed, b"").is_err());
    }

    #[test]
    fn key_too_short_rejected() {
        let short = KeyMaterial::new(vec![0u8; 16]);
        assert!(AeadCipher::new(short).is_err());
    }

    #[test]
    fn ciphertext_too_short_rejected() {
        let cipher = AeadCipher::new(test_key()).unwrap();
        assert!(cipher.decrypt(&[0u8; 10], b"").is_err());
    }

    #[test]
    fn auto_nonce_varies_ciphertext() {
        let cipher = AeadCipher::new(test_key()).unwrap();
        let a = cipher.encrypt_auto_nonce(b"payload", b"").unwrap();
        let b = cipher.encrypt_auto_nonce(b"payload", b"").unwrap();
        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a, b"").unwrap(), b"payload");
        assert_eq!(cipher.decrypt(&b, b"").unwrap(), b"payload");
    }
}
