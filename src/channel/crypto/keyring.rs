//! Key derivation and management for session transport security.
//!
//! Uses HKDF (HMAC-based Key Derivation Function) to derive session keys
//! from the X25519 shared secret established during session setup.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Errors from keyring operations.
#[derive(Debug, Error)]
pub enum KeyringError {
    /// Key not found.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Invalid key material.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    DerivationFailed(String),
}

/// Key identifier, carried on the wire as `secret_key_id` (spec §4.B).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId(String);

impl KeyId {
    /// Create a new key id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for KeyId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for KeyId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Key material (secret bytes), zeroized on drop.
#[derive(Clone)]
pub struct KeyMaterial {
    bytes: Vec<u8>,
}

impl KeyMaterial {
    /// Create new key material from bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get the key length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the key is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Derive a new key using HKDF-SHA256 (spec §4.B: all key derivation is
    /// HKDF-SHA256).
    pub fn derive(&self, info: &[u8], output_len: usize) -> Result<KeyMaterial, KeyringError> {
        use hkdf::Hkdf;
        use sha2::Sha256;

        let hk = Hkdf::<Sha256>::new(None, &self.bytes);
        let mut okm = vec![0u8; output_len];
        hk.expand(info, &mut okm)
            .map_err(|e| KeyringError::DerivationFailed(format!("HKDF expand failed: {e}")))?;
        Ok(KeyMaterial::new(okm))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial([REDACTED, {} bytes])", self.bytes.len())
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.bytes.zeroize();
    }
}

/// Keyring tracking the current and superseded short-term keys for a
/// session (rotation leaves the old key addressable until the peer has
/// acknowledged the new `secret_key_id`).
#[derive(Debug, Default)]
pub struct Keyring {
    keys: HashMap<KeyId, KeyMaterial>,
    current: Option<KeyId>,
}

impl Keyring {
    /// Create a new empty keyring.
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
            current: None,
        }
    }

    /// Install a key as the current key, keeping prior keys addressable.
    pub fn install(&mut self, id: KeyId, material: KeyMaterial) {
        self.keys.insert(id.clone(), material);
        self.current = Some(id);
    }

    /// Get a key by id.
    pub fn get(&self, id: &KeyId) -> Option<&KeyMaterial> {
        self.keys.get(id)
    }

    /// Get the current key id and material.
    pub fn current(&self) -> Option<(&KeyId, &KeyMaterial)> {
        self.current
            .as_ref()
            .and_then(|id| self.keys.get(id).map(|k| (id, k)))
    }

    /// Drop a superseded key once the peer has confirmed rotation.
    pub fn retire(&mut self, id: &KeyId) -> Option<KeyMaterial> {
        if self.current.as_ref() == Some(id) {
            self.current = None;
        }
        self.keys.remove(id)
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the keyring holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyring_tracks_current_and_retires() {
        let mut ring = Keyring::new();
        let id1 = KeyId::new("k1");
        ring.install(id1.clone(), KeyMaterial::new(vec![1, 2, 3, 4]));
        assert_eq!(ring.len(), 1);
        let (cur_id, cur_key) = ring.current().unwrap();
        assert_eq!(cur_id, &id1);
        assert_eq!(cur_key.as_bytes(), &[1, 2, 3, 4]);

        let id2 = KeyId::new("k2");
        ring.install(id2.clone(), KeyMaterial::new(vec![5, 6, 7, 8]));
        assert_eq!(ring.current().unwrap().0, &id2);

        ring.retire(&id1);
        assert!(ring.get(&id1).is_none());
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn hkdf_derivation_is_deterministic_and_context_bound() {
        let master = KeyMaterial::new(vec![0u8; 32]);
        let derived = master.derive(b"ctx-a", 32).unwrap();
        let derived_again = master.derive(b"ctx-a", 32).unwrap();
        assert_eq!(derived.as_bytes(), derived_again.as_bytes());

        let other = master.derive(b"ctx-b", 32).unwrap();
        assert_ne!(derived.as_bytes(), other.as_bytes());
    }

    #[test]
    fn debug_redacts_key_material() {
        let key = KeyMaterial::new(vec![0x41, 0x42, 0x43]);
        let debug = format!("{key:?}");
        assert!(!debug.contains("ABC"));
        assert!(debug.contains("REDACTED"));
    }
}
