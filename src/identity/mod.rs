//! DID-based agent identity (spec §4.H).
//!
//! Each agent has a long-lived Ed25519 keypair. Its DID is a `did:key`
//! derived from the public key, and its DID document is the minimal JSON
//! document needed to publish a verification method. Session
//! establishment (see [`crate::channel`]) uses a separate, ephemeral
//! X25519 keypair per session; the DID identity only authenticates who
//! that ephemeral key belongs to.

use std::path::{Path, PathBuf};

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::{NegError, Result};

/// An agent's long-lived DID identity.
pub struct DidIdentity {
    signing_key: SigningKey,
    did: String,
}

impl DidIdentity {
    /// Generate a fresh identity.
    pub fn generate() -> Self {
        use rand::rngs::OsRng;
        let signing_key = SigningKey::generate(&mut OsRng);
        let did = did_from_public_key(&signing_key.verifying_key());
        Self { signing_key, did }
    }

    /// Rebuild an identity from a raw 32-byte Ed25519 seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let did = did_from_public_key(&signing_key.verifying_key());
        Self { signing_key, did }
    }

    /// This agent's `did:key` identifier.
    pub fn did(&self) -> &str {
        &self.did
    }

    /// The public verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Sign a message (used to authenticate the initial handshake frame
    /// that carries the session's ephemeral X25519 public key).
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// The minimal DID document for this identity (spec §4.H: published or
    /// exchanged out of band so peers can resolve a DID to a verification
    /// key).
    pub fn did_document(&self) -> DidDocument {
        DidDocument::for_identity(&self.did, &self.signing_key.verifying_key())
    }

    /// Raw 32-byte seed, for persistence.
    fn seed_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// PEM-armored encoding of the raw seed, for persistence.
    fn to_pem(&self) -> String {
        use base64::Engine as _;
        let encoded = base64::engine::general_purpose::STANDARD.encode(self.seed_bytes());
        format!("-----BEGIN ED25519 PRIVATE KEY-----\n{encoded}\n-----END ED25519 PRIVATE KEY-----\n")
    }

    /// Parse a PEM-armored seed produced by [`DidIdentity::to_pem`].
    fn from_pem(pem: &str) -> Result<Self> {
        use base64::Engine as _;
        let body: String = pem
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(body.trim())
            .map_err(|e| NegError::Config(format!("corrupt identity PEM: {e}")))?;
        let seed: [u8; 32] =
            bytes.try_into().map_err(|_| NegError::Config("identity seed must be 32 bytes".to_string()))?;
        Ok(Self::from_seed(seed))
    }
}

/// Verify a signature against a peer's resolved DID document.
pub fn verify(document: &DidDocument, message: &[u8], signature: &Signature) -> Result<()> {
    let key = document.verifying_key()?;
    key.verify(message, signature)
        .map_err(|e| NegError::Protocol(format!("signature verification failed: {e}")))
}

/// Derive a `did:key` identifier from an Ed25519 public key, using the
/// multicodec + multibase convention (`z` base58btc prefix, `0xed01`
/// multicodec varint for Ed25519 public keys).
fn did_from_public_key(key: &VerifyingKey) -> String {
    let mut buf = vec![0xed, 0x01];
    buf.extend_from_slice(key.as_bytes());
    format!("did:key:z{}", bs58_encode(&buf))
}

/// Minimal base58 (bitcoin alphabet) encoder; `did:key` is the only place
/// this crate needs base58, so no dependency is pulled in for it.
fn bs58_encode(input: &[u8]) -> String {
    const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

    let mut digits = vec![0u8];
    for &byte in input {
        let mut carry = byte as u32;
        for digit in &mut digits {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let leading_zeros = input.iter().take_while(|&&b| b == 0).count();
    let mut out = vec![ALPHABET[0]; leading_zeros];
    out.extend(digits.iter().rev().map(|&d| ALPHABET[d as usize]));
    String::from_utf8(out).expect("alphabet is ASCII")
}

/// A resolved peer DID document (spec §4.H: exchanged or published
/// out-of-band, used to verify the peer's handshake signature).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidDocument {
    /// The `did:key` identifier this document describes.
    pub id: String,
    /// Verification methods; this crate always emits exactly one.
    #[serde(rename = "verificationMethod")]
    pub verification_method: Vec<VerificationMethod>,
}

/// One entry in a DID document's `verificationMethod` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationMethod {
    /// Method id, conventionally `{did}#{fragment}`.
    pub id: String,
    /// Always `Ed25519VerificationKey2020` for this crate.
    #[serde(rename = "type")]
    pub method_type: String,
    /// The DID that controls this verification method.
    pub controller: String,
    /// Base58btc-encoded raw public key bytes.
    #[serde(rename = "publicKeyBase58")]
    pub public_key_base58: String,
}

impl DidDocument {
    fn for_identity(did: &str, key: &VerifyingKey) -> Self {
        Self {
            id: did.to_string(),
            verification_method: vec![VerificationMethod {
                id: format!("{did}#key-1"),
                method_type: "Ed25519VerificationKey2020".to_string(),
                controller: did.to_string(),
                public_key_base58: bs58_encode(key.as_bytes()),
            }],
        }
    }

    fn verifying_key(&self) -> Result<VerifyingKey> {
        let method = self
            .verification_method
            .first()
            .ok_or_else(|| NegError::Protocol("DID document has no verification method".to_string()))?;
        let bytes = bs58_decode(&method.public_key_base58)
            .map_err(|e| NegError::Protocol(format!("invalid base58 public key: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| NegError::Protocol("public key must be 32 bytes".to_string()))?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| NegError::Protocol(format!("invalid Ed25519 public key: {e}")))
    }
}

fn bs58_decode(s: &str) -> std::result::Result<Vec<u8>, &'static str> {
    const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

    let mut bytes = vec![0u8];
    for c in s.bytes() {
        let digit = ALPHABET
            .iter()
            .position(|&a| a == c)
            .ok_or("invalid base58 character")? as u32;
        let mut carry = digit;
        for byte in &mut bytes {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let leading_ones = s.bytes().take_while(|&b| b == ALPHABET[0]).count();
    let mut out = vec![0u8; leading_ones];
    out.extend(bytes.iter().rev());
    Ok(out)
}

/// On-disk shape of a persisted identity (spec §4.H/§7): the PEM-armored
/// private key plus the derived DID and DID document, so a store file is
/// self-describing without re-deriving the public half on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdentityFile {
    private_key_pem: String,
    did: String,
    did_document_json: DidDocument,
}

/// Loads a persisted identity from disk, generating and saving one if
/// none exists yet.
pub struct DidStore;

impl DidStore {
    /// Load the identity at `path`, or generate and persist a new one.
    pub fn load_or_generate(path: impl AsRef<Path>) -> Result<DidIdentity> {
        let path = path.as_ref();
        if path.exists() {
            let text = std::fs::read_to_string(path)?;
            let file: IdentityFile = serde_json::from_str(&text)
                .map_err(|e| NegError::Config(format!("corrupt identity file: {e}")))?;
            let identity = DidIdentity::from_pem(&file.private_key_pem)?;
            if identity.did() != file.did {
                return Err(NegError::Config("identity file DID does not match its private key".to_string()));
            }
            Ok(identity)
        } else {
            let identity = DidIdentity::generate();
            Self::save(&identity, path)?;
            Ok(identity)
        }
    }

    /// Persist an identity to `path` as `{private_key_pem, did, did_document_json}`.
    pub fn save(identity: &DidIdentity, path: impl AsRef<Path>) -> Result<()> {
        let path: PathBuf = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = IdentityFile {
            private_key_pem: identity.to_pem(),
            did: identity.did().to_string(),
            did_document_json: identity.did_document(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn did_is_stable_for_a_given_key() {
        let identity = DidIdentity::from_seed([7u8; 32]);
        let again = DidIdentity::from_seed([7u8; 32]);
        assert_eq!(identity.did(), again.did());
        assert!(identity.did().starts_with("did:key:z"));
    }

    #[test]
    fn did_document_round_trips_verifying_key() {
        let identity = DidIdentity::generate();
        let document = identity.did_document();
        let message = b"session-123|ephemeral-pubkey-bytes";
        let signature = identity.sign(message);
        assert!(verify(&document, message, &signature).is_ok());
    }

    #[test]
    fn verify_rejects_wrong_signature() {
        let alice = DidIdentity::generate();
        let bob = DidIdentity::generate();
        let message = b"hello";
        let signature = bob.sign(message);
        assert!(verify(&alice.did_document(), message, &signature).is_err());
    }

    #[test]
    fn store_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        let identity = DidStore::load_or_generate(&path).unwrap();
        let did = identity.did().to_string();

        let reloaded = DidStore::load_or_generate(&path).unwrap();
        assert_eq!(reloaded.did(), did);
    }
}
