//! Runtime negotiation of an application-level protocol between two
//! agents, using an LLM as design oracle (spec §4.D).

pub mod message;
pub mod negotiator;
pub mod prompts;

pub use message::{
    CodeGenerationBody, CodeGenerationStatus, HeartbeatBody, HeartbeatKind, MetaFrame,
    NegotiationBody, NegotiationStatus,
};
pub use negotiator::{HistoryEntry, Negotiator, NegotiationOutcome, NegotiatorRole, NegotiatorState};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An agreed-upon application protocol document: Markdown text with fixed
/// Requirements/Protocol Flow/Data Format/Error Handling sections, hashed on
/// demand rather than cached, so the hash is never trusted from a stale
/// `meta_data.json` entry (spec §4.F invariant). Immutable once hashed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolDocument {
    /// The document body: Markdown text produced by the negotiator,
    /// carried on the wire as the `candidateProtocols` string.
    pub body: String,
}

impl ProtocolDocument {
    /// Wrap a negotiated document body.
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Canonical UTF-8 bytes this document hashes over.
    fn canonical_bytes(&self) -> &[u8] {
        self.body.as_bytes()
    }

    /// `sha256:`-prefixed content hash, recomputed every call.
    pub fn hash(&self) -> String {
        let digest = Sha256::digest(self.canonical_bytes());
        format!("sha256:{digest:x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_content_bound() {
        let doc = ProtocolDocument::new("# Requirements\nEcho text back.\n");
        assert_eq!(doc.hash(), doc.hash());

        let other = ProtocolDocument::new("# Requirements\nEcho text twice.\n");
        assert_ne!(doc.hash(), other.hash());
    }

    #[test]
    fn hash_has_sha256_prefix() {
        let doc = ProtocolDocument::new("");
        assert!(doc.hash().starts_with("sha256:"));
    }
}
