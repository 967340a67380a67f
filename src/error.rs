//! Crate-wide error type with epistemic classification.
//!
//! # Epistemic Error Taxonomy
//!
//! Errors are organized by what they tell us about the state of knowledge at
//! the time of failure:
//!
//! - **B_i Falsified** — a belief about validity was proven wrong (bad input,
//!   wrong state). Handling: validate, return a clear error, don't retry.
//! - **I^B Materialized** — bounded ignorance about external state (network,
//!   LLM, filesystem) resolved unfavorably at runtime. Handling: timeout,
//!   retry, or surface to the caller.

use thiserror::Error;

use crate::channel::crypto::CryptoError;

/// Errors produced by this crate, organized by epistemic category.
#[derive(Error, Debug)]
pub enum NegError {
    // ═══════════════════════════════════════════════════════════════════
    // B_i FALSIFIED — caller's belief about validity proven wrong
    // ═══════════════════════════════════════════════════════════════════
    /// A meta or application frame's header or body didn't parse.
    ///
    /// **Epistemic**: B_i falsified — caller believed the frame was well-formed.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// The negotiator received a call that is invalid in its current state.
    ///
    /// **Epistemic**: B_i falsified — caller believed the operation was valid
    /// in the current state.
    #[error("negotiation protocol error: {0}")]
    Protocol(String),

    /// Negotiation terminated without reaching agreement.
    ///
    /// **Epistemic**: B_i falsified — caller believed negotiation would
    /// converge.
    #[error("negotiation rejected: {0}")]
    NegotiationRejected(String),

    /// A session operation was attempted before the session reached
    /// `Established`.
    ///
    /// **Epistemic**: B_i falsified — caller believed the session was ready.
    #[error("session not established")]
    SessionNotEstablished,

    /// The session's short-term key has expired.
    ///
    /// **Epistemic**: B_i falsified — caller believed the session was still
    /// valid.
    #[error("session expired")]
    SessionExpired,

    /// An incoming frame's `secret_key_id` did not match the session's.
    ///
    /// **Epistemic**: B_i falsified — caller believed the peer was using the
    /// current key.
    #[error("key id mismatch: expected {expected}, got {got}")]
    KeyMismatch {
        /// The key id this session expects.
        expected: String,
        /// The key id the frame actually carried.
        got: String,
    },

    /// Code generation produced no usable artifact.
    ///
    /// **Epistemic**: B_i falsified — caller believed the LLM would produce
    /// a usable descriptor and dispatch plan.
    #[error("code generation failed: {0}")]
    CodeGenFailed(String),

    /// An artifact bundle failed hash verification on load.
    ///
    /// **Epistemic**: B_i falsified — caller believed the bundle on disk was
    /// untampered.
    #[error("artifact hash mismatch in bundle {bundle}: {detail}")]
    ArtifactHashMismatch {
        /// The bundle directory name.
        bundle: String,
        /// What failed verification.
        detail: String,
    },

    /// No artifact is registered for the requested protocol hash.
    ///
    /// **Epistemic**: B_i falsified — caller believed the protocol had been
    /// generated and registered.
    #[error("no artifact registered for protocol hash {0}")]
    ArtifactNotFound(String),

    /// A DSL program referenced a field or JSON pointer that doesn't resolve.
    ///
    /// **Epistemic**: B_i falsified — caller believed the dispatch plan
    /// matched the document's data format.
    #[error("dispatch plan error: {0}")]
    DispatchPlan(String),

    /// Configuration is invalid or missing a required value.
    ///
    /// **Epistemic**: B_i falsified — caller believed config was valid.
    #[error("config error: {0}")]
    Config(String),

    /// JSON (de)serialization failed.
    ///
    /// **Epistemic**: B_i falsified — caller believed the payload was valid
    /// JSON matching the expected shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════
    // I^B MATERIALIZED — external state unknown until runtime
    // ═══════════════════════════════════════════════════════════════════
    /// The underlying channel collaborator failed (closed, send/recv error).
    ///
    /// **Epistemic**: I^B materialized — channel availability was unknown
    /// until the operation was attempted.
    #[error("channel error: {0}")]
    Channel(String),

    /// The LLM client failed or returned something unusable.
    ///
    /// **Epistemic**: I^B materialized — LLM availability/output was unknown
    /// until the call was made.
    #[error("llm error: {0}")]
    Llm(String),

    /// Waiting for a peer frame (negotiation round, code-gen barrier,
    /// `send_request`) exceeded its deadline.
    ///
    /// **Epistemic**: I^B materialized — peer responsiveness was unknown
    /// until the deadline passed.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// Filesystem operation on an artifact bundle failed.
    ///
    /// **Epistemic**: I^B materialized — filesystem state was unknown until
    /// the operation was attempted.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Cryptographic operation failed (key derivation, AEAD, key exchange).
    ///
    /// **Epistemic**: mixed — may be B_i (invalid key) or I^B (RNG failure);
    /// the inner `CryptoError` classifies it further.
    #[error("crypto error: {0}")]
    Crypto(#[source] CryptoError),
}

/// Result alias for this crate's operations.
pub type Result<T> = std::result::Result<T, NegError>;

impl From<CryptoError> for NegError {
    fn from(err: CryptoError) -> Self {
        NegError::Crypto(err)
    }
}

impl From<toml::de::Error> for NegError {
    fn from(err: toml::de::Error) -> Self {
        NegError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for NegError {
    fn from(err: reqwest::Error) -> Self {
        NegError::Llm(err.to_string())
    }
}

impl NegError {
    /// Returns `true` if this error stems from external state that may
    /// resolve differently on retry.
    pub fn is_bounded_ignorance(&self) -> bool {
        matches!(
            self,
            NegError::Channel(_) | NegError::Llm(_) | NegError::Timeout(_) | NegError::Io(_)
        )
    }

    /// Maps an application-layer failure onto the HTTP-style status code
    /// the agreed protocol document's error handling section requires
    /// (spec §7 Application taxonomy).
    pub fn as_http_code(&self) -> u16 {
        match self {
            NegError::Timeout(_) => 504,
            NegError::InvalidFrame(_) | NegError::DispatchPlan(_) | NegError::Json(_) => 400,
            NegError::SessionNotEstablished | NegError::ArtifactNotFound(_) => 500,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_ignorance_classification() {
        assert!(NegError::Channel("closed".into()).is_bounded_ignorance());
        assert!(NegError::Llm("503".into()).is_bounded_ignorance());
        assert!(!NegError::SessionNotEstablished.is_bounded_ignorance());
        assert!(!NegError::InvalidFrame("short".into()).is_bounded_ignorance());
    }

    #[test]
    fn http_code_mapping() {
        assert_eq!(NegError::Timeout("send_request".into()).as_http_code(), 504);
        assert_eq!(NegError::InvalidFrame("x".into()).as_http_code(), 400);
        assert_eq!(NegError::SessionNotEstablished.as_http_code(), 500);
    }
}
