//! # negproto — runtime protocol negotiation between autonomous agents
//!
//! Two DID-identified agents dial each other over an encrypted channel and
//! agree, at runtime and without a shared prior protocol, on the
//! application-level message schema they'll use for the rest of the
//! session. An LLM acts as design oracle on both sides; once the two
//! negotiators converge on a document, each side asks the LLM to describe
//! its half of the interface and to design a small dispatch plan
//! implementing it. That plan — never raw LLM-authored source — is what
//! actually runs.
//!
//! ## Architecture
//!
//! ```text
//! Requester                                            Provider
//!    |-- X25519 public key ------------------------------->|
//!    |<------------------------------- X25519 public key --|
//!    |        (HKDF-SHA256 session key, AES-256-GCM from here on)
//!    |
//!    |== META: protocolNegotiation (round 1) ==============>|
//!    |<===================== META: protocolNegotiation =====|
//!    |                  ... N rounds ...                    |
//!    |== META: protocolNegotiation (accepted) =============>|
//!    |
//!    |   (both sides independently generate a dispatch plan)
//!    |
//!    |== META: codeGeneration (ready) =====================>|
//!    |<===================== META: codeGeneration (ready) ==|
//!    |
//!    |== APPLICATION: request ============================>|
//!    |<==================================== APPLICATION: response ==|
//! ```
//!
//! ## Modules
//!
//! - [`identity`]: DID (`did:key`, Ed25519) identity and signing.
//! - [`framing`]: the 1-byte wire header selecting meta/application/
//!   natural-language/verification lanes.
//! - [`channel`]: the encrypted session transport (X25519 + HKDF + AES-GCM)
//!   and the in-process reference transport used by tests and demos.
//! - [`negotiation`]: the meta-protocol state machine and wire schema.
//! - [`llm`]: the LLM client trait, an OpenAI-compatible implementation,
//!   and a scripted test double.
//! - [`codegen`]: turns an accepted protocol document into a descriptor +
//!   dispatch plan, via two LLM calls.
//! - [`artifact`]: on-disk bundle persistence and load-time-verified
//!   lookup by protocol hash.
//! - [`interpreter`]: executes a dispatch plan against a JSON document.
//! - [`session`]: the per-channel demultiplexing actor and the
//!   code-generation readiness barrier.
//! - [`orchestrator`]: the two end-to-end flows — connect as a requester,
//!   accept as a provider.
//! - [`config`]: configuration from TOML files and environment variables.
//! - [`error`]: the crate-wide error type.

pub mod artifact;
pub mod channel;
pub mod codegen;
pub mod config;
pub mod error;
pub mod framing;
pub mod identity;
pub mod interpreter;
pub mod llm;
pub mod negotiation;
pub mod orchestrator;
pub mod session;

pub use channel::{SecureChannel, Transport};
pub use config::Config;
pub use error::{NegError, Result};
pub use framing::{Header, ProtocolType};
pub use identity::DidIdentity;
pub use negotiation::{Negotiator, NegotiatorRole, ProtocolDocument};
pub use orchestrator::{Orchestrator, ProviderSession, RequesterSession};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Meta-data manifest specification version written into every generated
/// artifact bundle (spec §4.F).
pub const META_DATA_SPECIFICATION_VERSION: &str = "1.0";
