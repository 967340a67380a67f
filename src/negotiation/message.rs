//! Wire schema for meta-protocol frames (spec §4.D).
//!
//! Every meta frame is a flat `camelCase` JSON object tagged by `action`,
//! matching the schema the negotiation system prompt instructs the LLM to
//! produce and consume.

use serde::{Deserialize, Serialize};

/// A meta-negotiation frame, tagged flat by `action` (spec §6: every meta
/// frame is `{action, ...fields}`, not a nested `{type, body}` envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "action")]
pub enum MetaFrame {
    /// Proposes (or re-proposes, in a later round) a candidate protocol
    /// document.
    ProtocolNegotiation(NegotiationBody),
    /// Coordinates code-generation completion between the two peers once
    /// a document is `accepted` (spec §4.E/§9: no extra LLM round — this
    /// is a plain readiness handshake).
    CodeGeneration(CodeGenerationBody),
    /// Session heartbeat (spec §9: dialer-only, not symmetrized).
    Heartbeat(HeartbeatBody),
}

/// Body of a `protocolNegotiation` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationBody {
    /// Correlates request/response within a round.
    pub message_id: String,
    /// Monotonic round counter, starting at 1.
    pub sequence_id: u32,
    /// Current negotiation status.
    pub status: NegotiationStatus,
    /// The candidate protocol document under discussion: Markdown text.
    pub candidate_protocols: String,
    /// Free-form modification summary the LLM attaches to this round (shown
    /// to the peer's LLM on the next evaluation).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_summary: Option<String>,
}

/// Status of a negotiation round (spec §4.D state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationStatus {
    /// Still negotiating; peer should evaluate and respond.
    Negotiating,
    /// Peer accepts the candidate document as final.
    Accepted,
    /// Peer rejects negotiation outright; no further rounds.
    Rejected,
}

/// Body of a `codeGeneration` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeGenerationBody {
    /// Readiness state for this side of the generation handshake.
    pub status: CodeGenerationStatus,
}

/// Readiness states for the code-generation barrier (spec §4.E/§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeGenerationStatus {
    /// This side's artifact bundle is generated, hashed, and registered.
    Generated,
    /// This side failed to generate a usable artifact.
    Error,
}

/// Body of a `heartbeat` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatBody {
    /// `ping` or `pong`.
    pub kind: HeartbeatKind,
    /// Monotonic sequence number, echoed back in the `pong`.
    pub sequence: u64,
}

/// Heartbeat frame direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatKind {
    /// Sent by the dialer on its heartbeat interval.
    Ping,
    /// Sent by the listener in response to a `Ping`.
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_frame_serializes_camel_case_tagged() {
        let frame = MetaFrame::ProtocolNegotiation(NegotiationBody {
            message_id: "m-1".to_string(),
            sequence_id: 1,
            status: NegotiationStatus::Negotiating,
            candidate_protocols: "# Requirements\n...".to_string(),
            modification_summary: None,
        });

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["action"], "protocolNegotiation");
        assert_eq!(json["messageId"], "m-1");
        assert_eq!(json["sequenceId"], 1);
        assert!(json.get("body").is_none());
    }

    #[test]
    fn frame_roundtrips_through_json() {
        let frame = MetaFrame::Heartbeat(HeartbeatBody {
            kind: HeartbeatKind::Ping,
            sequence: 42,
        });
        let json = serde_json::to_string(&frame).unwrap();
        let parsed: MetaFrame = serde_json::from_str(&json).unwrap();
        match parsed {
            MetaFrame::Heartbeat(body) => {
                assert_eq!(body.kind, HeartbeatKind::Ping);
                assert_eq!(body.sequence, 42);
            }
            _ => panic!("expected heartbeat frame"),
        }
    }
}
