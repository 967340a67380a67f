//! The meta-protocol negotiation state machine (spec §4.D).
//!
//! Grounded on `protocol::Session`'s HELLO/ACCEPT/REJECT state machine
//! (`process_hello`/`process_accept`/`process_reject`), generalized from a
//! fixed two-message handshake into an open-ended, LLM-evaluated
//! proposal/counter-proposal loop.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use super::message::{NegotiationBody, NegotiationStatus};
use super::prompts;
use crate::error::{NegError, Result};
use crate::llm::{LlmClient, ToolHandler, ToolSpec};

/// Which side of the negotiation this instance plays (spec §9 supplement:
/// carried explicitly so a negotiator can't be driven out of its assigned
/// role).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiatorRole {
    /// Initiates round 1 and judges counter-proposals against its own
    /// requirement.
    Requester,
    /// Receives round 1 and judges proposals against its own capabilities.
    Provider,
}

/// Negotiation state machine states (spec §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiatorState {
    /// No proposal exchanged yet.
    Init,
    /// Requester has produced round 1 and is about to send it.
    Proposing,
    /// Waiting on / processing the peer's latest frame.
    Evaluating,
    /// Mid-negotiation: a non-final round was just recorded.
    Negotiating,
    /// Terminal: both sides converged on a document.
    Accepted,
    /// Terminal: negotiation failed to converge.
    Rejected,
}

/// One round recorded in the negotiation history.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// The round number this entry was recorded under.
    pub round: u32,
    /// The candidate protocol document as of this round: Markdown text.
    pub candidate_protocol: String,
    /// Modification summary attached to this round, if any.
    pub modification_summary: Option<String>,
}

/// Result of evaluating one incoming frame.
#[derive(Debug, Clone)]
pub struct NegotiationOutcome {
    /// The status this negotiator has settled on for this round.
    pub status: NegotiationStatus,
    /// The candidate document to send back (meaningless once `Rejected`):
    /// Markdown text.
    pub candidate_protocol: String,
    /// Explanation attached to a non-accepted outcome.
    pub modification_summary: Option<String>,
}

/// Drives one side of a protocol negotiation to `Accepted` or `Rejected`.
pub struct Negotiator {
    role: NegotiatorRole,
    state: NegotiatorState,
    round: u32,
    max_rounds: u32,
    history: Vec<HistoryEntry>,
    capability_info_history: Vec<String>,
    llm: Arc<dyn LlmClient>,
    capability_tools: Vec<ToolSpec>,
    capability_handler: Option<ToolHandler>,
}

impl Negotiator {
    /// Build a new negotiator for `role`.
    pub fn new(role: NegotiatorRole, llm: Arc<dyn LlmClient>, max_rounds: u32) -> Self {
        Self {
            role,
            state: NegotiatorState::Init,
            round: 0,
            max_rounds,
            history: Vec::new(),
            capability_info_history: Vec::new(),
            llm,
            capability_tools: Vec::new(),
            capability_handler: None,
        }
    }

    /// Install the provider's `get_capability_info` tool (spec §9
    /// supplement). Calling this on a requester negotiator is inert.
    pub fn with_capability_tool(mut self, tool: ToolSpec, handler: ToolHandler) -> Self {
        self.capability_tools.push(tool);
        self.capability_handler = Some(handler);
        self
    }

    /// Current state.
    pub fn state(&self) -> NegotiatorState {
        self.state
    }

    /// Current round number.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Role this instance plays.
    pub fn role(&self) -> NegotiatorRole {
        self.role
    }

    /// Requester-only: produce round 1 from a stated requirement.
    pub async fn propose_initial(
        &mut self,
        requirement: &str,
        input_desc: &str,
        output_desc: &str,
    ) -> Result<NegotiationBody> {
        if self.role != NegotiatorRole::Requester {
            return Err(NegError::Protocol(
                "only the requester proposes round 1".to_string(),
            ));
        }
        if self.state != NegotiatorState::Init {
            return Err(NegError::Protocol(format!(
                "cannot propose_initial from state {:?}",
                self.state
            )));
        }

        self.state = NegotiatorState::Proposing;
        let user = format!(
            "Requirement: {requirement}\nInput description: {input_desc}\nOutput description: {output_desc}"
        );
        let response = self
            .llm
            .complete_json(prompts::INITIAL_SYSTEM_PROMPT, &user, &initial_schema())
            .await
            .map_err(|e| NegError::Llm(e.to_string()))?;

        let candidate = response
            .get("candidateProtocols")
            .and_then(|v| v.as_str())
            .ok_or_else(|| NegError::CodeGenFailed("LLM omitted candidateProtocols".to_string()))?
            .to_string();
        let modification_summary = response
            .get("modificationSummary")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        self.round = 1;
        self.history.push(HistoryEntry {
            round: 1,
            candidate_protocol: candidate.clone(),
            modification_summary: modification_summary.clone(),
        });
        self.state = NegotiatorState::Evaluating;

        Ok(NegotiationBody {
            message_id: Uuid::new_v4().to_string(),
            sequence_id: 1,
            status: NegotiationStatus::Negotiating,
            candidate_protocols: candidate,
            modification_summary,
        })
    }

    /// Provider-only: accept the requester's round-1 proposal into history
    /// without yet producing a counter-response (call [`Self::evaluate`]
    /// next to produce one).
    pub fn receive_initial(&mut self, peer_round: u32, candidate: String) -> Result<()> {
        if self.role != NegotiatorRole::Provider {
            return Err(NegError::Protocol(
                "only the provider receives round 1".to_string(),
            ));
        }
        if self.state != NegotiatorState::Init {
            return Err(NegError::Protocol(format!(
                "cannot receive_initial from state {:?}",
                self.state
            )));
        }
        if peer_round != 1 {
            warn!(peer_round, "expected round 1 as the opening frame, proceeding anyway");
        }
        self.round = peer_round;
        self.history.push(HistoryEntry {
            round: peer_round,
            candidate_protocol: candidate,
            modification_summary: None,
        });
        self.state = NegotiatorState::Evaluating;
        Ok(())
    }

    /// Evaluate the peer's latest round and produce this side's response.
    ///
    /// `peer_round` is the round number the peer's frame claimed. Per
    /// spec §9, a mismatch against `local_round + 1` is tolerated: logged
    /// and negotiation proceeds rather than aborting, matching the
    /// prototype's commented-out abort path.
    pub async fn evaluate(&mut self, peer_round: u32, peer_candidate: String) -> Result<NegotiationOutcome> {
        if !matches!(self.state, NegotiatorState::Evaluating | NegotiatorState::Negotiating) {
            return Err(NegError::Protocol(format!(
                "cannot evaluate from state {:?}",
                self.state
            )));
        }

        let expected = self.round + 1;
        if peer_round != expected {
            warn!(
                peer_round,
                expected, "negotiation round mismatch tolerated, proceeding"
            );
        }

        if self.round + 1 >= self.max_rounds {
            self.state = NegotiatorState::Rejected;
            return Ok(NegotiationOutcome {
                status: NegotiationStatus::Rejected,
                candidate_protocol: peer_candidate,
                modification_summary: Some(format!(
                    "negotiation exceeded max_rounds ({})",
                    self.max_rounds
                )),
            });
        }

        let system_prompt = match self.role {
            NegotiatorRole::Requester => prompts::EVALUATION_SYSTEM_PROMPT_REQUESTER,
            NegotiatorRole::Provider => prompts::EVALUATION_SYSTEM_PROMPT_PROVIDER,
        };
        let user = format!(
            "Round {peer_round} candidate protocol:\n{}\n\nHistory so far: {} prior round(s).",
            peer_candidate,
            self.history.len()
        );

        let response = if self.role == NegotiatorRole::Provider && !self.capability_tools.is_empty() {
            let handler = self
                .capability_handler
                .clone()
                .expect("capability_tools implies capability_handler");
            let captured = handler.clone();
            let response = self
                .llm
                .complete_with_tools(system_prompt, &user, &self.capability_tools, captured)
                .await
                .map_err(|e| NegError::Llm(e.to_string()))?;
            // The tool call arguments aren't visible here (the handler ran
            // inside the LLM client); record that a capability check
            // occurred for this round.
            self.capability_info_history
                .push(format!("round {peer_round}: capability check invoked"));
            response
        } else {
            self.llm
                .complete_json(system_prompt, &user, &evaluation_schema())
                .await
                .map_err(|e| NegError::Llm(e.to_string()))?
        };

        let status = parse_status(&response)?;
        let candidate = response
            .get("candidateProtocols")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or(peer_candidate);
        let modification_summary = response
            .get("modificationSummary")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        self.round += 2;
        self.history.push(HistoryEntry {
            round: self.round,
            candidate_protocol: candidate.clone(),
            modification_summary: modification_summary.clone(),
        });

        self.state = match status {
            NegotiationStatus::Accepted => NegotiatorState::Accepted,
            NegotiationStatus::Rejected => NegotiatorState::Rejected,
            NegotiationStatus::Negotiating => NegotiatorState::Negotiating,
        };

        Ok(NegotiationOutcome {
            status,
            candidate_protocol: candidate,
            modification_summary,
        })
    }

    /// Once `Accepted`, the document this negotiator will hand to
    /// `codegen::generate`.
    ///
    /// Per spec §9, this is always the negotiator's own last history
    /// entry, never a peer-supplied `candidateProtocols` value carried on
    /// an `ACCEPTED` wire frame — those are logged as a mismatch and
    /// discarded rather than trusted.
    pub fn into_document(&self) -> Result<String> {
        if self.state != NegotiatorState::Accepted {
            return Err(NegError::Protocol(format!(
                "cannot finalize document from state {:?}",
                self.state
            )));
        }
        self.history
            .last()
            .map(|entry| entry.candidate_protocol.clone())
            .ok_or_else(|| NegError::Protocol("accepted with empty history".to_string()))
    }

    /// Discard a wire-carried `candidateProtocols` value on an `ACCEPTED`
    /// frame that disagrees with our own last history entry, logging the
    /// mismatch instead of trusting it.
    pub fn reconcile_accepted(&self, wire_candidate: &str) {
        if let Some(last) = self.history.last() {
            if last.candidate_protocol != wire_candidate {
                warn!("peer's ACCEPTED candidateProtocols disagrees with our own history; keeping ours");
            }
        }
    }

    /// Capability strings accumulated across provider evaluation rounds.
    pub fn capability_info_history(&self) -> &[String] {
        &self.capability_info_history
    }
}

fn parse_status(response: &Value) -> Result<NegotiationStatus> {
    let status = response
        .get("status")
        .and_then(|v| v.as_str())
        .ok_or_else(|| NegError::CodeGenFailed("LLM response missing status".to_string()))?;
    match status {
        "negotiating" => Ok(NegotiationStatus::Negotiating),
        "accepted" => Ok(NegotiationStatus::Accepted),
        "rejected" => Ok(NegotiationStatus::Rejected),
        other => Err(NegError::CodeGenFailed(format!("unknown status {other}"))),
    }
}

fn initial_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "candidateProtocols": {"type": "string"},
            "modificationSummary": {"type": "string"},
        },
        "required": ["candidateProtocols"],
    })
}

fn evaluation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "status": {"type": "string", "enum": ["negotiating", "accepted", "rejected"]},
            "candidateProtocols": {"type": ["string", "null"]},
            "modificationSummary": {"type": "string"},
        },
        "required": ["status"],
    })
}
