//! System prompts steering the LLM through protocol negotiation.
//!
//! Grounded on `protocol_negotiator.py`'s `NEGOTIATION_INITIAL_SYSTEM_PROMPT`
//! and `NEGOTIATION_EVALUATION_SYSTEM_PROMPT_FOR_*` constants: the same
//! structural constraints (RFC 8259 JSON, JSON Schema draft-2020-12,
//! camelCase fields, `messageType`/`messageId` correlation, HTTP-style error
//! codes) expressed as Rust `const` strings instead of Python module
//! globals.

/// System prompt for round 1, sent only by the requester.
pub const INITIAL_SYSTEM_PROMPT: &str = "\
You are designing an application-level protocol that two autonomous agents \
will use to communicate over an already-established encrypted channel.

Requirements:
- All message bodies are RFC 8259 JSON.
- Field names are camelCase.
- Data formats are described with JSON Schema (2020-12 dialect).
- Every request/response pair is correlated by a messageId field.
- Error responses use HTTP-style numeric status codes in a code field.

The protocol document itself is Markdown text with exactly four sections, \
in this order: \"## Requirements\", \"## Protocol Flow\", \"## Data Format\", \
\"## Error Handling\". Protocol Flow describes the request and response \
message shapes needed to satisfy the stated requirement; Error Handling \
describes how the provider reports errors (timeouts, validation failures, \
capability mismatches).

Respond with a single JSON object: { \"candidateProtocols\": <document>, \
\"modificationSummary\": <string> } where <document> is a single JSON string \
containing the full Markdown document described above, not a nested object.";

/// System prompt for evaluation rounds, provider side (adds the
/// capability-check tool-calling contract).
pub const EVALUATION_SYSTEM_PROMPT_PROVIDER: &str = "\
You are the PROVIDER evaluating a candidate application protocol proposed by \
a requester agent. Use the get_capability_info tool to check whether you can \
fulfill the proposed data formats and operations before responding.

The candidate protocol is Markdown text with \"## Requirements\", \
\"## Protocol Flow\", \"## Data Format\", and \"## Error Handling\" sections. \
If you propose a change, return the complete revised Markdown document, not \
a diff or partial excerpt.

Respond with a single JSON object: { \"status\": \"negotiating\" | \
\"accepted\" | \"rejected\", \"candidateProtocols\": <document string or \
null>, \"modificationSummary\": <string, required unless status is \
accepted> }.

Only return \"accepted\" once the protocol is something you can implement \
exactly as described, using the capabilities you confirmed via the tool.";

/// System prompt for evaluation rounds, requester side.
pub const EVALUATION_SYSTEM_PROMPT_REQUESTER: &str = "\
You are the REQUESTER evaluating the provider's response to your candidate \
application protocol. Decide whether their counter-proposal still satisfies \
your original requirement.

The candidate protocol is Markdown text with \"## Requirements\", \
\"## Protocol Flow\", \"## Data Format\", and \"## Error Handling\" sections. \
If you propose a change, return the complete revised Markdown document, not \
a diff or partial excerpt.

Respond with a single JSON object: { \"status\": \"negotiating\" | \
\"accepted\" | \"rejected\", \"candidateProtocols\": <document string or \
null>, \"modificationSummary\": <string, required unless status is \
accepted> }.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_mention_json_contract_terms() {
        for prompt in [
            INITIAL_SYSTEM_PROMPT,
            EVALUATION_SYSTEM_PROMPT_PROVIDER,
            EVALUATION_SYSTEM_PROMPT_REQUESTER,
        ] {
            assert!(prompt.contains("JSON"));
            assert!(prompt.contains("camelCase") || prompt.contains("messageId") || prompt.contains("status"));
        }
    }
}
