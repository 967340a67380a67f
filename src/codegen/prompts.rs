//! System prompts for the two-stage code generation LLM calls (spec §4.E).
//!
//! Grounded on `requester_generator.py`/`provider_generator.py`'s
//! description-then-class two-call shape: first ask the LLM to describe
//! the interface as JSON Schema, then ask it to design the dispatch plan
//! that implements that interface. Unlike the Python prototype, the second
//! call never asks for source code — it asks for a [`crate::codegen::dsl::Program`].

/// Description-stage prompt, requester side.
pub const REQUESTER_DESCRIPTION_PROMPT: &str = "\
You are a protocol architect analyzing a negotiated application protocol \
document. Produce a structured interface description for the REQUESTER \
side: the side that sends the initial request and receives the response.

Respond with a single JSON object:
{ \"moduleName\": <short snake_case name derived from the protocol>,
  \"requestSchema\": <JSON Schema for the payload this side sends>,
  \"responseSchema\": <JSON Schema for the payload this side receives>,
  \"summary\": <one sentence> }

Only describe fields that are part of the protocol's own business data; \
exclude meta fields like messageType or messageId that belong to the \
negotiation layer, not the application payload.";

/// Description-stage prompt, provider side.
pub const PROVIDER_DESCRIPTION_PROMPT: &str = "\
You are a protocol architect analyzing a negotiated application protocol \
document. Produce a structured interface description for the PROVIDER \
side: the side that receives the request and sends the response.

Respond with a single JSON object:
{ \"moduleName\": <short snake_case name derived from the protocol>,
  \"requestSchema\": <JSON Schema for the payload this side receives>,
  \"responseSchema\": <JSON Schema for the payload this side sends>,
  \"summary\": <one sentence> }

Only describe fields that are part of the protocol's own business data; \
exclude meta fields like messageType or messageId that belong to the \
negotiation layer, not the application payload.";

/// Dispatch-plan stage prompt, requester side.
pub const REQUESTER_PROGRAM_PROMPT: &str = "\
You are designing a dispatch plan for the REQUESTER side of a negotiated \
application protocol. The plan is executed by a fixed interpreter that \
only understands four operations, so you must express the mapping between \
caller input and the outgoing request entirely using them:

- extract: copy a value from a JSON Pointer in the source document into a \
named output field
- validate: assert a named field matches a JSON Schema type
- require: assert a named field is present
- default: fill a named field with a constant if absent

Respond with a single JSON object: { \"steps\": [ <step>, ... ] } where \
each step has an \"op\" field (\"extract\", \"validate\", \"require\", or \
\"default\") and the fields that operation needs.";

/// Dispatch-plan stage prompt, provider side.
pub const PROVIDER_PROGRAM_PROMPT: &str = "\
You are designing a dispatch plan for the PROVIDER side of a negotiated \
application protocol. The plan is executed by a fixed interpreter that \
only understands four operations, so you must express how an incoming \
request is validated and mapped into the callback input entirely using \
them:

- extract: copy a value from a JSON Pointer in the source document into a \
named output field
- validate: assert a named field matches a JSON Schema type
- require: assert a named field is present
- default: fill a named field with a constant if absent

Respond with a single JSON object: { \"steps\": [ <step>, ... ] } where \
each step has an \"op\" field (\"extract\", \"validate\", \"require\", or \
\"default\") and the fields that operation needs.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_prompts_name_the_four_ops() {
        for prompt in [REQUESTER_PROGRAM_PROMPT, PROVIDER_PROGRAM_PROMPT] {
            assert!(prompt.contains("extract"));
            assert!(prompt.contains("validate"));
            assert!(prompt.contains("require"));
            assert!(prompt.contains("default"));
        }
    }
}
