//! Code generation without code execution (spec §4.E, resolved Open
//! Question: option (c)).
//!
//! Once a [`crate::negotiation::ProtocolDocument`] is accepted, each side
//! independently asks the LLM to *describe* its half of the interface and
//! then to *design* a [`dsl::Program`] implementing it. The crate never
//! compiles, `eval`s, or otherwise executes LLM-authored source text: the
//! program is a short list of field-mapping instructions that
//! [`crate::interpreter`] walks at session time.

pub mod descriptor;
pub mod dsl;
pub mod prompts;

pub use descriptor::InterfaceDescriptor;
pub use dsl::{Program, Step};

use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{NegError, Result};
use crate::llm::LlmClient;
use crate::negotiation::{NegotiatorRole, ProtocolDocument};

/// The two generated artifacts for one side of a negotiated protocol,
/// before they are written to disk as an artifact bundle.
#[derive(Debug, Clone)]
pub struct GeneratedSide {
    /// Suggested module/directory name.
    pub module_name: String,
    /// The interface description (JSON Schemas for request/response).
    pub descriptor: InterfaceDescriptor,
    /// The dispatch plan the interpreter executes for this side.
    pub program: Program,
}

/// Generate the requester-side artifact for an accepted protocol document.
pub async fn generate_requester(document: &ProtocolDocument, llm: &Arc<dyn LlmClient>) -> Result<GeneratedSide> {
    generate(document, NegotiatorRole::Requester, llm).await
}

/// Generate the provider-side artifact for an accepted protocol document.
pub async fn generate_provider(document: &ProtocolDocument, llm: &Arc<dyn LlmClient>) -> Result<GeneratedSide> {
    generate(document, NegotiatorRole::Provider, llm).await
}

async fn generate(document: &ProtocolDocument, role: NegotiatorRole, llm: &Arc<dyn LlmClient>) -> Result<GeneratedSide> {
    let doc_text = &document.body;

    let description_prompt = match role {
        NegotiatorRole::Requester => prompts::REQUESTER_DESCRIPTION_PROMPT,
        NegotiatorRole::Provider => prompts::PROVIDER_DESCRIPTION_PROMPT,
    };
    let description_user = format!("--[ protocol document ]--\n{doc_text}\n--[END]--");
    let description = llm
        .complete_json(description_prompt, &description_user, &description_schema())
        .await?;

    let module_name = description
        .get("moduleName")
        .and_then(Value::as_str)
        .unwrap_or("protocol_module")
        .to_string();
    let request_schema = description.get("requestSchema").cloned().unwrap_or_else(|| json!({}));
    let response_schema = description.get("responseSchema").cloned().unwrap_or_else(|| json!({}));
    let summary = description.get("summary").and_then(Value::as_str).map(str::to_string);

    let mut descriptor = InterfaceDescriptor::new(module_name.clone(), request_schema, response_schema);
    if let Some(summary) = summary {
        descriptor = descriptor.with_summary(summary);
    }

    let program_prompt = match role {
        NegotiatorRole::Requester => prompts::REQUESTER_PROGRAM_PROMPT,
        NegotiatorRole::Provider => prompts::PROVIDER_PROGRAM_PROMPT,
    };
    let program_user = format!(
        "--[ protocol document ]--\n{doc_text}\n--[END]--\n\n--[ interface description ]--\n{}\n--[END]--",
        serde_json::to_string_pretty(&descriptor)?
    );
    let program_value = llm
        .complete_json(program_prompt, &program_user, &program_schema())
        .await?;
    let program: Program = serde_json::from_value(program_value)
        .map_err(|e| NegError::CodeGenFailed(format!("malformed dispatch plan: {e}")))?;

    Ok(GeneratedSide { module_name, descriptor, program })
}

fn description_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "moduleName": {"type": "string"},
            "requestSchema": {"type": "object"},
            "responseSchema": {"type": "object"},
            "summary": {"type": "string"}
        },
        "required": ["moduleName", "requestSchema", "responseSchema"]
    })
}

fn program_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "steps": {"type": "array"}
        },
        "required": ["steps"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedClient;

    fn sample_document() -> ProtocolDocument {
        ProtocolDocument::new(
            "## Requirements\nEcho text back.\n\n## Protocol Flow\nOne request, one response.\n\n\
             ## Data Format\n{text: string}\n\n## Error Handling\nHTTP-style code field.\n",
        )
    }

    #[tokio::test]
    async fn generate_requester_parses_description_and_program() {
        let client: Arc<dyn LlmClient> = Arc::new(
            ScriptedClient::default()
                .with_json(json!({
                    "moduleName": "echo_protocol",
                    "requestSchema": {"type": "object"},
                    "responseSchema": {"type": "object"},
                    "summary": "echoes text back"
                }))
                .with_json(json!({
                    "steps": [
                        {"op": "extract", "jsonPointer": "/text", "targetField": "text"},
                        {"op": "require", "field": "text"}
                    ]
                })),
        );

        let doc = sample_document();
        let side = generate_requester(&doc, &client).await.unwrap();

        assert_eq!(side.module_name, "echo_protocol");
        assert_eq!(side.descriptor.summary.as_deref(), Some("echoes text back"));
        assert_eq!(side.program.steps.len(), 2);
    }

    #[tokio::test]
    async fn malformed_program_reports_codegen_failure() {
        let client: Arc<dyn LlmClient> = Arc::new(
            ScriptedClient::default()
                .with_json(json!({
                    "moduleName": "m",
                    "requestSchema": {},
                    "responseSchema": {}
                }))
                .with_json(json!({"steps": [{"op": "not-a-real-op"}]})),
        );

        let doc = sample_document();
        let err = generate_provider(&doc, &client).await.unwrap_err();
        assert!(matches!(err, NegError::CodeGenFailed(_)));
    }
}
