//! Interface descriptors: the human/LLM-facing shape of a generated side,
//! kept alongside its [`crate::codegen::dsl::Program`] (spec §4.E step 1,
//! "Describe").
//!
//! These mirror `code_generator.py`'s `*_description.json` artifacts: a
//! JSON Schema for the request and response payloads plus a suggested
//! module name, used by callers (and by humans reading the artifact
//! bundle) to understand what a generated side actually accepts and
//! returns without reading the DSL program itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Describes one generated side's request/response contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDescriptor {
    /// Suggested module/directory name, derived from the protocol name.
    pub module_name: String,
    /// JSON Schema for the payload this side sends (requester) or accepts
    /// (provider).
    pub request_schema: Value,
    /// JSON Schema for the payload this side accepts (requester) or sends
    /// (provider).
    pub response_schema: Value,
    /// Free-form human-readable summary, carried over from the negotiated
    /// document's rationale where available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl InterfaceDescriptor {
    /// Build a descriptor from a negotiated protocol document.
    pub fn new(module_name: impl Into<String>, request_schema: Value, response_schema: Value) -> Self {
        Self {
            module_name: module_name.into(),
            request_schema,
            response_schema,
            summary: None,
        }
    }

    /// Attach a human-readable summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_serializes_camel_case() {
        let descriptor = InterfaceDescriptor::new("echo_protocol", json!({"type": "object"}), json!({"type": "object"}))
            .with_summary("echoes input back");
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["moduleName"], "echo_protocol");
        assert_eq!(value["summary"], "echoes input back");
    }

    #[test]
    fn descriptor_without_summary_omits_field() {
        let descriptor = InterfaceDescriptor::new("p", json!({}), json!({}));
        let value = serde_json::to_value(&descriptor).unwrap();
        assert!(value.get("summary").is_none());
    }
}
