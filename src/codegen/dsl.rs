//! The restricted dispatch-plan DSL (spec §4.E / design note §9 option c).
//!
//! Instead of compiling or `eval`-ing LLM-authored source, code generation
//! produces a [`Program`]: a short sequence of field-mapping and
//! validation [`Step`]s. [`crate::interpreter`] executes a `Program`
//! against a JSON value at session time, so the LLM still designs the
//! request/response mapping but the runtime only ever executes this fixed,
//! auditable instruction set.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One instruction in a dispatch plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "op")]
pub enum Step {
    /// Copy the value at `json_pointer` (RFC 6901) in the source document
    /// into `target_field` of the output object.
    Extract {
        /// JSON Pointer into the source document.
        json_pointer: String,
        /// Field name in the output object.
        target_field: String,
    },
    /// Check that `field` in the output object so far matches a (small,
    /// non-recursive) JSON Schema fragment: `{"type": "..."}`.
    Validate {
        /// Field name to check.
        field: String,
        /// JSON Schema fragment; only the `type` keyword is interpreted.
        schema: Value,
    },
    /// Fail the plan if `field` is absent from the output object.
    Require {
        /// Field name that must be present.
        field: String,
    },
    /// If `field` is absent, set it to `value`.
    Default {
        /// Field name to default.
        field: String,
        /// Default value.
        value: Value,
    },
}

/// A named, ordered sequence of [`Step`]s, generated once per side
/// (requester/provider) per negotiated protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Program {
    /// Steps executed in order.
    pub steps: Vec<Step>,
}

impl Program {
    /// Build a program from a list of steps.
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn program_serializes_tagged_steps() {
        let program = Program::new(vec![
            Step::Extract {
                json_pointer: "/input/text".to_string(),
                target_field: "text".to_string(),
            },
            Step::Require { field: "text".to_string() },
        ]);
        let json = serde_json::to_value(&program).unwrap();
        assert_eq!(json["steps"][0]["op"], "extract");
        assert_eq!(json["steps"][1]["op"], "require");
    }

    #[test]
    fn program_roundtrips() {
        let program = Program::new(vec![Step::Default {
            field: "retries".to_string(),
            value: json!(0),
        }]);
        let text = serde_json::to_string(&program).unwrap();
        let parsed: Program = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, program);
    }
}
