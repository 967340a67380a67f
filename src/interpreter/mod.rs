//! Executes a [`crate::codegen::dsl::Program`] against a JSON document at
//! session time (spec §4.E step 3 / §9 resolved Open Question).
//!
//! This is the only place generated protocol logic actually runs. It walks
//! a fixed, small instruction set — no LLM-authored source is ever
//! compiled or `eval`-ed. `run_requester` and `run_provider` are the same
//! interpreter; the distinction is purely which side's `Program` and
//! source document the caller supplies.

use serde_json::{Map, Value};

use crate::codegen::dsl::{Program, Step};
use crate::error::{NegError, Result};

/// Run `program` against `source`, returning the constructed output
/// object.
///
/// Requester and provider both call this: a requester runs its program
/// against the caller-supplied input to build the outgoing request body; a
/// provider runs its program against an incoming request body to build the
/// callback input.
pub fn run(program: &Program, source: &Value) -> Result<Value> {
    let mut output = Map::new();
    for step in &program.steps {
        apply_step(step, source, &mut output)?;
    }
    Ok(Value::Object(output))
}

/// Alias kept for call-site clarity at requester call sites.
pub fn run_requester(program: &Program, input: &Value) -> Result<Value> {
    run(program, input)
}

/// Alias kept for call-site clarity at provider call sites.
pub fn run_provider(program: &Program, request: &Value) -> Result<Value> {
    run(program, request)
}

fn apply_step(step: &Step, source: &Value, output: &mut Map<String, Value>) -> Result<()> {
    match step {
        Step::Extract { json_pointer, target_field } => {
            let value = source.pointer(json_pointer).cloned().ok_or_else(|| {
                NegError::DispatchPlan(format!("json pointer {json_pointer} did not resolve in source document"))
            })?;
            output.insert(target_field.clone(), value);
        }
        Step::Validate { field, schema } => {
            let value = output
                .get(field)
                .ok_or_else(|| NegError::DispatchPlan(format!("validate: field {field} not yet present")))?;
            validate_type(field, value, schema)?;
        }
        Step::Require { field } => {
            if !output.contains_key(field) {
                return Err(NegError::DispatchPlan(format!("required field {field} is missing")));
            }
        }
        Step::Default { field, value } => {
            output.entry(field.clone()).or_insert_with(|| value.clone());
        }
    }
    Ok(())
}

fn validate_type(field: &str, value: &Value, schema: &Value) -> Result<()> {
    let Some(expected) = schema.get("type").and_then(Value::as_str) else {
        return Ok(());
    };
    let matches = match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    };
    if matches {
        Ok(())
    } else {
        Err(NegError::DispatchPlan(format!("field {field} does not match expected type {expected}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program() -> Program {
        Program::new(vec![
            Step::Extract { json_pointer: "/text".to_string(), target_field: "text".to_string() },
            Step::Validate { field: "text".to_string(), schema: json!({"type": "string"}) },
            Step::Require { field: "text".to_string() },
            Step::Default { field: "retries".to_string(), value: json!(0) },
        ])
    }

    #[test]
    fn program_builds_output_from_source_document() {
        let source = json!({"text": "hello"});
        let output = run(&program(), &source).unwrap();
        assert_eq!(output["text"], "hello");
        assert_eq!(output["retries"], 0);
    }

    #[test]
    fn missing_pointer_fails_with_dispatch_plan_error() {
        let source = json!({"other": "value"});
        let err = run(&program(), &source).unwrap_err();
        assert!(matches!(err, NegError::DispatchPlan(_)));
    }

    #[test]
    fn type_mismatch_fails_validation() {
        let source = json!({"text": 42});
        let err = run(&program(), &source).unwrap_err();
        assert!(matches!(err, NegError::DispatchPlan(_)));
    }

    #[test]
    fn default_does_not_override_present_value() {
        let prog = Program::new(vec![Step::Default { field: "retries".to_string(), value: json!(0) }]);
        let source = json!({});
        let mut output = Map::new();
        output.insert("retries".to_string(), json!(5));
        apply_step(&prog.steps[0], &source, &mut output).unwrap();
        assert_eq!(output["retries"], 5);
    }
}
