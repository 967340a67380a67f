//! Scripted [`LlmClient`] test double.
//!
//! Negotiation and code-gen tests queue up canned responses instead of
//! calling a real endpoint.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{LlmClient, ToolHandler, ToolSpec};
use crate::error::{NegError, Result};

/// An `LlmClient` that plays back pre-recorded responses in order.
#[derive(Default)]
pub struct ScriptedClient {
    completions: Mutex<Vec<String>>,
    json_responses: Mutex<Vec<Value>>,
}

impl ScriptedClient {
    /// Build an empty scripted client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain-text completion to return on the next `complete` call.
    pub fn with_completion(self, text: impl Into<String>) -> Self {
        self.completions.lock().unwrap().push(text.into());
        self
    }

    /// Queue a JSON value to return on the next `complete_json`/
    /// `complete_with_tools` call.
    pub fn with_json(self, value: Value) -> Self {
        self.json_responses.lock().unwrap().push(value);
        self
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        let mut queue = self.completions.lock().unwrap();
        if queue.is_empty() {
            return Err(NegError::Llm("scripted client exhausted".to_string()));
        }
        Ok(queue.remove(0))
    }

    async fn complete_json(&self, _system: &str, _user: &str, _schema: &Value) -> Result<Value> {
        let mut queue = self.json_responses.lock().unwrap();
        if queue.is_empty() {
            return Err(NegError::Llm("scripted client exhausted".to_string()));
        }
        Ok(queue.remove(0))
    }

    async fn complete_with_tools(
        &self,
        system: &str,
        user: &str,
        _tools: &[ToolSpec],
        _tool_handler: ToolHandler,
    ) -> Result<Value> {
        self.complete_json(system, user, &Value::Null).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_responses_play_back_in_fifo_order() {
        let client = ScriptedClient::new()
            .with_json(serde_json::json!({"round": 1}))
            .with_json(serde_json::json!({"round": 2}));

        let first = client.complete_json("s", "u", &Value::Null).await.unwrap();
        let second = client.complete_json("s", "u", &Value::Null).await.unwrap();
        assert_eq!(first["round"], 1);
        assert_eq!(second["round"], 2);
    }

    #[tokio::test]
    async fn exhausted_client_errors() {
        let client = ScriptedClient::new();
        assert!(client.complete_json("s", "u", &Value::Null).await.is_err());
    }
}
