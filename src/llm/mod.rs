//! LLM client abstraction (spec §4.C).
//!
//! The negotiator and code generator treat the LLM purely as a design
//! oracle reached through this trait — never hardcoded to one vendor's
//! SDK, so the same negotiation logic runs against any OpenAI-compatible
//! chat completions endpoint.

pub mod mock;
pub mod openai;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A tool the LLM may call during [`LlmClient::complete_with_tools`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name, as the LLM will reference it in a tool call.
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub parameters: Value,
}

/// Future returned by a [`ToolHandler`].
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

/// Callback invoked when the LLM requests a tool call: `(tool_name, args)`.
pub type ToolHandler = Arc<dyn Fn(&str, Value) -> ToolFuture + Send + Sync>;

/// Object-safe LLM client, usable as `Arc<dyn LlmClient>` so the same
/// negotiator code runs against a real endpoint or a scripted test double.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Free-form chat completion; returns the assistant's text response.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Chat completion constrained to return JSON matching `schema`
    /// (spec §4.C: every negotiation/evaluation round is JSON-mode).
    async fn complete_json(&self, system: &str, user: &str, schema: &Value) -> Result<Value>;

    /// Chat completion with tool-calling; `tool_handler` is invoked for
    /// each tool call the model makes, and its result is fed back until
    /// the model produces a final JSON response.
    async fn complete_with_tools(
        &self,
        system: &str,
        user: &str,
        tools: &[ToolSpec],
        tool_handler: ToolHandler,
    ) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedClient;

    #[tokio::test]
    async fn scripted_client_returns_queued_response() {
        let client = ScriptedClient::new().with_completion("hello back");
        let result = client.complete("system", "hi").await.unwrap();
        assert_eq!(result, "hello back");
    }
}
