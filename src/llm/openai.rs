//! OpenAI-compatible chat completions client.
//!
//! Speaks the `/chat/completions` REST shape common to OpenAI and
//! self-hosted OpenAI-compatible servers (vLLM, Ollama's OpenAI shim,
//! etc.), so swapping `base_url`/`model_name` in [`crate::config::LlmConfig`]
//! is enough to point the negotiator at a different backend.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{LlmClient, ToolHandler, ToolSpec};
use crate::config::LlmConfig;
use crate::error::{NegError, Result};

/// Client backed by `reqwest` against an OpenAI-compatible endpoint.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model_name: String,
}

impl OpenAiClient {
    /// Build a client from the ambient LLM configuration.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| NegError::Llm(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model_name: config.model_name.clone(),
        })
    }

    fn request(&self, body: Value) -> reqwest::RequestBuilder {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut req = self.http.post(url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn chat(&self, body: Value) -> Result<Value> {
        let response = self.request(body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(NegError::Llm(format!("endpoint returned {status}: {text}")));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| NegError::Llm(format!("failed to parse completion response: {e}")))
    }

    fn first_message_content(response: &Value) -> Result<String> {
        response
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| NegError::Llm("completion response missing choices[0].message.content".to_string()))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.model_name,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        let response = self.chat(body).await?;
        Self::first_message_content(&response)
    }

    async fn complete_json(&self, system: &str, user: &str, schema: &Value) -> Result<Value> {
        let body = json!({
            "model": self.model_name,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "negotiation_response",
                    "schema": schema,
                },
            },
        });
        let response = self.chat(body).await?;
        let content = Self::first_message_content(&response)?;
        serde_json::from_str(&content).map_err(NegError::from)
    }

    async fn complete_with_tools(
        &self,
        system: &str,
        user: &str,
        tools: &[ToolSpec],
        tool_handler: ToolHandler,
    ) -> Result<Value> {
        let tool_defs: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    },
                })
            })
            .collect();

        let mut messages = vec![
            json!({"role": "system", "content": system}),
            json!({"role": "user", "content": user}),
        ];

        // Tool-calling loop: feed each call's result back until the model
        // settles on a final content-bearing response.
        loop {
            let body = json!({
                "model": self.model_name,
                "messages": messages,
                "tools": tool_defs,
            });
            let response = self.chat(body).await?;
            let choice = response
                .get("choices")
                .and_then(|c| c.as_array())
                .and_then(|arr| arr.first())
                .ok_or_else(|| NegError::Llm("completion response missing choices[0]".to_string()))?;
            let message = choice
                .get("message")
                .ok_or_else(|| NegError::Llm("choice missing message".to_string()))?;

            let tool_calls = message.get("tool_calls").and_then(|v| v.as_array());
            let Some(tool_calls) = tool_calls.filter(|c| !c.is_empty()) else {
                let content = message
                    .get("content")
                    .and_then(|c| c.as_str())
                    .ok_or_else(|| NegError::Llm("final message missing content".to_string()))?;
                return serde_json::from_str(content).map_err(NegError::from);
            };

            messages.push(message.clone());
            for call in tool_calls {
                let name = call
                    .get("function")
                    .and_then(|f| f.get("name"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let args_str = call
                    .get("function")
                    .and_then(|f| f.get("arguments"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("{}");
                let args: Value = serde_json::from_str(args_str).unwrap_or(Value::Null);
                let call_id = call.get("id").and_then(|v| v.as_str()).unwrap_or_default();

                let result = tool_handler(name, args).await?;
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": result,
                }));
            }
        }
    }
}
