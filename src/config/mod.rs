//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`NEG_*`)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{NegError, Result};

/// Main configuration struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// LLM client configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Meta-negotiation timing and bounds.
    #[serde(default)]
    pub negotiation: NegotiationConfig,

    /// Where generated protocol artifact bundles live.
    #[serde(default = "default_protocol_code_path")]
    pub protocol_code_path: PathBuf,

    /// Heartbeat sub-protocol timing.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            negotiation: NegotiationConfig::default(),
            protocol_code_path: default_protocol_code_path(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| NegError::Config(format!("failed to read config file: {e}")))?;
        toml::from_str(&content).map_err(|e| NegError::Config(format!("failed to parse config: {e}")))
    }

    /// Load configuration from environment variables, layered over defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("NEG_LLM_BASE_URL") {
            config.llm.base_url = val;
        }
        if let Ok(val) = std::env::var("NEG_LLM_API_KEY") {
            config.llm.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("NEG_LLM_MODEL") {
            config.llm.model_name = val;
        }
        if let Ok(val) = std::env::var("NEG_PROTOCOL_CODE_PATH") {
            config.protocol_code_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("NEG_MAX_ROUNDS") {
            if let Ok(val) = val.parse() {
                config.negotiation.max_rounds = val;
            }
        }

        config
    }

    /// Merge with another config; `other`'s explicitly-set fields take
    /// precedence (used to layer environment overrides onto a file config).
    pub fn merge(self, other: Self) -> Self {
        Self {
            llm: other.llm,
            negotiation: other.negotiation,
            protocol_code_path: other.protocol_code_path,
            heartbeat: other.heartbeat,
        }
    }
}

fn default_protocol_code_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("negproto")
        .join("protocols")
}

/// LLM endpoint configuration (spec §6: base_url, api_key, model_name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible chat completions endpoint.
    pub base_url: String,
    /// API key, if the endpoint requires one.
    pub api_key: Option<String>,
    /// Model identifier; purely configuration, never hardcoded (spec §4.C).
    pub model_name: String,
    /// Request timeout for a single LLM call.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model_name: "gpt-4o".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Meta-negotiation timing and round bounds (spec §4.D, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// Maximum negotiation rounds before forcing REJECTED.
    pub max_rounds: u32,
    /// Per-inbound-message wait timeout, in seconds.
    pub inbound_timeout_secs: u64,
    /// Code-generation barrier wait timeout, in seconds.
    pub code_generation_timeout_secs: u64,
    /// Default `send_request` timeout, in seconds, unless the agreed
    /// document overrides it.
    pub default_request_timeout_secs: u64,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            inbound_timeout_secs: 60,
            code_generation_timeout_secs: 60,
            default_request_timeout_secs: 15,
        }
    }
}

/// Heartbeat sub-protocol timing (spec §4.B, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Interval between PINGs, in seconds.
    pub interval_secs: u64,
    /// How long a missed PONG is tolerated before the session fails.
    pub missed_window_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            missed_window_secs: 15,
        }
    }
}
