//! Runtime configuration with documented defaults
//!
//! Values come from three layers, later ones winning:
//! built-in defaults, an optional TOML file, then environment variables.
//! CLI flags are applied on top by the binary.

use crate::core::error::{McpError, Result};
use crate::llm::client::ApiFormat;
use serde::Deserialize;
use std::path::Path;

/// Default completion endpoint (Anthropic Messages API)
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Default model used when neither file nor environment names one
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub relay: RelaySettings,
    pub llm: LlmSettings,
}

/// Where the relay listens
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Bind address for the HTTP/WebSocket listener
    pub host: String,

    /// Listener port. The editor extension connects to this port by default.
    pub port: u16,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3001,
        }
    }
}

/// Completion service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Endpoint URL. Anything not on anthropic.com is spoken to in the
    /// OpenAI-compatible chat format.
    pub api_url: String,

    pub model: String,

    /// Wire format (`"anthropic"` or `"openai"`). Detected from `api_url`
    /// when unset.
    pub api_format: Option<ApiFormat>,

    /// Upper bound on completion length. A single command fits easily.
    pub max_tokens: u32,

    /// Request timeout in seconds, enforced by the HTTP client
    pub timeout_secs: u64,

    /// Never read from the TOML file, only from the environment
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            model: DEFAULT_MODEL.into(),
            api_format: None,
            max_tokens: 1000,
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl Config {
    /// Load from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, &path.display().to_string())
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Self::parse(contents, "TOML")
    }

    fn parse(contents: &str, origin: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| McpError::Config(format!("Failed to parse {}: {}", origin, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Environment overrides. `CLAUDE_*` names take precedence over `LLM_*`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| lookup(*key).filter(|v| !v.trim().is_empty()))
        };

        if let Some(key) = first(&["CLAUDE_API_KEY", "LLM_API_KEY"]) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = first(&["CLAUDE_MODEL", "LLM_MODEL"]) {
            self.llm.model = model;
        }
        if let Some(url) = first(&["LLM_API_URL"]) {
            self.llm.api_url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            return Err(McpError::Config("llm.model must not be empty".into()));
        }
        if self.llm.max_tokens == 0 {
            return Err(McpError::Config("llm.max_tokens must be > 0".into()));
        }
        if self.llm.timeout_secs == 0 {
            return Err(McpError::Config("llm.timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}
