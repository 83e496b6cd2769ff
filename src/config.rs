//! Environment-driven configuration.
//!
//! Values come from the process environment (after `.env` is loaded by the
//! binary); CLI flags override them.

use crate::error::{Result, Text2SqlError};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SCHEMA_PATH: &str = "metadata/schema.json";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Upper bound for a single LLM call.
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`; the API key is required, the rest
    /// fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("OPENAI_API_KEY")
            .or_else(|| non_empty("LLM_API_KEY"))
            .ok_or_else(|| {
                Text2SqlError::Config("OPENAI_API_KEY (or LLM_API_KEY) is not set".to_string())
            })?;

        let timeout_secs = match non_empty("LLM_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| Text2SqlError::Config(format!("Invalid LLM_TIMEOUT_SECS '{}': {}", raw, e)))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let temperature = match non_empty("LLM_TEMPERATURE") {
            Some(raw) => raw
                .trim()
                .parse::<f32>()
                .map_err(|e| Text2SqlError::Config(format!("Invalid LLM_TEMPERATURE '{}': {}", raw, e)))?,
            None => 0.1,
        };
        let max_tokens = match non_empty("LLM_MAX_TOKENS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|e| Text2SqlError::Config(format!("Invalid LLM_MAX_TOKENS '{}': {}", raw, e)))?,
            None => 2048,
        };

        Ok(Self {
            api_key,
            model: non_empty("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: non_empty("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            temperature,
            max_tokens,
        })
    }
}

/// Seed metadata location: `SCHEMA_PATH`, else [`DEFAULT_SCHEMA_PATH`].
pub fn schema_path_from_env() -> PathBuf {
    std::env::var("SCHEMA_PATH")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHEMA_PATH))
}
