// Credentials for the completions endpoint.
// Clients ask a CredentialSource on every request so a key changed in the
// host's settings takes effect on the next call without rebuilding anything.

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Configuration for an OpenAI-compatible provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,
    /// Base URL for the API (optional, defaults to https://api.openai.com/v1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(OPENAI_API_BASE)
            .trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::InvalidConfig("API key is not set".to_string()));
        }
        Ok(())
    }
}

/// Supplies provider credentials at request time
pub trait CredentialSource: Send + Sync {
    fn credentials(&self) -> Result<OpenAIConfig>;
}

impl CredentialSource for OpenAIConfig {
    fn credentials(&self) -> Result<OpenAIConfig> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_url() {
        let config = OpenAIConfig::new("test-key");
        assert_eq!(config.base_url(), OPENAI_API_BASE);
    }

    #[test]
    fn test_custom_base_url_trailing_slash() {
        let config = OpenAIConfig::new("test-key").with_base_url("https://openrouter.ai/api/v1/");
        assert_eq!(config.base_url(), "https://openrouter.ai/api/v1");
    }

    #[test]
    fn test_empty_key_rejected() {
        let err = OpenAIConfig::new("  ").validate().unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = OpenAIConfig::new("test-key").with_base_url("http://localhost:8080/v1");

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: OpenAIConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.base_url(), "http://localhost:8080/v1");
        assert_eq!(deserialized.api_key, "test-key");
    }
}
