use config::{Config as ConfigLoader, ConfigError, Environment, File};
use recap_core::{Preferences, SessionConfig};
use recap_llm::{CredentialSource, LlmError, OpenAIConfig};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub stream: StreamConfig,
    pub summary: SummaryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let preferences = Preferences::default();
        Self {
            base_url: None,
            model: preferences.model,
            temperature: preferences.temperature,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// 0 disables the idle timeout
    pub idle_timeout_secs: u64,
    /// Buffered updates between a session and the terminal
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: SessionConfig::default().idle_timeout_secs,
            channel_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub language: Option<String>,
    pub max_transcript_chars: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            language: None,
            max_transcript_chars: Preferences::default().max_transcript_chars,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{RECAP_ENV}.toml (if RECAP_ENV is set)
    /// 3. Environment variables such as RECAP_LLM__MODEL or RECAP_STREAM__IDLE_TIMEOUT_SECS
    ///
    /// The API key is never read from files; see [`EnvCredentials`].
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("RECAP_ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("RECAP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            model: self.llm.model.clone(),
            temperature: self.llm.temperature,
            language: self.summary.language.clone(),
            max_transcript_chars: self.summary.max_transcript_chars,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            idle_timeout_secs: self.stream.idle_timeout_secs,
        }
    }

    pub fn credentials(&self) -> EnvCredentials {
        EnvCredentials {
            base_url: self.llm.base_url.clone(),
        }
    }
}

/// Reads `OPENAI_API_KEY` from the environment on every request
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials {
    base_url: Option<String>,
}

impl CredentialSource for EnvCredentials {
    fn credentials(&self) -> recap_llm::Result<OpenAIConfig> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            LlmError::InvalidConfig("OPENAI_API_KEY environment variable is required".to_string())
        })?;

        let config = match &self.base_url {
            Some(base_url) => OpenAIConfig::new(api_key).with_base_url(base_url),
            None => OpenAIConfig::new(api_key),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_structure() {
        let toml = r#"
            [llm]
            base_url = "http://localhost:8080/v1"
            model = "gpt-4o"
            temperature = 0.2

            [stream]
            idle_timeout_secs = 30
            channel_capacity = 8

            [summary]
            language = "Portuguese"
            max_transcript_chars = 1000

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.stream.idle_timeout_secs, 30);
        assert_eq!(config.logging.format, "json");

        let preferences = config.preferences();
        assert_eq!(preferences.language.as_deref(), Some("Portuguese"));
        assert_eq!(preferences.max_transcript_chars, 1000);
        assert_eq!(preferences.temperature, Some(0.2));
        assert_eq!(config.session_config().idle_timeout_secs, 30);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = toml::from_str("[llm]\nmodel = \"gpt-4.1-mini\"\n").unwrap();

        assert_eq!(config.llm.model, "gpt-4.1-mini");
        assert_eq!(config.llm.temperature, Some(0.5));
        assert_eq!(config.stream.idle_timeout_secs, 90);
        assert_eq!(config.stream.channel_capacity, 64);
        assert_eq!(config.summary.max_transcript_chars, 60_000);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_default_file_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
        let config = Config::from_file(path).unwrap();

        assert_eq!(config.llm.base_url.as_deref(), Some("https://api.openai.com/v1"));
        assert_eq!(config.stream.channel_capacity, 64);
    }
}
