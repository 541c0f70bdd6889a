//! Service configuration
//!
//! Configuration is loaded from a TOML file. Secrets are never stored in the
//! file itself: sections reference environment variable *names* (`*_env`
//! fields) that are resolved at runtime, after `.env` loading.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerSection,
    pub auth: AuthSection,
    pub llm: LlmSection,
    #[serde(default)]
    pub search: SearchSection,
    /// Trace exporter configuration (optional; tracing disabled when absent)
    pub trace: Option<TraceSection>,
    #[serde(default)]
    pub guardrails: GuardrailsSection,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Login credentials, referenced by environment variable name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSection {
    /// Environment variable containing the accepted username
    pub username_env: String,
    /// Environment variable containing the accepted password
    pub password_env: String,
}

/// LLM provider settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name (currently only "openai")
    pub provider: String,
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable containing the API key
    pub api_key_env: String,
    /// System prompt for the chat agent
    pub system_prompt: String,
    /// Optional temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Optional max tokens
    pub max_tokens: Option<u32>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Web search tool settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchSection {
    /// Environment variable containing the Tavily API key
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
    /// Maximum results surfaced to the agent per query
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// API endpoint override, mainly for tests
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            max_results: default_max_results(),
            base_url: default_search_base_url(),
        }
    }
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_max_results() -> usize {
    3
}

fn default_search_base_url() -> String {
    "https://api.tavily.com".to_string()
}

/// Trace exporter settings (Langfuse-compatible ingestion API)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceSection {
    /// Environment variable containing the public key
    pub public_key_env: String,
    /// Environment variable containing the secret key
    pub secret_key_env: String,
    /// Trace backend base URL
    pub host: String,
    /// Environment tag attached to every trace
    #[serde(default = "default_trace_environment")]
    pub environment: String,
}

fn default_trace_environment() -> String {
    "development".to_string()
}

/// Content-policy settings for both guardrails
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuardrailsSection {
    /// Topics the service is willing to discuss
    #[serde(default = "default_valid_topics")]
    pub valid_topics: Vec<String>,
    /// Topics that are explicitly refused
    #[serde(default = "default_invalid_topics")]
    pub invalid_topics: Vec<String>,
    /// Maximum reading time of a reply, in seconds
    #[serde(default = "default_max_reading_secs")]
    pub max_reading_secs: u64,
    /// Reading speed used for the estimate
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: u64,
}

impl Default for GuardrailsSection {
    fn default() -> Self {
        Self {
            valid_topics: default_valid_topics(),
            invalid_topics: default_invalid_topics(),
            max_reading_secs: default_max_reading_secs(),
            words_per_minute: default_words_per_minute(),
        }
    }
}

fn default_valid_topics() -> Vec<String> {
    vec![
        "web frameworks".to_string(),
        "deployment".to_string(),
        "programming".to_string(),
    ]
}

fn default_invalid_topics() -> Vec<String> {
    vec![
        "politics".to_string(),
        "music".to_string(),
        "sports".to_string(),
    ]
}

fn default_max_reading_secs() -> u64 {
    15
}

fn default_words_per_minute() -> u64 {
    200
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ServiceConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ServiceConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values that TOML parsing cannot check
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.provider != "openai" {
            return Err(ConfigError::InvalidConfig(format!(
                "Unsupported LLM provider: {}",
                self.llm.provider
            )));
        }

        if let Some(temperature) = self.llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidConfig(format!(
                    "Temperature {temperature} outside valid range 0.0..=2.0"
                )));
            }
        }

        Url::parse(&self.search.base_url).map_err(|e| {
            ConfigError::InvalidConfig(format!(
                "Invalid search base URL '{}': {e}",
                self.search.base_url
            ))
        })?;

        if let Some(trace) = &self.trace {
            Url::parse(&trace.host).map_err(|e| {
                ConfigError::InvalidConfig(format!("Invalid trace host '{}': {e}", trace.host))
            })?;
        }

        if self.guardrails.words_per_minute == 0 {
            return Err(ConfigError::InvalidConfig(
                "words_per_minute must be greater than zero".to_string(),
            ));
        }

        if self.guardrails.valid_topics.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "At least one valid topic is required".to_string(),
            ));
        }

        Ok(())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Get login credentials from environment variables
    pub fn get_credentials(&self) -> Result<(String, String), ConfigError> {
        let username = Self::get_env_var_required(&self.auth.username_env)?;
        let password = Self::get_env_var_required(&self.auth.password_env)?;
        Ok((username, password))
    }

    /// Get LLM API key from environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.llm.api_key_env)
    }

    /// Get search API key from environment variable
    pub fn get_search_api_key(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.search.api_key_env)
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[auth]
username_env = "CHAT_API_USERNAME"
password_env = "CHAT_API_PASSWORD"

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
system_prompt = "You are a deployment assistant."
temperature = 0.0
max_tokens = 1000
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let toml_content = r#"
[auth]
username_env = "CHAT_API_USERNAME"
password_env = "CHAT_API_PASSWORD"

[llm]
provider = "openai"
api_key_env = "OPENAI_API_KEY"
system_prompt = "You are helpful."
"#;

        let config: ServiceConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.temperature, None);
        assert_eq!(config.search.max_results, 3);
        assert!(config.trace.is_none());
        assert_eq!(config.guardrails.max_reading_secs, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[server]
host = "127.0.0.1"
port = 9000

[auth]
username_env = "CHAT_API_USERNAME"
password_env = "CHAT_API_PASSWORD"

[llm]
provider = "openai"
model = "gpt-4o"
api_key_env = "OPENAI_API_KEY"
system_prompt = "You are a deployment assistant."
temperature = 0.2
max_tokens = 800

[search]
api_key_env = "TAVILY_API_KEY"
max_results = 5
base_url = "https://api.tavily.com"

[trace]
public_key_env = "LANGFUSE_PUBLIC_KEY"
secret_key_env = "LANGFUSE_SECRET_KEY"
host = "https://cloud.langfuse.com"
environment = "staging"

[guardrails]
valid_topics = ["programming"]
invalid_topics = ["politics"]
max_reading_secs = 20
words_per_minute = 180
"#;

        let config: ServiceConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.search.max_results, 5);
        let trace = config.trace.as_ref().unwrap();
        assert_eq!(trace.environment, "staging");
        assert_eq!(config.guardrails.words_per_minute, 180);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unsupported_provider_rejected() {
        let mut config = ServiceConfig::test_config();
        config.llm.provider = "cohere".to_string();

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_temperature_out_of_range_rejected() {
        let mut config = ServiceConfig::test_config();
        config.llm.temperature = Some(3.5);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_trace_host_rejected() {
        let mut config = ServiceConfig::test_config();
        config.trace = Some(TraceSection {
            public_key_env: "LANGFUSE_PUBLIC_KEY".to_string(),
            secret_key_env: "LANGFUSE_SECRET_KEY".to_string(),
            host: "not a url".to_string(),
            environment: "development".to_string(),
        });

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_words_per_minute_rejected() {
        let mut config = ServiceConfig::test_config();
        config.guardrails.words_per_minute = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_valid_topics_rejected() {
        let mut config = ServiceConfig::test_config();
        config.guardrails.valid_topics.clear();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_env_var_reported_by_name() {
        let config = ServiceConfig::test_config();
        std::env::remove_var("CHAT_API_USERNAME");
        std::env::remove_var("CHAT_API_PASSWORD");

        let result = config.get_credentials();
        match result {
            Err(ConfigError::EnvVarNotFound(name)) => assert_eq!(name, "CHAT_API_USERNAME"),
            other => panic!("Expected EnvVarNotFound, got {other:?}"),
        }
    }
}
