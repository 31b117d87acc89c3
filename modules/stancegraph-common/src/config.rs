use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::StanceGraphError;

/// Secrets and connection settings loaded from environment variables.
/// Models, timeouts, and concurrency live in the TOML [`FileConfig`].
#[derive(Clone)]
pub struct AppConfig {
    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    // AI providers
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_base_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, StanceGraphError> {
        dotenvy::dotenv().ok();

        let config = Self {
            neo4j_uri: required_env("NEO4J_URI")?,
            neo4j_user: required_env("NEO4J_USER")?,
            neo4j_password: required_env("NEO4J_PASSWORD")?,
            openai_api_key: optional_env("OPENAI_API_KEY"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            openai_base_url: optional_env("OPENAI_BASE_URL"),
        };

        config.log_redacted();
        Ok(config)
    }

    /// API key for the configured provider, or a config error naming the missing variable.
    pub fn api_key_for(&self, provider: Provider) -> Result<&str, StanceGraphError> {
        let (key, var) = match provider {
            Provider::OpenAi => (&self.openai_api_key, "OPENAI_API_KEY"),
            Provider::Anthropic => (&self.anthropic_api_key, "ANTHROPIC_API_KEY"),
        };
        key.as_deref()
            .ok_or_else(|| StanceGraphError::Config(format!("{var} is required for {provider}")))
    }

    pub fn log_redacted(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  NEO4J_URI: {}", self.neo4j_uri);
        tracing::info!("  NEO4J_USER: {}", self.neo4j_user);
        tracing::info!("  OPENAI_API_KEY: {}", preview_secret(self.openai_api_key.as_deref()));
        tracing::info!(
            "  ANTHROPIC_API_KEY: {}",
            preview_secret(self.anthropic_api_key.as_deref())
        );
    }
}

/// First five characters and the length, for logging secrets.
fn preview_secret(val: Option<&str>) -> String {
    match val {
        Some(v) if !v.is_empty() => {
            let head: String = v.chars().take(5).collect();
            format!("{head}...({} chars)", v.chars().count())
        }
        _ => "<not set>".to_string(),
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("neo4j_uri", &self.neo4j_uri)
            .field("neo4j_user", &self.neo4j_user)
            .finish_non_exhaustive()
    }
}

fn required_env(key: &str) -> Result<String, StanceGraphError> {
    std::env::var(key)
        .map_err(|_| StanceGraphError::Config(format!("{key} environment variable is required")))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// --- TOML file config ---

/// TOML-backed tunables. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    pub models: ModelsConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Anthropic => write!(f, "anthropic"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ModelsConfig {
    pub provider: Provider,
    pub topic: String,
    pub classification: String,
    pub extraction: String,
    pub grouping: String,
    pub summary: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            topic: "gpt-4o-mini".to_string(),
            classification: "gpt-4o".to_string(),
            extraction: "gpt-4o-mini".to_string(),
            grouping: "gpt-4o-mini".to_string(),
            summary: "gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineConfig {
    /// Upper bound on a single text-generation call.
    pub llm_timeout_secs: u64,
    /// Concurrent stance classification requests per thread.
    pub classify_concurrency: usize,
    /// Top-level comments taken from a thread, highest score first. 0 keeps all.
    pub max_comments: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            llm_timeout_secs: 60,
            classify_concurrency: 4,
            max_comments: 0,
        }
    }
}

impl PipelineConfig {
    pub fn llm_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.llm_timeout_secs.max(1))
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<FileConfig> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.models.provider, Provider::OpenAi);
        assert_eq!(config.models.classification, "gpt-4o");
        assert_eq!(config.models.summary, "gpt-4o-mini");
        assert_eq!(config.pipeline.llm_timeout_secs, 60);
        assert_eq!(config.pipeline.classify_concurrency, 4);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = parse_config(
            r#"
            [models]
            provider = "anthropic"
            grouping = "claude-sonnet-4-5-20250929"

            [pipeline]
            llm_timeout_secs = 15
            "#,
        )
        .unwrap();
        assert_eq!(config.models.provider, Provider::Anthropic);
        assert_eq!(config.models.grouping, "claude-sonnet-4-5-20250929");
        assert_eq!(config.models.extraction, "gpt-4o-mini");
        assert_eq!(config.pipeline.llm_timeout().as_secs(), 15);
        assert_eq!(config.pipeline.max_comments, 0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_config("[pipeline]\nretries = 3\n").is_err());
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let config = parse_config("[pipeline]\nllm_timeout_secs = 0\n").unwrap();
        assert_eq!(config.pipeline.llm_timeout().as_secs(), 1);
    }

    #[test]
    fn secret_preview_respects_char_boundaries() {
        assert_eq!(preview_secret(Some("ключ-секрет")), "ключ-...(11 chars)");
        assert_eq!(preview_secret(Some("sk-abcdef")), "sk-ab...(9 chars)");
        assert_eq!(preview_secret(Some("")), "<not set>");
        assert_eq!(preview_secret(None), "<not set>");
    }

    #[test]
    fn missing_provider_key_is_a_config_error() {
        let config = AppConfig {
            neo4j_uri: "bolt://localhost:7687".into(),
            neo4j_user: "neo4j".into(),
            neo4j_password: "pw".into(),
            openai_api_key: Some("sk-test".into()),
            anthropic_api_key: None,
            openai_base_url: None,
        };
        assert_eq!(config.api_key_for(Provider::OpenAi).unwrap(), "sk-test");
        let err = config.api_key_for(Provider::Anthropic).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }
}
