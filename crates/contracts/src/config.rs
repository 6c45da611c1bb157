//! Process configuration. Loaded once at startup from a TOML document
//! and layered with environment variable overrides, document fields
//! filling in defaults and environment variables winning for secrets.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub models: Vec<String>,
    pub judge_model: String,
    pub per_model_timeout_ms: u64,
    pub judge_timeout_ms: u64,
    pub debate_timeout_ms: u64,
    pub judge_feedback_timeout_ms: u64,
    pub max_prompt_length: usize,
    pub min_models_for_judge: usize,
    pub max_answer_length_for_judge: usize,
    pub enable_early_judge: bool,
    pub enable_debate: bool,
    pub max_debate_rounds: u32,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models: vec![
                "openai/gpt-4o".to_string(),
                "anthropic/claude-3.5-sonnet".to_string(),
                "google/gemini-1.5-pro".to_string(),
            ],
            judge_model: "openai/gpt-4o".to_string(),
            per_model_timeout_ms: 30_000,
            judge_timeout_ms: 45_000,
            debate_timeout_ms: 30_000,
            judge_feedback_timeout_ms: 15_000,
            max_prompt_length: 8_000,
            min_models_for_judge: 2,
            max_answer_length_for_judge: 4_000,
            enable_early_judge: true,
            enable_debate: false,
            max_debate_rounds: 2,
            max_retries: 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
}

impl Config {
    /// Loads the configuration document at `path`, falling back to
    /// `Config::default()` field-by-field for anything the document
    /// omits (via `#[serde(default)]`).
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let text = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_ref.display().to_string(),
            source,
        })
    }

    /// Applies environment-variable overrides for the handful of
    /// fields that are environment-sourced. Everything else stays
    /// document-controlled.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(judge) = std::env::var("AGGREGATOR_JUDGE_MODEL") {
            if !judge.is_empty() {
                self.judge_model = judge;
            }
        }
        self
    }

    pub fn has_search_credentials() -> bool {
        std::env::var("TAVILY_API_KEY").map(|v| !v.is_empty()).unwrap_or(false)
    }

    pub fn gateway_api_key() -> Option<String> {
        std::env::var("OPENROUTER_API_KEY").ok().filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let cfg = Config::default();
        assert_eq!(cfg.min_models_for_judge, 2);
        assert!(cfg.enable_early_judge);
        assert!(!cfg.enable_debate);
    }

    #[test]
    fn partial_document_fills_remaining_defaults() {
        let doc = r#"
            judge_model = "custom/model"
            max_debate_rounds = 3
        "#;
        let cfg: Config = toml::from_str(doc).unwrap();
        assert_eq!(cfg.judge_model, "custom/model");
        assert_eq!(cfg.max_debate_rounds, 3);
        assert_eq!(cfg.min_models_for_judge, 2);
    }
}
