//! Runtime configuration.
//!
//! The configuration is a small YAML document holding the OpenAI-compatible
//! endpoint settings plus the retrieval and generation knobs. Everything but
//! the endpoint block has a sensible default, so a minimal file is just:
//!
//! ```yaml
//! api_key: ""
//! api_base: "http://localhost:5001/v1"
//! model: "gemini-2.5-flash"
//! embedding_model: "text-embedding-3-small"
//! ```
//!
//! The API key should **not** live in the file: set the
//! [`API_KEY_ENV`] environment variable and it overrides whatever the file
//! says at load time. The file field exists so local, unsecured backends can
//! run without any environment setup.

use std::{env, fs};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::vector_store::MetricKind;

/// Environment variable that overrides `api_key` from the config file.
pub const API_KEY_ENV: &str = "HARVESTMIND_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Application configuration.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct HarvestMindConfig {
    /// Key for the OpenAI-compatible endpoint; prefer [`API_KEY_ENV`].
    pub api_key: String,

    /// Base URL of the endpoint, e.g. `http://localhost:5001/v1`.
    pub api_base: String,

    /// Generation model used for doctor reports.
    pub model: String,

    /// Embedding model used to encode observations.
    pub embedding_model: String,

    /// Dimensionality of every vector in the case bank.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Similarity metric the bank is built with.
    #[serde(default = "default_metric")]
    pub metric: MetricKind,

    /// How many historical cases ground each report.
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,

    /// Optional cap on bank growth; `None` grows without bound.
    #[serde(default)]
    pub max_cases: Option<usize>,

    /// Upper bound on one generation attempt.
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    /// Generation attempts per query. 1 means no retry.
    #[serde(default = "default_generation_attempts")]
    pub generation_attempts: u32,

    /// Token budget for the generated report.
    #[serde(default = "default_generation_max_tokens")]
    pub generation_max_tokens: u16,

    /// Upper bound on one embedding call.
    #[serde(default = "default_embedding_timeout_secs")]
    pub embedding_timeout_secs: u64,
}

fn default_embedding_dimension() -> usize {
    128
}

fn default_metric() -> MetricKind {
    MetricKind::Cosine
}

fn default_retrieval_top_k() -> usize {
    3
}

fn default_generation_timeout_secs() -> u64 {
    30
}

fn default_generation_attempts() -> u32 {
    1
}

fn default_generation_max_tokens() -> u16 {
    1024
}

fn default_embedding_timeout_secs() -> u64 {
    10
}

/// Load the configuration from a YAML file, then apply the environment
/// override for the API key.
///
/// # Errors
/// [`ConfigError`] if the file cannot be read or parsed.
pub fn load_config(file: &str) -> Result<HarvestMindConfig, ConfigError> {
    debug!("loading config from {file}");
    let content = fs::read_to_string(file)?;
    let mut config: HarvestMindConfig = serde_yaml::from_str(&content)?;
    if let Ok(key) = env::var(API_KEY_ENV) {
        if !key.is_empty() {
            config.api_key = key;
        }
    }
    Ok(config)
}

impl HarvestMindConfig {
    /// A config pointed at a local, unsecured backend; this is what
    /// `hm init` writes.
    pub fn local_default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "http://localhost:5001/v1".to_string(),
            model: "gemini-2.5-flash".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: default_embedding_dimension(),
            metric: default_metric(),
            retrieval_top_k: default_retrieval_top_k(),
            max_cases: None,
            generation_timeout_secs: default_generation_timeout_secs(),
            generation_attempts: default_generation_attempts(),
            generation_max_tokens: default_generation_max_tokens(),
            embedding_timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_valid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
api_key: "example_api_key"
api_base: "http://example.com/v1"
model: "example_model"
embedding_model: "example_embedder"
embedding_dimension: 64
metric: "euclidean"
retrieval_top_k: 5
max_cases: 1000
generation_timeout_secs: 5
"#
        )
        .unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.api_base, "http://example.com/v1");
        assert_eq!(config.embedding_dimension, 64);
        assert_eq!(config.metric, MetricKind::Euclidean);
        assert_eq!(config.retrieval_top_k, 5);
        assert_eq!(config.max_cases, Some(1000));
        assert_eq!(config.generation_timeout_secs, 5);
        // Defaulted knobs.
        assert_eq!(config.generation_attempts, 1);
        assert_eq!(config.generation_max_tokens, 1024);
    }

    #[test]
    fn test_load_config_applies_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
api_key: ""
api_base: "http://example.com/v1"
model: "example_model"
embedding_model: "example_embedder"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.embedding_dimension, 128);
        assert_eq!(config.metric, MetricKind::Cosine);
        assert_eq!(config.retrieval_top_k, 3);
        assert_eq!(config.max_cases, None);
    }

    #[test]
    fn test_env_var_overrides_file_api_key() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
api_key: "file_key"
api_base: "http://example.com/v1"
model: "m"
embedding_model: "e"
"#
        )
        .unwrap();

        unsafe { env::set_var(API_KEY_ENV, "env_key") };
        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        unsafe { env::remove_var(API_KEY_ENV) };
        assert_eq!(config.api_key, "env_key");
    }

    #[test]
    fn test_load_config_invalid_file() {
        let config = load_config("non/existent/path");
        assert!(config.is_err());
    }

    #[test]
    fn test_load_config_invalid_format() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, r#"invalid: config: format"#).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap());
        assert!(config.is_err());
    }
}
