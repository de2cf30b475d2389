//! # Embedding capability
//!
//! The diagnostic core never computes embeddings itself. It consumes an
//! opaque [`Embedder`] capability that turns one observation into a
//! fixed-dimension vector. Production deployments use [`RemoteEmbedder`],
//! which calls an OpenAI-compatible `/embeddings` endpoint; tests substitute
//! a deterministic double.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::HarvestMindConfig;

/// Failure of the external embedding model. The orchestrator maps any of
/// these to its degraded path; bulk indexing propagates them to the caller.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("embedding response malformed: {0}")]
    MalformedResponse(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Encodes observations into vectors of a fixed dimensionality.
pub trait Embedder: Send + Sync {
    /// Encode one observation.
    fn embed(
        &self,
        observation: &str,
    ) -> impl Future<Output = Result<Vec<f32>, EmbeddingError>> + Send;

    /// Dimensionality every returned vector has.
    fn dimension(&self) -> usize;
}

/// [`Embedder`] backed by an OpenAI-compatible embeddings endpoint.
pub struct RemoteEmbedder {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl RemoteEmbedder {
    /// # Errors
    /// [`EmbeddingError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &HarvestMindConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.embedding_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/embeddings", config.api_base.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.embedding_model.clone(),
            dimension: config.embedding_dimension,
        })
    }
}

impl Embedder for RemoteEmbedder {
    async fn embed(&self, observation: &str) -> Result<Vec<f32>, EmbeddingError> {
        debug!(model = %self.model, "requesting embedding");
        let body = serde_json::json!({
            "model": self.model,
            "input": [observation],
            "dimensions": self.dimension,
        });

        let mut request = self.client.post(&self.url).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let json: Value = request.send().await?.error_for_status()?.json().await?;
        let vector = parse_embedding_response(&json)?;
        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Pull the first embedding out of an OpenAI-style response body.
fn parse_embedding_response(json: &Value) -> Result<Vec<f32>, EmbeddingError> {
    let data = json
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            EmbeddingError::MalformedResponse("response is missing the data array".to_string())
        })?;
    let item = data.first().ok_or_else(|| {
        EmbeddingError::MalformedResponse("response data array is empty".to_string())
    })?;
    let embedding = item
        .get("embedding")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            EmbeddingError::MalformedResponse("item is missing the embedding array".to_string())
        })?;

    let mut vector = Vec::with_capacity(embedding.len());
    for value in embedding {
        let number = value.as_f64().ok_or_else(|| {
            EmbeddingError::MalformedResponse("embedding value must be numeric".to_string())
        })?;
        vector.push(number as f32);
    }
    Ok(vector)
}
