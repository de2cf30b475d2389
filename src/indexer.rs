//! # Bulk indexing
//!
//! Replays a labeled dataset into the case bank at training/evaluation
//! time: every example is encoded through the embedding capability and
//! inserted with its label and a `"Training Set"` provenance tag. The bank
//! is ephemeral, so deployments run this once at startup to seed retrieval.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Map;
use tracing::{debug, info};

use crate::{
    embedding::{Embedder, EmbeddingError},
    models::{CaseRecord, PROVENANCE_TRAINING_SET},
    vector_store::{CaseBank, StoreError},
};

/// One labeled example of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledCase {
    pub id: String,
    pub label: String,
    /// Text the embedding capability encodes, e.g. an observation summary.
    pub observation: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IndexingError {
    #[error("failed to embed case {id}: {source}")]
    Embedding {
        id: String,
        source: EmbeddingError,
    },
    #[error("failed to index case {id}: {source}")]
    Store { id: String, source: StoreError },
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset line {line} is malformed: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}

/// Embed and insert every case of `dataset`, in order. Returns the number
/// of cases indexed.
///
/// Bulk indexing is a training-time operation, so failures propagate to the
/// caller instead of degrading; a half-indexed bank is visible in the
/// returned error and in `bank.len()`.
pub async fn index_dataset<E: Embedder>(
    embedder: &E,
    bank: &CaseBank,
    dataset: &[LabeledCase],
) -> Result<usize, IndexingError> {
    info!(cases = dataset.len(), "indexing dataset");
    for case in dataset {
        let vector = embedder
            .embed(&case.observation)
            .await
            .map_err(|source| IndexingError::Embedding {
                id: case.id.clone(),
                source,
            })?;

        let record = CaseRecord {
            id: case.id.clone(),
            label: Some(case.label.clone()),
            provenance: PROVENANCE_TRAINING_SET.to_string(),
            metadata: Map::new(),
        };

        let ordinal = bank
            .ingest(vector, record)
            .map_err(|source| IndexingError::Store {
                id: case.id.clone(),
                source,
            })?;
        debug!(id = %case.id, ordinal, "case indexed");
    }
    info!(indexed = dataset.len(), total = bank.len(), "dataset indexed");
    Ok(dataset.len())
}

/// Load a dataset from a JSONL file: one [`LabeledCase`] object per line,
/// blank lines skipped.
pub fn load_dataset(path: &Path) -> Result<Vec<LabeledCase>, IndexingError> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| IndexingError::Parse {
                line: i + 1,
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::Cosine;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Deterministic embedder: observation length spread over the vector.
    struct CountingEmbedder {
        dimension: usize,
    }

    impl Embedder for CountingEmbedder {
        async fn embed(&self, observation: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![observation.len() as f32; self.dimension])
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    fn dataset() -> Vec<LabeledCase> {
        vec![
            LabeledCase {
                id: "img-0".to_string(),
                label: "healthy".to_string(),
                observation: "uniform green canopy".to_string(),
            },
            LabeledCase {
                id: "img-1".to_string(),
                label: "early_blight".to_string(),
                observation: "concentric brown lesions on lower leaves".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn indexes_every_case_with_training_provenance() {
        let bank = CaseBank::new(3, Box::new(Cosine));
        let embedder = CountingEmbedder { dimension: 3 };

        let indexed = index_dataset(&embedder, &bank, &dataset()).await.unwrap();
        assert_eq!(indexed, 2);
        assert_eq!(bank.len(), 2);

        let hits = bank.retrieve(&[1.0, 1.0, 1.0], 2).unwrap();
        for hit in &hits {
            assert_eq!(hit.record.provenance, PROVENANCE_TRAINING_SET);
            assert!(hit.record.label.is_some());
        }
    }

    #[tokio::test]
    async fn dimension_mismatch_reports_the_offending_case() {
        let bank = CaseBank::new(4, Box::new(Cosine));
        let embedder = CountingEmbedder { dimension: 3 };

        let err = index_dataset(&embedder, &bank, &dataset()).await.unwrap_err();
        assert!(matches!(err, IndexingError::Store { ref id, .. } if id == "img-0"));
        assert!(bank.is_empty());
    }

    #[test]
    fn loads_jsonl_datasets() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"id": "a", "label": "healthy", "observation": "green"}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"id": "b", "label": "rust", "observation": "orange pustules"}}"#
        )
        .unwrap();

        let cases = load_dataset(file.path()).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].label, "rust");
    }

    #[test]
    fn malformed_jsonl_line_is_reported_with_its_number() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"id": "a", "label": "healthy", "observation": "green"}}"#
        )
        .unwrap();
        writeln!(file, "not json").unwrap();

        let err = load_dataset(file.path()).unwrap_err();
        assert!(matches!(err, IndexingError::Parse { line: 2, .. }));
    }
}
