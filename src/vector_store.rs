//! # Vector store
//!
//! In-memory similarity retrieval over case embeddings.
//!
//! Three layers live here:
//!
//! - [`SimilarityMetric`]: the scoring capability, with two interchangeable
//!   implementations ([`Cosine`] and [`SquaredEuclidean`]) chosen once at
//!   construction time.
//! - [`SimilarityIndex`] + [`CaseStore`]: the paired collections, vectors on
//!   one side, [`CaseRecord`] metadata on the other, correlated by ordinal
//!   position.
//! - [`CaseBank`]: the only type the rest of the crate touches. It owns both
//!   collections behind a single lock and exposes exactly two operations:
//!   an atomic dual-insert ([`CaseBank::ingest`]) and a snapshot-consistent
//!   ranked lookup ([`CaseBank::retrieve`]). No caller can ever observe the
//!   vector count and the record count out of sync.
//!
//! The store is append-only and deliberately ephemeral: entries live for the
//! process lifetime and nothing is persisted across restarts. Callers that
//! need durable cases must replay them through ingestion at startup.
//!
//! Queries are an exact linear scan. At the observed scale (thousands of
//! 128-d vectors) this is well inside budget, and it keeps ranking and
//! tie-break semantics exact: equal scores always resolve by ascending
//! insertion order.
//!
//! ## Quick Example
//! ```
//! use harvest_mind::vector_store::{CaseBank, Cosine};
//! use harvest_mind::models::CaseRecord;
//! use serde_json::Map;
//!
//! let bank = CaseBank::new(2, Box::new(Cosine));
//! let record = CaseRecord::from_metadata(Map::new());
//! bank.ingest(vec![1.0, 0.0], record).unwrap();
//! let hits = bank.retrieve(&[1.0, 0.0], 3).unwrap();
//! assert_eq!(hits.len(), 1);
//! assert!((hits[0].score - 1.0).abs() < 1e-6);
//! ```

use std::cmp::Ordering;

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{CaseRecord, IngestAck, IngestRequest};

/// Errors raised at the store boundary. Each is fatal to the single call
/// only; the store itself is never left in an inconsistent state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("dimension mismatch: index holds {expected}-d vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("no case at ordinal {ordinal}")]
    NotFound { ordinal: usize },
    #[error("case bank is full ({limit} entries)")]
    CapacityExceeded { limit: usize },
}

/// Scoring capability of an index.
///
/// Implementations define how vectors are transformed on the way in
/// ([`prepare`](Self::prepare)), how a stored/query pair is scored, and
/// which direction of score is better. The index calls only this trait, so
/// adding a metric never touches the scan or ranking code.
pub trait SimilarityMetric: Send + Sync {
    fn name(&self) -> &'static str;

    /// Transform a vector before it is stored or used as a query.
    fn prepare(&self, vector: Vec<f32>) -> Vec<f32> {
        vector
    }

    /// Score one stored vector against the (already prepared) query.
    fn score(&self, stored: &[f32], query: &[f32]) -> f32;

    /// Ordering of two scores with the better score first.
    fn rank(&self, a: f32, b: f32) -> Ordering;
}

/// Cosine similarity: dot product of unit-normalized vectors, higher is
/// better. Vectors are normalized once at insert time; zero-norm vectors are
/// stored unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cosine;

impl SimilarityMetric for Cosine {
    fn name(&self) -> &'static str {
        "cosine"
    }

    fn prepare(&self, mut vector: Vec<f32>) -> Vec<f32> {
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn score(&self, stored: &[f32], query: &[f32]) -> f32 {
        stored.iter().zip(query).map(|(a, b)| a * b).sum()
    }

    fn rank(&self, a: f32, b: f32) -> Ordering {
        b.total_cmp(&a)
    }
}

/// Squared Euclidean distance, lower is better. Vectors are stored raw.
///
/// The square root is never taken; it does not change the ranking.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredEuclidean;

impl SimilarityMetric for SquaredEuclidean {
    fn name(&self) -> &'static str {
        "euclidean"
    }

    fn score(&self, stored: &[f32], query: &[f32]) -> f32 {
        stored
            .iter()
            .zip(query)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    fn rank(&self, a: f32, b: f32) -> Ordering {
        a.total_cmp(&b)
    }
}

/// Config-facing metric selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cosine,
    Euclidean,
}

impl MetricKind {
    pub fn instantiate(&self) -> Box<dyn SimilarityMetric> {
        match self {
            MetricKind::Cosine => Box::new(Cosine),
            MetricKind::Euclidean => Box::new(SquaredEuclidean),
        }
    }
}

/// Fixed-dimension vector index with exact, deterministic ranking.
pub struct SimilarityIndex {
    dimension: usize,
    metric: Box<dyn SimilarityMetric>,
    vectors: Vec<Vec<f32>>,
}

impl SimilarityIndex {
    pub fn new(dimension: usize, metric: Box<dyn SimilarityMetric>) -> Self {
        Self {
            dimension,
            metric,
            vectors: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Append a vector and return its ordinal.
    ///
    /// The vector passes through the metric's `prepare` step (unit
    /// normalization for cosine, identity for Euclidean) before storage.
    ///
    /// # Errors
    /// [`StoreError::DimensionMismatch`] if the vector length differs from
    /// the index dimensionality. Well-formed input never fails.
    pub fn insert(&mut self, vector: Vec<f32>) -> Result<usize, StoreError> {
        self.check_dimension(&vector)?;
        let ordinal = self.vectors.len();
        self.vectors.push(self.metric.prepare(vector));
        Ok(ordinal)
    }

    /// Rank every stored vector against `vector` and return the best
    /// `min(k, len)` as `(ordinal, score)` pairs.
    ///
    /// Cosine indexes rank by descending similarity, Euclidean indexes by
    /// ascending squared distance. Equal scores resolve by ascending
    /// insertion order, so results are fully deterministic for fixed state.
    /// An empty index yields an empty list.
    ///
    /// # Errors
    /// [`StoreError::DimensionMismatch`] if the query length differs from
    /// the index dimensionality.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(usize, f32)>, StoreError> {
        self.check_dimension(vector)?;
        if self.vectors.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query = self.metric.prepare(vector.to_vec());
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .par_iter()
            .enumerate()
            .map(|(ordinal, stored)| (ordinal, self.metric.score(stored, &query)))
            .collect();

        scored.sort_unstable_by(|a, b| self.metric.rank(a.1, b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Case metadata records, positionally correlated with index ordinals.
#[derive(Default)]
pub struct CaseStore {
    records: Vec<CaseRecord>,
}

impl CaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn insert(&mut self, record: CaseRecord) -> usize {
        let ordinal = self.records.len();
        self.records.push(record);
        ordinal
    }

    /// # Errors
    /// [`StoreError::NotFound`] for an out-of-range ordinal. With inserts
    /// going through [`CaseBank::ingest`] this cannot happen for ordinals
    /// returned by a query.
    pub fn get(&self, ordinal: usize) -> Result<&CaseRecord, StoreError> {
        self.records
            .get(ordinal)
            .ok_or(StoreError::NotFound { ordinal })
    }
}

/// One retrieval hit: the case record plus its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredCase {
    pub record: CaseRecord,
    pub score: f32,
}

struct BankInner {
    index: SimilarityIndex,
    cases: CaseStore,
}

/// The process-wide case bank: paired vector + record collections behind one
/// lock.
///
/// Construct one per process (typically wrapped in an `Arc`) and hand it to
/// whatever needs ingestion or retrieval; there is no implicit global
/// instance. Ingestion takes the write lock for exactly the two appends;
/// retrieval takes the read lock, so any number of queries run concurrently
/// and none can observe a half-applied insert. Nothing here is held across a
/// network call.
pub struct CaseBank {
    dimension: usize,
    capacity: Option<usize>,
    inner: RwLock<BankInner>,
}

impl CaseBank {
    /// An unbounded bank. See [`CaseBank::with_capacity`] for the bounded
    /// variant.
    pub fn new(dimension: usize, metric: Box<dyn SimilarityMetric>) -> Self {
        Self::with_capacity(dimension, metric, None)
    }

    /// A bank that rejects inserts past `capacity` entries with
    /// [`StoreError::CapacityExceeded`]. `None` means unbounded growth.
    pub fn with_capacity(
        dimension: usize,
        metric: Box<dyn SimilarityMetric>,
        capacity: Option<usize>,
    ) -> Self {
        debug!(dimension, metric = metric.name(), ?capacity, "case bank created");
        Self {
            dimension,
            capacity,
            inner: RwLock::new(BankInner {
                index: SimilarityIndex::new(dimension, metric),
                cases: CaseStore::new(),
            }),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed cases.
    pub fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically append one `(vector, record)` pair and return the shared
    /// ordinal.
    ///
    /// Re-ingesting an external id that already exists appends a second
    /// entry; the bank is an append-only log and never deduplicates.
    ///
    /// # Errors
    /// - [`StoreError::DimensionMismatch`] for a malformed vector.
    /// - [`StoreError::CapacityExceeded`] when a configured capacity is
    ///   reached.
    pub fn ingest(&self, embedding: Vec<f32>, record: CaseRecord) -> Result<usize, StoreError> {
        if embedding.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let mut inner = self.inner.write();
        if let Some(limit) = self.capacity {
            if inner.index.len() >= limit {
                return Err(StoreError::CapacityExceeded { limit });
            }
        }

        let ordinal = inner.index.insert(embedding)?;
        let case_ordinal = inner.cases.insert(record);
        debug_assert_eq!(ordinal, case_ordinal);
        debug!(ordinal, "case ingested");
        Ok(ordinal)
    }

    /// Ingestion entry point for edge devices: unpack the request metadata
    /// into a [`CaseRecord`], run the atomic dual-insert, and acknowledge
    /// with the external id and assigned ordinal.
    ///
    /// # Errors
    /// Same as [`CaseBank::ingest`].
    pub fn ingest_embedding(&self, request: IngestRequest) -> Result<IngestAck, StoreError> {
        let record = CaseRecord::from_metadata(request.metadata);
        let id = record.id.clone();
        let ordinal = self.ingest(request.embedding, record)?;
        Ok(IngestAck {
            status: "ingested".to_string(),
            id,
            ordinal,
        })
    }

    /// Rank the bank against `query` and resolve the best `min(k, len)`
    /// ordinals to their records.
    ///
    /// Runs entirely under the read lock, so the result reflects one
    /// consistent snapshot of both collections.
    pub fn retrieve(&self, query: &[f32], k: usize) -> Result<Vec<ScoredCase>, StoreError> {
        let inner = self.inner.read();
        let hits = inner.index.query(query, k)?;
        hits.into_iter()
            .map(|(ordinal, score)| {
                inner.cases.get(ordinal).map(|record| ScoredCase {
                    record: record.clone(),
                    score,
                })
            })
            .collect()
    }
}
