//! In-memory vector index with brute-force cosine similarity search.
//!
//! Search is O(n) over stored vectors, which is fine for catalogues in the
//! low tens of thousands.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use hearth_core::error::HearthError;

/// A listing id with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub similarity: f64,
}

/// Nearest-neighbour lookup over listing vectors.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Ids whose similarity to `vector` is at least `threshold`, best first,
    /// at most `limit` of them.
    async fn search(
        &self,
        vector: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<VectorMatch>, HearthError>;
}

/// Thread-safe in-memory index keyed by listing id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVectorIndex {
    entries: Arc<RwLock<HashMap<String, Vec<f32>>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the vector for `id`.
    pub fn upsert(&self, id: impl Into<String>, embedding: Vec<f32>) -> Result<(), HearthError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| HearthError::Storage(format!("Lock poisoned: {}", e)))?;
        entries.insert(id.into(), embedding);
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<(), HearthError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| HearthError::Storage(format!("Lock poisoned: {}", e)))?;
        entries.remove(id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn search_sync(
        &self,
        query: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<VectorMatch>, HearthError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| HearthError::Search(format!("Lock poisoned: {}", e)))?;

        let mut scored: Vec<VectorMatch> = entries
            .iter()
            .filter_map(|(id, embedding)| {
                let similarity = cosine_similarity(query, embedding);
                (similarity >= threshold).then(|| VectorMatch {
                    id: id.clone(),
                    similarity,
                })
            })
            .collect();

        // Descending similarity; id breaks ties so results are stable across calls.
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

#[async_trait]
impl VectorSearch for InMemoryVectorIndex {
    async fn search(
        &self,
        vector: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<VectorMatch>, HearthError> {
        self.search_sync(vector, threshold, limit)
    }
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero-magnitude input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}
