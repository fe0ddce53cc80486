//! Similarity retriever: embed the query, score every chunk, keep the top K.
//!
//! Scoring defaults to the raw dot product, so chunks with larger-magnitude
//! embeddings are favoured. `Similarity::Cosine` normalizes both sides.

use debtwise_core::error::{DebtWiseError, Result};
use debtwise_core::traits::{ChunkStore, Embedder};
use debtwise_core::types::{ChunkSnapshot, ScoredResult, Similarity, check_embedding};
use std::sync::Arc;

pub struct SimilarityRetriever {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    similarity: Similarity,
}

impl SimilarityRetriever {
    pub fn new(store: Arc<dyn ChunkStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            similarity: Similarity::Dot,
        }
    }

    pub fn with_similarity(mut self, similarity: Similarity) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn similarity(&self) -> Similarity {
        self.similarity
    }

    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// Embed `text`, rejecting empty, non-finite or wrongly sized vectors.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.embedder.embed(text).await?;
        check_embedding(&vector)?;
        if let Some(expected) = self.embedder.dimensions() {
            if vector.len() != expected {
                return Err(DebtWiseError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        Ok(vector)
    }

    /// Top `top_k` chunks with their scores, best first.
    ///
    /// An empty store yields `Ok(vec![])`; store or embedding failures are
    /// returned as errors, never as an empty list.
    pub async fn retrieve_scored(&self, query: &str, top_k: usize) -> Result<Vec<ScoredResult>> {
        if top_k == 0 {
            return Err(DebtWiseError::InvalidInput("top_k must be at least 1".into()));
        }

        let qvec = self.embed(query).await?;
        let snapshot = self.store.get_all().await?;
        if snapshot.is_empty() {
            tracing::warn!("No relevant documents found: chunk store is empty");
            return Ok(Vec::new());
        }

        let mut scored = score_all(&qvec, &snapshot, self.similarity)?;
        // `sort_by` is stable: equal scores keep store order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);

        tracing::debug!(
            "retrieved {} of {} chunks (best score {:.4})",
            scored.len(),
            snapshot.len(),
            scored.first().map(|r| r.score).unwrap_or_default()
        );
        Ok(scored)
    }

    /// Texts of the top `top_k` chunks, best first.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        Ok(self
            .retrieve_scored(query, top_k)
            .await?
            .into_iter()
            .map(|r| r.text)
            .collect())
    }
}

/// Full linear scan: one score per chunk, in snapshot order.
///
/// A score that overflows to infinity or NaN is an embedding error; such a
/// score has no meaningful rank.
pub fn score_all(
    query: &[f32],
    snapshot: &ChunkSnapshot,
    similarity: Similarity,
) -> Result<Vec<ScoredResult>> {
    snapshot
        .iter()
        .map(|chunk| {
            if chunk.embedding.len() != query.len() {
                return Err(DebtWiseError::DimensionMismatch {
                    expected: chunk.embedding.len(),
                    actual: query.len(),
                });
            }
            let score = match similarity {
                Similarity::Dot => dot(query, &chunk.embedding),
                Similarity::Cosine => cosine(query, &chunk.embedding),
            };
            if !score.is_finite() {
                return Err(DebtWiseError::embedding(format!(
                    "non-finite similarity score for chunk {}",
                    chunk.id
                )));
            }
            Ok(ScoredResult {
                chunk_id: chunk.id.clone(),
                text: chunk.text.clone(),
                score,
            })
        })
        .collect()
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity; 0.0 when either vector has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}
