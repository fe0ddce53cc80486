//! Core data model: chunks, snapshots, scored results, chat messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{DebtWiseError, Result};

/// Opaque, store-unique chunk identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChunkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChunkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A stored span of text with its embedding. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Insert payload. With `id: None` the store assigns a fresh id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub id: Option<ChunkId>,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl NewChunk {
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: None,
            text: text.into(),
            embedding,
        }
    }

    pub fn with_id(id: impl Into<ChunkId>, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: Some(id.into()),
            text: text.into(),
            embedding,
        }
    }
}

/// Immutable point-in-time view of a store, in insertion order.
///
/// Cloning is an `Arc` bump; iterating never observes later writes.
#[derive(Debug, Clone, Default)]
pub struct ChunkSnapshot {
    chunks: Arc<Vec<Chunk>>,
}

impl ChunkSnapshot {
    pub fn new(chunks: Arc<Vec<Chunk>>) -> Self {
        Self { chunks }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Chunk> {
        self.chunks.iter()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl From<Vec<Chunk>> for ChunkSnapshot {
    fn from(chunks: Vec<Chunk>) -> Self {
        Self::new(Arc::new(chunks))
    }
}

impl<'a> IntoIterator for &'a ChunkSnapshot {
    type Item = &'a Chunk;
    type IntoIter = std::slice::Iter<'a, Chunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A chunk's text with its similarity to a query. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub chunk_id: ChunkId,
    pub text: String,
    pub score: f32,
}

/// How query and chunk embeddings are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Similarity {
    /// Raw dot product. Larger-magnitude embeddings score higher.
    #[default]
    Dot,
    /// Dot product divided by both norms.
    Cosine,
}

/// Reject empty vectors and non-finite components.
pub fn check_embedding(embedding: &[f32]) -> Result<()> {
    if embedding.is_empty() {
        return Err(DebtWiseError::embedding("empty embedding vector"));
    }
    if let Some(pos) = embedding.iter().position(|v| !v.is_finite()) {
        return Err(DebtWiseError::embedding(format!(
            "non-finite value at index {pos}"
        )));
    }
    Ok(())
}

/// Chat message role. Prompts are sent as a single user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Token usage reported by a generation provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response from a generation provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}
