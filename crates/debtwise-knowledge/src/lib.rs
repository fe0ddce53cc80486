//! # DebtWise Knowledge
//!
//! Embedding-based retrieval for grounding generated answers.
//!
//! ## Design
//! - **Chunk stores**: in-memory (copy-on-write snapshots) or SQLite
//!   (embeddings as little-endian `f32` BLOBs, `UNIQUE` ids)
//! - **Similarity retriever**: embeds the query, scans every stored chunk,
//!   ranks by raw dot product (cosine opt-in), returns the top K
//! - **Chunker + indexer**: recursive character splitting, embed, insert
//! - **RAG pipeline**: joins retrieved texts into context for generation
//!
//! ## How it works
//! ```text
//! "Which debt should I pay off first?"
//!   ↓ Embedder.embed
//! query vector
//!   ↓ ChunkStore.get_all → dot(query, chunk) for every chunk
//! stable sort by score desc, take top K
//!   ↓
//! "\n\n"-joined context → prompt template → Provider.chat
//! ```
//!
//! The scan is O(N·D) per query. It is meant for collections of a few
//! thousand chunks; an ANN index would replace `retriever::score_all`.

pub mod chunker;
pub mod indexer;
pub mod memory;
pub mod rag;
pub mod retriever;
pub mod sqlite;

pub use chunker::{RecursiveSplitter, TextChunk};
pub use indexer::{Document, IndexReport, Indexer};
pub use memory::MemoryChunkStore;
pub use rag::{Answer, RagPipeline, get_context};
pub use retriever::SimilarityRetriever;
pub use sqlite::SqliteChunkStore;

use debtwise_core::config::{StoreConfig, expand_path};
use debtwise_core::error::{DebtWiseError, Result};
use debtwise_core::traits::ChunkStore;
use debtwise_core::types::{ChunkId, NewChunk, check_embedding};
use std::collections::HashSet;
use std::sync::Arc;

/// Open the chunk store selected by configuration.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn ChunkStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryChunkStore::new())),
        "sqlite" => Ok(Arc::new(SqliteChunkStore::open(
            &expand_path(&config.path),
            config.timeout_secs,
        )?)),
        other => Err(DebtWiseError::Config(format!("unknown store backend: {other}"))),
    }
}

/// Check a batch against the store's dimensionality and id set.
///
/// Returns the dimensionality the store has after the batch. `taken` tells
/// whether an id is already stored.
pub(crate) fn validate_batch(
    chunks: &[NewChunk],
    dimension: Option<usize>,
    taken: impl Fn(&ChunkId) -> bool,
) -> Result<Option<usize>> {
    let mut dimension = dimension;
    let mut seen: HashSet<&ChunkId> = HashSet::new();
    for chunk in chunks {
        check_embedding(&chunk.embedding)?;
        match dimension {
            Some(expected) if expected != chunk.embedding.len() => {
                return Err(DebtWiseError::DimensionMismatch {
                    expected,
                    actual: chunk.embedding.len(),
                });
            }
            Some(_) => {}
            None => dimension = Some(chunk.embedding.len()),
        }
        if let Some(id) = &chunk.id {
            if taken(id) || !seen.insert(id) {
                return Err(DebtWiseError::DuplicateId(id.to_string()));
            }
        }
    }
    Ok(dimension)
}
