//! Embedding store contract.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChunkId, ChunkSnapshot, NewChunk};

/// Append-only collection of chunks and their embeddings.
///
/// Writes are serialized by the implementation; reads hand out immutable
/// snapshots so callers never need a lock of their own.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    fn name(&self) -> &str;

    /// Insert one chunk atomically. Fails with `DuplicateId` when the caller's
    /// id is taken (store unchanged), assigns a fresh id when none is given.
    async fn put(&self, chunk: NewChunk) -> Result<ChunkId>;

    /// Insert a batch. Either every chunk is stored or none is.
    async fn put_many(&self, chunks: Vec<NewChunk>) -> Result<Vec<ChunkId>>;

    /// Every stored chunk in insertion order, as of this call.
    async fn get_all(&self) -> Result<ChunkSnapshot>;

    async fn len(&self) -> Result<usize>;

    /// Dimensionality fixed by the first insert, `None` while empty.
    async fn dimension(&self) -> Result<Option<usize>>;
}
