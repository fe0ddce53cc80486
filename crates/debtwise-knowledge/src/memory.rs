//! In-memory chunk store with copy-on-write snapshots.
//!
//! Writers take the lock, append to a private copy when a reader still
//! holds the previous `Arc`, and swap it in. Readers only clone the `Arc`.

use async_trait::async_trait;
use debtwise_core::error::{DebtWiseError, Result};
use debtwise_core::traits::ChunkStore;
use debtwise_core::types::{Chunk, ChunkId, ChunkSnapshot, NewChunk};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::validate_batch;

#[derive(Default)]
struct Inner {
    chunks: Arc<Vec<Chunk>>,
    ids: HashSet<ChunkId>,
    dimension: Option<usize>,
}

#[derive(Default)]
pub struct MemoryChunkStore {
    inner: RwLock<Inner>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, chunks: Vec<NewChunk>) -> Result<Vec<ChunkId>> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| DebtWiseError::store(format!("memory store lock poisoned: {e}")))?;

        let dimension = validate_batch(&chunks, inner.dimension, |id| inner.ids.contains(id))?;

        let mut assigned = Vec::with_capacity(chunks.len());
        let mut fresh = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let id = match chunk.id {
                Some(id) => id,
                None => loop {
                    // v4 collisions are theoretical; the lock makes the check atomic
                    let id = ChunkId::generate();
                    if !inner.ids.contains(&id) {
                        break id;
                    }
                },
            };
            fresh.push(Chunk {
                id: id.clone(),
                text: chunk.text,
                embedding: chunk.embedding,
            });
            assigned.push(id);
        }

        inner.ids.extend(assigned.iter().cloned());
        inner.dimension = dimension;
        Arc::make_mut(&mut inner.chunks).extend(fresh);
        Ok(assigned)
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, chunk: NewChunk) -> Result<ChunkId> {
        let mut ids = self.insert(vec![chunk])?;
        ids.pop()
            .ok_or_else(|| DebtWiseError::store("insert returned no id"))
    }

    async fn put_many(&self, chunks: Vec<NewChunk>) -> Result<Vec<ChunkId>> {
        let ids = self.insert(chunks)?;
        tracing::debug!("memory store: inserted {} chunks", ids.len());
        Ok(ids)
    }

    async fn get_all(&self) -> Result<ChunkSnapshot> {
        let inner = self
            .inner
            .read()
            .map_err(|e| DebtWiseError::store(format!("memory store lock poisoned: {e}")))?;
        Ok(ChunkSnapshot::new(Arc::clone(&inner.chunks)))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.get_all().await?.len())
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| DebtWiseError::store(format!("memory store lock poisoned: {e}")))?;
        Ok(inner.dimension)
    }
}
