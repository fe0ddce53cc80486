//! SQLite chunk store.
//!
//! Embeddings are stored as little-endian `f32` BLOBs. Uniqueness is enforced
//! by the `UNIQUE` constraint on `id`, so an insert either lands or fails with
//! `DuplicateId`; there is no read-then-write window. Blocking work runs on
//! the tokio blocking pool under a timeout.
//!
//! A timed-out call never commits later: the blocking task and the waiting
//! caller race on one `CallState` flag, and exactly one of them wins. If the
//! caller wins, the task rolls back; if the task already started its commit,
//! the caller waits for it and reports the real outcome.

use async_trait::async_trait;
use byteorder::{ByteOrder, LittleEndian};
use debtwise_core::error::{DebtWiseError, Result};
use debtwise_core::traits::ChunkStore;
use debtwise_core::types::{Chunk, ChunkId, ChunkSnapshot, NewChunk};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::validate_batch;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS chunks (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        text TEXT NOT NULL,
        embedding BLOB NOT NULL,
        dims INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );

    -- Single-row facts about the collection (embedding dimension)
    CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );";

pub struct SqliteChunkStore {
    conn: Arc<Mutex<Connection>>,
    timeout: Duration,
}

fn db_err(e: rusqlite::Error) -> DebtWiseError {
    DebtWiseError::store(e.to_string())
}

/// Shared between a blocking store call and the caller awaiting it.
struct CallState(AtomicU8);

impl CallState {
    const RUNNING: u8 = 0;
    const ABANDONED: u8 = 1;
    const COMMITTING: u8 = 2;

    fn new() -> Self {
        Self(AtomicU8::new(Self::RUNNING))
    }

    /// Caller side: give up on the call. False if a commit is already under way.
    fn abandon(&self) -> bool {
        self.transition(Self::ABANDONED)
    }

    /// Task side: claim the right to commit. False if the caller gave up.
    fn begin_commit(&self) -> bool {
        self.transition(Self::COMMITTING)
    }

    fn is_abandoned(&self) -> bool {
        self.0.load(Ordering::Acquire) == Self::ABANDONED
    }

    fn transition(&self, to: u8) -> bool {
        self.0
            .compare_exchange(Self::RUNNING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

fn abandoned(operation: &str) -> DebtWiseError {
    DebtWiseError::store(format!("{operation} abandoned after timeout"))
}

impl SqliteChunkStore {
    /// Open or create the store at the given path.
    pub fn open(path: &Path, timeout_secs: u64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DebtWiseError::store(format!("create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        tracing::debug!("opened chunk store at {}", path.display());
        Self::init(conn, timeout_secs)
    }

    /// A private, non-persistent database. Mostly for tests.
    pub fn open_in_memory(timeout_secs: u64) -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(db_err)?, timeout_secs)
    }

    fn init(conn: Connection, timeout_secs: u64) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        conn.busy_timeout(timeout).map_err(db_err)?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| DebtWiseError::store(format!("migration: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            timeout,
        })
    }

    /// Run `f` against the connection on the blocking pool, bounded by the
    /// store timeout.
    ///
    /// Writers must call `CallState::begin_commit` right before committing
    /// and roll back when it returns false.
    async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &CallState) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let state = Arc::new(CallState::new());
        let task_state = Arc::clone(&state);
        let mut task = tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| DebtWiseError::store(format!("connection lock poisoned: {e}")))?;
            if task_state.is_abandoned() {
                return Err(abandoned(operation));
            }
            f(&mut guard, &task_state)
        });

        let joined = match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) if state.abandon() => {
                tracing::warn!("chunk store {operation} exceeded {:?}", self.timeout);
                return Err(DebtWiseError::Timeout {
                    operation: format!("chunk store {operation}"),
                    secs: self.timeout.as_secs(),
                });
            }
            Err(_) => {
                tracing::debug!("chunk store {operation} is committing, waiting past timeout");
                task.await
            }
        };
        joined.map_err(|join| DebtWiseError::store(format!("{operation} task failed: {join}")))?
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut buf = vec![0u8; embedding.len() * 4];
    LittleEndian::write_f32_into(embedding, &mut buf);
    buf
}

fn decode_embedding(blob: &[u8], dims: usize) -> Result<Vec<f32>> {
    if blob.len() != dims * 4 {
        return Err(DebtWiseError::store(format!(
            "corrupt embedding: {} bytes for {} dims",
            blob.len(),
            dims
        )));
    }
    let mut out = vec![0f32; dims];
    LittleEndian::read_f32_into(blob, &mut out);
    Ok(out)
}

fn read_dimension(conn: &Connection) -> Result<Option<usize>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = 'dimension'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)?;
    value
        .map(|v| {
            v.parse::<usize>()
                .map_err(|e| DebtWiseError::store(format!("bad stored dimension '{v}': {e}")))
        })
        .transpose()
}

fn insert_batch(
    conn: &mut Connection,
    state: &CallState,
    chunks: Vec<NewChunk>,
) -> Result<Vec<ChunkId>> {
    let tx = conn.transaction().map_err(db_err)?;
    let stored_dimension = read_dimension(&tx)?;
    // Ids already in the table are caught by the UNIQUE constraint below.
    let dimension = validate_batch(&chunks, stored_dimension, |_| false)?;

    let now = chrono::Utc::now().to_rfc3339();
    let mut ids = Vec::with_capacity(chunks.len());
    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO chunks (id, text, embedding, dims, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(db_err)?;
        for chunk in chunks {
            let id = chunk.id.unwrap_or_else(ChunkId::generate);
            stmt.execute(params![
                id.as_str(),
                chunk.text,
                encode_embedding(&chunk.embedding),
                chunk.embedding.len() as i64,
                now,
            ])
            .map_err(|e| match e.sqlite_error_code() {
                Some(ErrorCode::ConstraintViolation) => DebtWiseError::DuplicateId(id.to_string()),
                _ => db_err(e),
            })?;
            ids.push(id);
        }
    }

    if stored_dimension.is_none() {
        if let Some(dim) = dimension {
            tx.execute(
                "INSERT INTO store_meta (key, value) VALUES ('dimension', ?1)",
                params![dim.to_string()],
            )
            .map_err(db_err)?;
        }
    }

    // Dropping `tx` (here or on any earlier `?`) rolls the whole batch back.
    if !state.begin_commit() {
        return Err(abandoned("insert"));
    }
    tx.commit().map_err(db_err)?;
    Ok(ids)
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn put(&self, chunk: NewChunk) -> Result<ChunkId> {
        let mut ids = self
            .run("put", move |conn, state| insert_batch(conn, state, vec![chunk]))
            .await?;
        ids.pop()
            .ok_or_else(|| DebtWiseError::store("insert returned no id"))
    }

    async fn put_many(&self, chunks: Vec<NewChunk>) -> Result<Vec<ChunkId>> {
        let ids = self
            .run("put_many", move |conn, state| insert_batch(conn, state, chunks))
            .await?;
        tracing::debug!("sqlite store: inserted {} chunks", ids.len());
        Ok(ids)
    }

    async fn get_all(&self) -> Result<ChunkSnapshot> {
        let chunks = self
            .run("get_all", |conn, _| {
                let mut stmt = conn
                    .prepare("SELECT id, text, embedding, dims FROM chunks ORDER BY seq")
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Vec<u8>>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    })
                    .map_err(db_err)?;

                // Any bad row fails the whole read; never hand out a truncated snapshot.
                let mut chunks = Vec::new();
                for row in rows {
                    let (id, text, blob, dims) = row.map_err(db_err)?;
                    chunks.push(Chunk {
                        id: ChunkId::new(id),
                        text,
                        embedding: decode_embedding(&blob, dims as usize)?,
                    });
                }
                Ok(chunks)
            })
            .await?;
        Ok(ChunkSnapshot::from(chunks))
    }

    async fn len(&self) -> Result<usize> {
        self.run("len", |conn, _| {
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get::<_, i64>(0))
                .map(|n| n as usize)
                .map_err(db_err)
        })
        .await
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        self.run("dimension", |conn, _| read_dimension(conn)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_blob_encoding() {
        let v = vec![1.0f32, -0.5, 0.7];
        let blob = encode_embedding(&v);
        assert_eq!(blob.len(), 12);
        assert_eq!(&blob[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_embedding(&blob, 3).unwrap(), v);
        assert!(decode_embedding(&blob, 4).unwrap_err().is_store_error());
    }

    #[tokio::test]
    async fn test_put_and_get_all() {
        let store = SqliteChunkStore::open_in_memory(5).unwrap();
        store.put(NewChunk::with_id("a", "A", vec![1.0, 0.0])).await.unwrap();
        let generated = store.put(NewChunk::new("B", vec![0.0, 1.0])).await.unwrap();
        assert_eq!(generated.as_str().len(), 36);

        let snap = store.get_all().await.unwrap();
        let texts: Vec<_> = snap.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B"]);
        assert_eq!(snap.iter().next().unwrap().embedding, vec![1.0, 0.0]);
        assert_eq!(store.dimension().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected_without_overwrite() {
        let store = SqliteChunkStore::open_in_memory(5).unwrap();
        store.put(NewChunk::with_id("a", "original", vec![1.0])).await.unwrap();
        let err = store
            .put(NewChunk::with_id("a", "overwrite", vec![9.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, DebtWiseError::DuplicateId(_)));

        let snap = store.get_all().await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.iter().next().unwrap().text, "original");
    }

    #[tokio::test]
    async fn test_failed_batch_rolls_back() {
        let store = SqliteChunkStore::open_in_memory(5).unwrap();
        store.put(NewChunk::with_id("a", "A", vec![1.0, 0.0])).await.unwrap();

        let batch = vec![
            NewChunk::with_id("b", "B", vec![0.0, 1.0]),
            NewChunk::with_id("a", "again", vec![0.5, 0.5]),
        ];
        assert!(matches!(
            store.put_many(batch).await,
            Err(DebtWiseError::DuplicateId(_))
        ));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_timed_out_put_is_not_committed() {
        let store = SqliteChunkStore::open_in_memory(1).unwrap();

        // Keep the connection busy past the store timeout.
        let conn = Arc::clone(&store.conn);
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let holder = std::thread::spawn(move || {
            let _guard = conn.lock().unwrap();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(1500));
        });
        locked_rx.recv().unwrap();

        let err = store.put(NewChunk::new("A", vec![1.0, 0.0])).await.unwrap_err();
        assert!(matches!(err, DebtWiseError::Timeout { secs: 1, .. }));
        assert!(err.is_retryable());

        holder.join().unwrap();
        // Let the abandoned task take the lock and bail out.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.len().await.unwrap(), 0);

        // Retrying stores the chunk exactly once.
        store.put(NewChunk::new("A", vec![1.0, 0.0])).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[test]
    fn test_commit_and_abandon_are_exclusive() {
        let state = CallState::new();
        assert!(state.begin_commit());
        assert!(!state.abandon());

        let state = CallState::new();
        assert!(state.abandon());
        assert!(state.is_abandoned());
        assert!(!state.begin_commit());
    }

    #[test]
    fn test_abandoned_batch_rolls_back() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let state = CallState::new();
        assert!(state.abandon());
        let err = insert_batch(&mut conn, &state, vec![NewChunk::new("A", vec![1.0])])
            .unwrap_err();
        assert!(err.is_store_error());
        let rows: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0)).unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_dimension_persists_across_reopen() {
        let dir = std::env::temp_dir().join("debtwise-sqlite-store-test");
        std::fs::remove_dir_all(&dir).ok();
        let path = dir.join("knowledge.db");
        {
            let store = SqliteChunkStore::open(&path, 5).unwrap();
            store.put(NewChunk::new("A", vec![1.0, 2.0, 3.0])).await.unwrap();
        }

        let store = SqliteChunkStore::open(&path, 5).unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(store.dimension().await.unwrap(), Some(3));
        let err = store.put(NewChunk::new("B", vec![1.0])).await.unwrap_err();
        assert!(matches!(err, DebtWiseError::DimensionMismatch { expected: 3, actual: 1 }));
        std::fs::remove_dir_all(&dir).ok();
    }
}
