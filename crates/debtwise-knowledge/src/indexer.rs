//! Indexing: load documents, chunk them, embed each chunk, store the batch.
//!
//! Plain text (`.txt`, `.md`) is read as-is; `.pdf` text is extracted with
//! `pdf-extract`. Scanned PDFs without a text layer yield no chunks.

use debtwise_core::error::{DebtWiseError, Result};
use debtwise_core::traits::{ChunkStore, Embedder};
use debtwise_core::types::NewChunk;
use std::path::Path;
use std::sync::Arc;

use crate::chunker::RecursiveSplitter;

/// Chunks sent to the embedder per request.
const EMBED_BATCH: usize = 32;

const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];
const PDF_EXTENSION: &str = "pdf";

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn read_document(path: &Path) -> Result<String> {
    match extension(path).as_deref() {
        Some(PDF_EXTENSION) => pdf_extract::extract_text(path)
            .map_err(|e| DebtWiseError::Document(format!("{}: {e}", path.display()))),
        _ => std::fs::read_to_string(path)
            .map_err(|e| DebtWiseError::Document(format!("{}: {e}", path.display()))),
    }
}

/// A named plain-text document.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
}

/// Load every `.txt` / `.md` / `.pdf` file directly inside `dir`, sorted by
/// file name. One unreadable file fails the whole load.
pub fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let supported = extension(&path)
            .is_some_and(|e| e == PDF_EXTENSION || TEXT_EXTENSIONS.contains(&e.as_str()));
        if path.is_file() && supported {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let text = read_document(&path)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(Document { name, text })
        })
        .collect()
}

pub struct Indexer {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    splitter: RecursiveSplitter,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        embedder: Arc<dyn Embedder>,
        splitter: RecursiveSplitter,
    ) -> Self {
        Self {
            store,
            embedder,
            splitter,
        }
    }

    pub async fn index_directory(&self, dir: &Path) -> Result<IndexReport> {
        if !dir.is_dir() {
            return Err(DebtWiseError::InvalidInput(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        let documents = load_documents(dir)?;
        tracing::info!("loaded {} documents from {}", documents.len(), dir.display());
        self.index_documents(&documents).await
    }

    /// Chunk and embed every document, then insert all chunks in one batch.
    ///
    /// Nothing is stored unless every chunk embedded successfully.
    pub async fn index_documents(&self, documents: &[Document]) -> Result<IndexReport> {
        let mut texts = Vec::new();
        for doc in documents {
            let chunks = self.splitter.split(&doc.text);
            tracing::debug!("{}: {} chunks", doc.name, chunks.len());
            texts.extend(chunks.into_iter().map(|c| c.text));
        }

        let mut new_chunks = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH) {
            let vectors = self.embedder.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(DebtWiseError::embedding(format!(
                    "{} returned {} vectors for {} texts",
                    self.embedder.name(),
                    vectors.len(),
                    batch.len()
                )));
            }
            new_chunks.extend(
                batch
                    .iter()
                    .zip(vectors)
                    .map(|(text, embedding)| NewChunk::new(text.clone(), embedding)),
            );
        }

        let stored = if new_chunks.is_empty() {
            0
        } else {
            self.store.put_many(new_chunks).await?.len()
        };
        tracing::info!(
            "indexed {} documents into {} chunks ({} store)",
            documents.len(),
            stored,
            self.store.name()
        );
        Ok(IndexReport {
            documents: documents.len(),
            chunks: stored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryChunkStore;
    use async_trait::async_trait;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        fn name(&self) -> &str {
            "length"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        fn name(&self) -> &str {
            "broken"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(DebtWiseError::embedding("model unreachable"))
        }
    }

    fn docs() -> Vec<Document> {
        vec![
            Document {
                name: "a.txt".into(),
                text: "Pay minimums on all debts.\n\nThen attack the highest APR.".into(),
            },
            Document { name: "b.md".into(), text: "Snowball method.".into() },
        ]
    }

    #[tokio::test]
    async fn test_index_documents() {
        let store = Arc::new(MemoryChunkStore::new());
        let splitter = RecursiveSplitter::new(30, 0);
        let indexer = Indexer::new(store.clone(), Arc::new(LengthEmbedder), splitter);
        let report = indexer.index_documents(&docs()).await.unwrap();
        assert_eq!(report, IndexReport { documents: 2, chunks: 3 });

        let snap = store.get_all().await.unwrap();
        let texts: Vec<_> = snap.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Pay minimums on all debts.", "Then attack the highest APR.", "Snowball method."]
        );
    }

    #[tokio::test]
    async fn test_embedding_failure_stores_nothing() {
        let store = Arc::new(MemoryChunkStore::new());
        let indexer =
            Indexer::new(store.clone(), Arc::new(BrokenEmbedder), RecursiveSplitter::default());
        assert!(indexer.index_documents(&docs()).await.unwrap_err().is_embedding_error());
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_index_directory_reads_text_files_only() {
        let dir = std::env::temp_dir().join("debtwise-indexer-test");
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("b.md"), "Second file.").unwrap();
        std::fs::write(dir.join("a.txt"), "First file.").unwrap();
        std::fs::write(dir.join("skip.docx"), "binary").unwrap();

        let loaded = load_documents(&dir).unwrap();
        let names: Vec<_> = loaded.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.md"]);

        let store = Arc::new(MemoryChunkStore::new());
        let indexer =
            Indexer::new(store.clone(), Arc::new(LengthEmbedder), RecursiveSplitter::default());
        let report = indexer.index_directory(&dir).await.unwrap();
        assert_eq!(report.chunks, 2);

        assert!(indexer.index_directory(&dir.join("missing")).await.is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_pdf_text_is_extracted_and_indexed() {
        let dir = std::env::temp_dir().join("debtwise-indexer-pdf-test");
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/avalanche.pdf");
        std::fs::copy(&fixture, dir.join("avalanche.pdf")).unwrap();
        std::fs::write(dir.join("notes.txt"), "Snowball method.").unwrap();

        let loaded = load_documents(&dir).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "avalanche.pdf");
        assert!(loaded[0].text.contains("avalanche"));
        assert!(loaded[0].text.contains("APR"));

        let store = Arc::new(MemoryChunkStore::new());
        let indexer =
            Indexer::new(store.clone(), Arc::new(LengthEmbedder), RecursiveSplitter::default());
        let report = indexer.index_directory(&dir).await.unwrap();
        assert_eq!(report, IndexReport { documents: 2, chunks: 2 });
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_pdf_is_a_document_error() {
        let dir = std::env::temp_dir().join("debtwise-indexer-bad-pdf-test");
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("broken.pdf"), "not a pdf").unwrap();

        let err = load_documents(&dir).unwrap_err();
        assert!(matches!(err, DebtWiseError::Document(ref msg) if msg.contains("broken.pdf")));
        std::fs::remove_dir_all(&dir).ok();
    }
}
