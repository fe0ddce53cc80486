//! Retrieval contract, exercised against both store backends.

use async_trait::async_trait;
use debtwise_core::error::{DebtWiseError, Result};
use debtwise_core::traits::{ChunkStore, Embedder};
use debtwise_core::types::NewChunk;
use debtwise_knowledge::{
    Indexer, MemoryChunkStore, RecursiveSplitter, SimilarityRetriever, SqliteChunkStore,
};
use debtwise_providers::hashing::HashingEmbedder;
use std::sync::Arc;

struct FixedEmbedder(Vec<f32>);

#[async_trait]
impl Embedder for FixedEmbedder {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

fn stores() -> Vec<Arc<dyn ChunkStore>> {
    vec![
        Arc::new(MemoryChunkStore::new()),
        Arc::new(SqliteChunkStore::open_in_memory(5).unwrap()),
    ]
}

async fn fill(store: &Arc<dyn ChunkStore>, chunks: &[(&str, [f32; 2])]) {
    for (text, v) in chunks {
        store.put(NewChunk::new(*text, v.to_vec())).await.unwrap();
    }
}

#[tokio::test]
async fn three_chunk_scenario_returns_a_then_c() {
    for store in stores() {
        fill(&store, &[("A", [1.0, 0.0]), ("B", [0.0, 1.0]), ("C", [0.7, 0.7])]).await;
        let embedder = Arc::new(FixedEmbedder(vec![1.0, 0.0]));
        let retriever = SimilarityRetriever::new(store.clone(), embedder);

        let scored = retriever.retrieve_scored("which?", 3).await.unwrap();
        let scores: Vec<f32> = scored.iter().map(|r| r.score).collect();
        assert!((scores[0] - 1.0).abs() < 1e-6);
        assert!((scores[1] - 0.7).abs() < 1e-6);
        assert_eq!(scores[2], 0.0);

        let top_two = retriever.retrieve("which?", 2).await.unwrap();
        assert_eq!(top_two, vec!["A", "C"], "{}", store.name());
    }
}

#[tokio::test]
async fn result_count_is_min_of_top_k_and_store_size() {
    for store in stores() {
        fill(&store, &[("A", [1.0, 0.0]), ("B", [0.0, 1.0]), ("C", [0.7, 0.7])]).await;
        let retriever = SimilarityRetriever::new(store, Arc::new(FixedEmbedder(vec![0.3, 0.4])));
        for top_k in 1..=5 {
            let results = retriever.retrieve("q", top_k).await.unwrap();
            assert_eq!(results.len(), top_k.min(3));
        }
    }
}

#[tokio::test]
async fn empty_store_returns_empty_not_error() {
    for store in stores() {
        let retriever = SimilarityRetriever::new(store, Arc::new(FixedEmbedder(vec![1.0, 0.0])));
        for top_k in [1, 3, 100] {
            assert!(retriever.retrieve("anything", top_k).await.unwrap().is_empty());
        }
    }
}

#[tokio::test]
async fn ties_keep_store_order() {
    for store in stores() {
        fill(
            &store,
            &[
                ("first", [0.5, 0.5]),
                ("top", [2.0, 0.0]),
                ("second", [0.5, 0.5]),
                ("third", [1.0, 0.0]),
            ],
        )
        .await;
        let retriever = SimilarityRetriever::new(store, Arc::new(FixedEmbedder(vec![1.0, 0.0])));
        // Scores: first=0.5, top=2.0, second=0.5, third=1.0
        let results = retriever.retrieve("q", 4).await.unwrap();
        assert_eq!(results, vec!["top", "third", "first", "second"]);
    }
}

#[tokio::test]
async fn repeated_and_concurrent_calls_agree() {
    for store in stores() {
        let embedder = Arc::new(HashingEmbedder::default());
        let texts = [
            "Credit cards charge the highest interest.",
            "Student loans often have income-driven plans.",
            "Car loans are secured by the vehicle.",
            "An emergency fund prevents new debt.",
        ];
        for text in texts {
            let v = embedder.embed(text).await.unwrap();
            store.put(NewChunk::new(text, v)).await.unwrap();
        }

        let retriever = Arc::new(SimilarityRetriever::new(store, embedder));
        let first = retriever.retrieve("credit card interest", 3).await.unwrap();
        let again = retriever.retrieve("credit card interest", 3).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(first[0], texts[0]);

        let a = tokio::spawn({
            let r = Arc::clone(&retriever);
            async move { r.retrieve("credit card interest", 3).await.unwrap() }
        });
        let b = tokio::spawn({
            let r = Arc::clone(&retriever);
            async move { r.retrieve("credit card interest", 3).await.unwrap() }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a, b);
        assert_eq!(a, first);
    }
}

#[tokio::test]
async fn dimension_mismatch_is_an_embedding_error() {
    for store in stores() {
        fill(&store, &[("A", [1.0, 0.0])]).await;

        let err = store.put(NewChunk::new("wide", vec![1.0, 0.0, 0.0])).await.unwrap_err();
        assert!(err.is_embedding_error());

        let retriever = SimilarityRetriever::new(store, Arc::new(FixedEmbedder(vec![1.0])));
        assert!(retriever.retrieve("q", 1).await.unwrap_err().is_embedding_error());
    }
}

#[tokio::test]
async fn duplicate_id_leaves_store_unchanged() {
    for store in stores() {
        store.put(NewChunk::with_id("doc-1", "kept", vec![1.0, 0.0])).await.unwrap();
        let err = store
            .put(NewChunk::with_id("doc-1", "replacement", vec![0.0, 1.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, DebtWiseError::DuplicateId(_)));

        let snap = store.get_all().await.unwrap();
        assert_eq!(snap.len(), 1);
        let only = snap.iter().next().unwrap();
        assert_eq!(only.text, "kept");
        assert_eq!(only.embedding, vec![1.0, 0.0]);
    }
}

#[tokio::test]
async fn concurrent_puts_get_distinct_ids() {
    for store in stores() {
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.put(NewChunk::new(format!("chunk {i}"), vec![i as f32, 1.0])).await.unwrap()
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 16);
        assert_eq!(store.len().await.unwrap(), 16);
    }
}

#[tokio::test]
async fn indexed_documents_are_retrievable() {
    let store: Arc<dyn ChunkStore> = Arc::new(MemoryChunkStore::new());
    let embedder = Arc::new(HashingEmbedder::default());
    let indexer = Indexer::new(store.clone(), embedder.clone(), RecursiveSplitter::new(60, 10));
    let docs = vec![debtwise_knowledge::Document {
        name: "strategies.md".into(),
        text: "The avalanche method pays the highest interest rate first.\n\n\
               The snowball method pays the smallest balance first."
            .into(),
    }];
    indexer.index_documents(&docs).await.unwrap();

    let retriever = SimilarityRetriever::new(store, embedder);
    let top = retriever.retrieve("smallest balance snowball", 1).await.unwrap();
    assert_eq!(top, vec!["The snowball method pays the smallest balance first."]);
}
