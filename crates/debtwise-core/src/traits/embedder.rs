//! Embedding capability: text in, fixed-length vector out.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Short identifier used in logs (e.g. "openai", "hashing").
    fn name(&self) -> &str;

    /// Output dimensionality when known before the first call.
    fn dimensions(&self) -> Option<usize> {
        None
    }

    /// Embed a single text. Implementations must fail with an embedding
    /// error on unreachable models or malformed output, never return `[]`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
