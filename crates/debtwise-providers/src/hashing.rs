//! Local hashing embedder: no model, no network.
//!
//! Lowercased alphanumeric tokens are hashed (SHA-256) into a fixed number of
//! buckets with a hash-derived sign, then the vector is L2-normalized. Texts
//! sharing vocabulary land close together, which is enough for offline runs
//! and deterministic tests.

use async_trait::async_trait;
use debtwise_core::error::{DebtWiseError, Result};
use debtwise_core::traits::Embedder;
use sha2::{Digest, Sha256};

pub const DEFAULT_HASHING_DIMENSIONS: usize = 256;

pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(DebtWiseError::Config("hashing embedder needs dimensions > 0".into()));
        }
        Ok(Self { dimensions })
    }

    /// Synchronous core of `embed`.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let (bucket, sign) = self.slot(&token.to_lowercase());
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    /// Bucket from the first 8 digest bytes, sign from the 9th.
    fn slot(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(head) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimensions: DEFAULT_HASHING_DIMENSIONS }
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}
