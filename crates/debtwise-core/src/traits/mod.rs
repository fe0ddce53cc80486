//! Capability traits implemented by the provider and knowledge crates.

pub mod embedder;
pub mod provider;
pub mod store;

pub use embedder::Embedder;
pub use provider::{GenerateParams, Provider};
pub use store::ChunkStore;
