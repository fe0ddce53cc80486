//! # DebtWise Core
//!
//! Shared vocabulary for the DebtWise workspace: the error type, the TOML
//! configuration, the chunk/result data model, and the capability traits
//! (`Embedder`, `Provider`, `ChunkStore`) that the other crates implement.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::DebtWiseConfig;
pub use error::{DebtWiseError, Result};
