//! Vector storage and embedding abstractions for VaultQA

pub mod models;
pub mod traits;

pub use models::*;
pub use traits::{EmbeddingGenerator, VectorRepository};
