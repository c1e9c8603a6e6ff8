use crate::models::*;
use async_trait::async_trait;
use vaultqa_core::{Result, Uuid};

/// Vector storage operations
///
/// Batching and retry are the adapter's responsibility; callers pass whole
/// batches. `delete` is idempotent.
#[async_trait]
pub trait VectorRepository: Send + Sync {
    /// Create the collection if absent; fail if an existing collection's
    /// vector size disagrees.
    async fn ensure_collection(&self, vector_size: usize) -> Result<()>;
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<()>;
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: &ScopeFilter,
    ) -> Result<Vec<ScoredPoint>>;
    async fn delete(&self, ids: &[Uuid]) -> Result<()>;
    async fn point_count(&self) -> Result<usize>;
}

/// Embedding generation
///
/// `embed` returns one vector per input, in order, all of the declared
/// dimensionality. Context-size overflow surfaces as
/// `VaultQaError::EmbeddingOverflow`; callers handle it by recursive halving.
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
}
