use async_trait::async_trait;

use crate::domain::{DomainError, EmbeddingKind, EmbeddingResponse, EngineHit};

/// Dense vector index. Two logical spaces live behind one interface,
/// selected by [`EmbeddingKind`]: code embeddings (always present once
/// phase 4 ran) and text embeddings (only for snippets with a summary).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn index_embeddings(
        &self,
        kind: EmbeddingKind,
        embeddings: &[EmbeddingResponse],
    ) -> Result<(), DomainError>;

    /// Cosine-similarity top-k, best first. When `candidates` is present
    /// only those snippet ids are considered.
    async fn search(
        &self,
        kind: EmbeddingKind,
        query: &[f32],
        top_k: usize,
        candidates: Option<&[String]>,
    ) -> Result<Vec<EngineHit>, DomainError>;

    async fn delete(&self, snippet_ids: &[String]) -> Result<(), DomainError>;
}
