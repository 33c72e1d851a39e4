use async_trait::async_trait;

use crate::domain::{DomainError, EmbeddingRequest, EmbeddingResponse};

/// Produces dense vectors for snippet code or summary text.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed a batch of texts. The response order matches the request order.
    async fn embed(
        &self,
        requests: &[EmbeddingRequest],
    ) -> Result<Vec<EmbeddingResponse>, DomainError>;

    /// Embed a single ad-hoc query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, DomainError>;
}
