use async_trait::async_trait;

use crate::domain::{Document, DomainError, EngineHit};

/// BM25-style lexical index over snippet text.
#[async_trait]
pub trait KeywordIndex: Send + Sync {
    /// Index or re-index the given documents.
    async fn index_documents(&self, documents: &[Document]) -> Result<(), DomainError>;

    /// Score documents against the query terms, best first. When
    /// `candidates` is present only those snippet ids are considered
    /// (pre-ranking filters).
    async fn search(
        &self,
        terms: &[String],
        top_k: usize,
        candidates: Option<&[String]>,
    ) -> Result<Vec<EngineHit>, DomainError>;

    async fn delete(&self, snippet_ids: &[String]) -> Result<(), DomainError>;
}
