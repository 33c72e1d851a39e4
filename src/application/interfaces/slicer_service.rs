use async_trait::async_trait;

use crate::domain::{DomainError, Language, Snippet};

/// A file handed to the slicer: blob identity plus decoded content.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub blob_sha: String,
    pub path: String,
    pub content: String,
}

/// One public-API documentation record: a Markdown document per module,
/// keyed by the blob SHA of the module's file.
#[derive(Debug, Clone)]
pub struct ApiDocRecord {
    pub blob_sha: String,
    pub module_path: String,
    pub content: String,
}

/// Language-aware AST slicing.
#[async_trait]
pub trait SlicerService: Send + Sync {
    /// Extract snippet candidates from the given files. Files that fail to
    /// parse are skipped; a language without a grammar produces passthrough
    /// whole-file snippets. Never an error for unknown languages.
    async fn extract_snippets(
        &self,
        files: &[SourceFile],
        language: Language,
    ) -> Result<Vec<Snippet>, DomainError>;

    /// Extract public-API documentation, one record per module.
    async fn extract_api_docs(
        &self,
        files: &[SourceFile],
        language: Language,
        include_private: bool,
    ) -> Result<Vec<ApiDocRecord>, DomainError>;
}
