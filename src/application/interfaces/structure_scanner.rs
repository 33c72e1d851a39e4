use std::path::Path;

use async_trait::async_trait;

use crate::domain::{DomainError, Language};

/// Scans a working copy for the raw material the commit-scoped enrichments
/// feed to the LLM: a physical-architecture narrative, a database schema
/// report, a signature-annotated repository tree, and usage context for
/// cookbook generation.
#[async_trait]
pub trait StructureScanner: Send + Sync {
    /// Narrative describing deployable components (containers, services)
    /// discovered in the tree.
    async fn discover_architecture(&self, repo_path: &Path) -> Result<String, DomainError>;

    /// Report of database schema artifacts (SQL files, migrations). Contains
    /// the phrase "No database schemas detected" when nothing was found.
    async fn discover_schemas(&self, repo_path: &Path) -> Result<String, DomainError>;

    /// Repository tree with per-file code signatures.
    async fn repository_tree(&self, repo_path: &Path) -> Result<String, DomainError>;

    /// Context for cookbook generation: README, entry points, and the public
    /// API surface of the primary language.
    async fn gather_context(
        &self,
        repo_path: &Path,
        language: Language,
    ) -> Result<String, DomainError>;
}
