use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    DomainError, Enrichment, ProcessingPhase, SearchFilters, Snippet,
};

/// A snippet joined with the metadata a search hit needs.
#[derive(Debug, Clone)]
pub struct SnippetContext {
    pub snippet: Snippet,
    pub source_uri: String,
    pub relative_path: String,
    pub authors: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Content-addressed persistence of snippets, their derivation links to
/// commit files, their enrichments, and their per-phase processing states.
///
/// A snippet is durable as long as at least one commit references it;
/// enrichment and embedding state are keyed by the content hash and so
/// survive across commits whose file content reproduces the snippet.
#[async_trait]
pub trait SnippetStore: Send + Sync {
    /// Insert snippets whose content hash is new and link every listed
    /// snippet to `commit_sha`. Derivation links are upserted; snippets are
    /// never duplicated by hash.
    async fn save(&self, commit_sha: &str, snippets: &[Snippet]) -> Result<(), DomainError>;

    /// Drop every derivation link of `commit_sha` that is not in `keep_ids`,
    /// then garbage-collect snippets with no remaining derivations.
    /// Returns the ids of collected snippets.
    async fn prune_for_commit(
        &self,
        commit_sha: &str,
        keep_ids: &[String],
    ) -> Result<Vec<String>, DomainError>;

    /// Remove all derivations of a commit and garbage-collect orphans.
    async fn delete_for_commit(&self, commit_sha: &str) -> Result<Vec<String>, DomainError>;

    async fn get(&self, snippet_id: &str) -> Result<Option<Snippet>, DomainError>;

    async fn get_by_ids(&self, snippet_ids: &[String]) -> Result<Vec<Snippet>, DomainError>;

    /// Snippets linked to a commit, with derivations and enrichments.
    async fn get_for_commit(&self, commit_sha: &str) -> Result<Vec<Snippet>, DomainError>;

    /// Snippets of a repository's commits that lack a completed processing
    /// state for `phase`.
    async fn get_snippets_needing(
        &self,
        index_id: i64,
        phase: ProcessingPhase,
    ) -> Result<Vec<Snippet>, DomainError>;

    /// Idempotently record phase completion for the given snippets.
    async fn mark_completed(
        &self,
        snippet_ids: &[String],
        phase: ProcessingPhase,
    ) -> Result<(), DomainError>;

    async fn add_enrichment(
        &self,
        snippet_id: &str,
        enrichment: &Enrichment,
    ) -> Result<(), DomainError>;

    /// Snippet ids passing the given pre-ranking filters, or `None` when no
    /// filter is set (engines then consider everything).
    async fn filter_candidates(
        &self,
        filters: &SearchFilters,
    ) -> Result<Option<Vec<String>>, DomainError>;

    /// Hydration join for search results.
    async fn get_contexts(
        &self,
        snippet_ids: &[String],
    ) -> Result<Vec<SnippetContext>, DomainError>;
}
