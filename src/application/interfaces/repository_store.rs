use async_trait::async_trait;

use crate::domain::{
    Branch, Commit, DomainError, Enrichment, EnrichmentKind, FileEntry, FileProcessingStatus,
    Repository, Tag,
};

/// Persistence for repositories and the git metadata they own: commits,
/// files, branches, tags, per-commit file processing statuses, and
/// commit-scoped enrichments. Deleting a repository cascades to all of it.
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Insert or update; assigns the id on first save and returns it.
    async fn save(&self, repository: &Repository) -> Result<i64, DomainError>;

    async fn get(&self, id: i64) -> Result<Option<Repository>, DomainError>;

    async fn get_by_uri(&self, sanitized_uri: &str) -> Result<Option<Repository>, DomainError>;

    async fn list(&self) -> Result<Vec<Repository>, DomainError>;

    /// Cascade delete of the repository and its commits, files, branches,
    /// tags, and commit enrichments. Snippet cleanup happens through the
    /// snippet store first so callers can evict orphans from the indexes.
    async fn delete(&self, id: i64) -> Result<(), DomainError>;

    async fn touch_updated_at(&self, id: i64) -> Result<(), DomainError>;

    async fn upsert_commits(&self, commits: &[Commit]) -> Result<(), DomainError>;

    async fn get_commit(&self, commit_sha: &str) -> Result<Option<Commit>, DomainError>;

    /// Commits of a repository, newest first, optionally limited.
    async fn get_commits(
        &self,
        repo_id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<Commit>, DomainError>;

    async fn upsert_files(&self, files: &[FileEntry]) -> Result<(), DomainError>;

    async fn get_file(&self, blob_sha: &str) -> Result<Option<FileEntry>, DomainError>;

    /// Replace the file links of a commit with the given (blob, status)
    /// pairs.
    async fn set_commit_files(
        &self,
        commit_sha: &str,
        files: &[(String, FileProcessingStatus)],
    ) -> Result<(), DomainError>;

    async fn get_commit_files(&self, commit_sha: &str) -> Result<Vec<FileEntry>, DomainError>;

    /// Files of a commit whose processing status is added or modified.
    async fn get_changed_files(&self, commit_sha: &str) -> Result<Vec<FileEntry>, DomainError>;

    /// Reset every file link of the commit to `clean` (end of phase 5).
    async fn clear_file_statuses(&self, commit_sha: &str) -> Result<(), DomainError>;

    async fn replace_branches(&self, repo_id: i64, branches: &[Branch])
        -> Result<(), DomainError>;

    async fn get_branches(&self, repo_id: i64) -> Result<Vec<Branch>, DomainError>;

    async fn replace_tags(&self, repo_id: i64, tags: &[Tag]) -> Result<(), DomainError>;

    async fn get_tags(&self, repo_id: i64) -> Result<Vec<Tag>, DomainError>;

    async fn save_commit_enrichment(
        &self,
        commit_sha: &str,
        enrichment: &Enrichment,
    ) -> Result<(), DomainError>;

    async fn get_commit_enrichments(
        &self,
        commit_sha: &str,
    ) -> Result<Vec<Enrichment>, DomainError>;

    async fn has_commit_enrichment(
        &self,
        commit_sha: &str,
        kind: EnrichmentKind,
    ) -> Result<bool, DomainError>;
}
