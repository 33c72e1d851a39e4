use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::DomainError;

/// A commit as reported by the git backend, before it is attached to a
/// repository row.
#[derive(Debug, Clone)]
pub struct GitCommitInfo {
    pub commit_sha: String,
    /// Empty for root commits.
    pub parent_sha: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub message: String,
}

/// A file of a commit's tree.
#[derive(Debug, Clone)]
pub struct GitFileInfo {
    pub blob_sha: String,
    pub path: String,
    pub size: i64,
}

#[derive(Debug, Clone)]
pub struct GitBranchInfo {
    pub name: String,
    pub head_commit_sha: String,
}

#[derive(Debug, Clone)]
pub struct GitTagInfo {
    pub name: String,
    pub target_commit_sha: String,
}

/// Strategy interface over the git backend. The orchestrator only depends on
/// this contract; which implementation backs it (CLI, libgit2, pure Rust) is
/// a wiring decision.
#[async_trait]
pub trait GitAdapter: Send + Sync {
    async fn clone_repository(&self, remote_uri: &str, dest: &Path) -> Result<(), DomainError>;

    async fn pull(&self, repo_path: &Path) -> Result<(), DomainError>;

    async fn checkout_commit(&self, repo_path: &Path, commit_sha: &str)
        -> Result<(), DomainError>;

    async fn get_default_branch(&self, repo_path: &Path) -> Result<String, DomainError>;

    /// All commits reachable from `branch`, newest first.
    async fn get_commits(
        &self,
        repo_path: &Path,
        branch: &str,
    ) -> Result<Vec<GitCommitInfo>, DomainError>;

    async fn get_commit_files(
        &self,
        repo_path: &Path,
        commit_sha: &str,
    ) -> Result<Vec<GitFileInfo>, DomainError>;

    /// The content of one blob. Binary blobs come back lossily decoded; the
    /// slicer filters on extension before ever asking for content.
    async fn get_file_content(
        &self,
        repo_path: &Path,
        blob_sha: &str,
    ) -> Result<String, DomainError>;

    async fn get_all_branches(&self, repo_path: &Path)
        -> Result<Vec<GitBranchInfo>, DomainError>;

    async fn get_all_tags(&self, repo_path: &Path) -> Result<Vec<GitTagInfo>, DomainError>;

    async fn get_commit_diff(
        &self,
        repo_path: &Path,
        commit_sha: &str,
    ) -> Result<String, DomainError>;
}
