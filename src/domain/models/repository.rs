use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::domain::DomainError;

/// Strip credentials and a trailing `.git` suffix from a remote URI.
///
/// The sanitized form is the repository's identity: two remotes that differ
/// only in credentials or the `.git` suffix index into the same repository.
/// Sanitizing is a fixed point: applying it twice yields the same string.
pub fn sanitize_remote_uri(uri: &str) -> Result<String, DomainError> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        return Err(DomainError::invalid_input("Remote URI must not be empty"));
    }

    let (scheme, rest) = trimmed
        .split_once("://")
        .ok_or_else(|| DomainError::invalid_input(format!("Remote URI has no scheme: {uri}")))?;

    if !matches!(scheme, "http" | "https" | "git" | "ssh") {
        return Err(DomainError::invalid_input(format!(
            "Unsupported URI scheme: {scheme}"
        )));
    }

    // Drop userinfo (credentials) if present.
    let rest = match rest.split_once('@') {
        Some((_userinfo, host_and_path)) => host_and_path,
        None => rest,
    };

    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
    if host.is_empty() {
        return Err(DomainError::invalid_input(format!(
            "Remote URI has no host: {uri}"
        )));
    }

    let path = path
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .trim_end_matches('/');

    if path.is_empty() {
        Ok(format!("{scheme}://{host}"))
    } else {
        Ok(format!("{scheme}://{host}/{path}"))
    }
}

/// Directory key for a repository's working copy: clones live at
/// `DATA_DIR/clones/<sha1 hex of the sanitized URI>`.
pub fn clone_dir_key(sanitized_uri: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(sanitized_uri.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    id: i64,
    sanitized_remote_uri: String,
    remote_uri: String,
    cloned_path: String,
    tracking_branch: String,
    last_scanned_at: Option<DateTime<Utc>>,
    num_commits: i64,
    num_branches: i64,
    num_tags: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Repository {
    /// Create an unsaved repository; the store assigns the id on save.
    pub fn new(remote_uri: &str, cloned_path: String) -> Result<Self, DomainError> {
        let sanitized = sanitize_remote_uri(remote_uri)?;
        let now = Utc::now();
        Ok(Self {
            id: 0,
            sanitized_remote_uri: sanitized,
            remote_uri: remote_uri.trim().to_string(),
            cloned_path,
            tracking_branch: String::new(),
            last_scanned_at: None,
            num_commits: 0,
            num_branches: 0,
            num_tags: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: i64,
        sanitized_remote_uri: String,
        remote_uri: String,
        cloned_path: String,
        tracking_branch: String,
        last_scanned_at: Option<DateTime<Utc>>,
        num_commits: i64,
        num_branches: i64,
        num_tags: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sanitized_remote_uri,
            remote_uri,
            cloned_path,
            tracking_branch,
            last_scanned_at,
            num_commits,
            num_branches,
            num_tags,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    pub fn sanitized_remote_uri(&self) -> &str {
        &self.sanitized_remote_uri
    }

    pub fn remote_uri(&self) -> &str {
        &self.remote_uri
    }

    pub fn cloned_path(&self) -> &str {
        &self.cloned_path
    }

    pub fn tracking_branch(&self) -> &str {
        &self.tracking_branch
    }

    pub fn set_tracking_branch(&mut self, branch: impl Into<String>) {
        self.tracking_branch = branch.into();
    }

    pub fn last_scanned_at(&self) -> Option<DateTime<Utc>> {
        self.last_scanned_at
    }

    pub fn mark_scanned(&mut self) {
        let now = Utc::now();
        self.last_scanned_at = Some(now);
        self.updated_at = now;
    }

    pub fn num_commits(&self) -> i64 {
        self.num_commits
    }

    pub fn num_branches(&self) -> i64 {
        self.num_branches
    }

    pub fn num_tags(&self) -> i64 {
        self.num_tags
    }

    pub fn update_counts(&mut self, commits: i64, branches: i64, tags: i64) {
        self.num_commits = commits;
        self.num_branches = branches;
        self.num_tags = tags;
        self.updated_at = Utc::now();
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn has_been_scanned(&self) -> bool {
        self.last_scanned_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    repo_id: i64,
    name: String,
    head_commit_sha: String,
}

impl Branch {
    pub fn new(repo_id: i64, name: impl Into<String>, head_commit_sha: impl Into<String>) -> Self {
        Self {
            repo_id,
            name: name.into(),
            head_commit_sha: head_commit_sha.into(),
        }
    }

    pub fn repo_id(&self) -> i64 {
        self.repo_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn head_commit_sha(&self) -> &str {
        &self.head_commit_sha
    }
}

fn version_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^v?\d+(\.\d+)*(-\w+)?$").expect("static regex"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    repo_id: i64,
    name: String,
    target_commit_sha: String,
}

impl Tag {
    pub fn new(repo_id: i64, name: impl Into<String>, target_commit_sha: impl Into<String>) -> Self {
        Self {
            repo_id,
            name: name.into(),
            target_commit_sha: target_commit_sha.into(),
        }
    }

    pub fn repo_id(&self) -> i64 {
        self.repo_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_commit_sha(&self) -> &str {
        &self.target_commit_sha
    }

    /// A tag is a version tag iff its name matches `v?\d+(\.\d+)*(-\w+)?`.
    pub fn is_version_tag(&self) -> bool {
        version_tag_regex().is_match(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_credentials_and_git_suffix() {
        let sanitized = sanitize_remote_uri("https://user:pw@github.com/a/b.git").unwrap();
        assert_eq!(sanitized, "https://github.com/a/b");
    }

    #[test]
    fn test_sanitize_is_a_fixed_point() {
        let once = sanitize_remote_uri("https://user:pw@github.com/a/b.git").unwrap();
        let twice = sanitize_remote_uri(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sanitize_rejects_missing_scheme() {
        assert!(sanitize_remote_uri("github.com/a/b").is_err());
        assert!(sanitize_remote_uri("").is_err());
    }

    #[test]
    fn test_clone_dir_key_is_stable() {
        let a = clone_dir_key("https://github.com/a/b");
        let b = clone_dir_key("https://github.com/a/b");
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn test_version_tags() {
        for name in ["v1", "v1.2.3", "2.0", "v0.1.0-rc1", "1.2.3-beta"] {
            let tag = Tag::new(1, name, "abc");
            assert!(tag.is_version_tag(), "{name} should be a version tag");
        }
        for name in ["release", "v1.2.x", "latest", "v1..2"] {
            let tag = Tag::new(1, name, "abc");
            assert!(!tag.is_version_tag(), "{name} should not be a version tag");
        }
    }

    #[test]
    fn test_repository_counts_and_scan() {
        let mut repo = Repository::new("https://github.com/x/y.git", "/tmp/y".into()).unwrap();
        assert_eq!(repo.sanitized_remote_uri(), "https://github.com/x/y");
        assert!(!repo.has_been_scanned());

        repo.update_counts(10, 2, 3);
        repo.mark_scanned();
        assert_eq!(repo.num_commits(), 10);
        assert!(repo.has_been_scanned());
    }
}
