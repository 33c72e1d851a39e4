use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Language;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    commit_sha: String,
    repo_id: i64,
    parent_sha: String,
    author: String,
    date: DateTime<Utc>,
    message: String,
}

impl Commit {
    pub fn new(
        commit_sha: impl Into<String>,
        repo_id: i64,
        parent_sha: impl Into<String>,
        author: impl Into<String>,
        date: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            commit_sha: commit_sha.into(),
            repo_id,
            parent_sha: parent_sha.into(),
            author: author.into(),
            date,
            message: message.into(),
        }
    }

    pub fn commit_sha(&self) -> &str {
        &self.commit_sha
    }

    pub fn repo_id(&self) -> i64 {
        self.repo_id
    }

    /// Empty for root commits.
    pub fn parent_sha(&self) -> &str {
        &self.parent_sha
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_root(&self) -> bool {
        self.parent_sha.is_empty()
    }

    pub fn short_sha(&self) -> &str {
        &self.commit_sha[..self.commit_sha.len().min(8)]
    }
}

/// A file blob. Identified by its blob SHA, so commits that reference the
/// same content share one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    blob_sha: String,
    path: String,
    mime_type: String,
    size: i64,
    extension: String,
}

impl FileEntry {
    pub fn new(
        blob_sha: impl Into<String>,
        path: impl Into<String>,
        mime_type: impl Into<String>,
        size: i64,
    ) -> Self {
        let path = path.into();
        let extension = std::path::Path::new(&path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        Self {
            blob_sha: blob_sha.into(),
            path,
            mime_type: mime_type.into(),
            size,
            extension,
        }
    }

    pub fn blob_sha(&self) -> &str {
        &self.blob_sha
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn language(&self) -> Language {
        Language::from_extension(&self.extension)
    }

    pub fn module_stem(&self) -> &str {
        std::path::Path::new(&self.path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
    }
}

/// Processing status a commit-file link carries between phase 1 (which sets
/// it from the diff against the previous scan) and phase 5 (which resets it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileProcessingStatus {
    Clean,
    Added,
    Modified,
    Deleted,
}

impl FileProcessingStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            FileProcessingStatus::Clean => 0,
            FileProcessingStatus::Added => 1,
            FileProcessingStatus::Modified => 2,
            FileProcessingStatus::Deleted => 3,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => FileProcessingStatus::Added,
            2 => FileProcessingStatus::Modified,
            3 => FileProcessingStatus::Deleted,
            _ => FileProcessingStatus::Clean,
        }
    }

    pub fn is_changed(self) -> bool {
        !matches!(self, FileProcessingStatus::Clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_entry_extension_and_language() {
        let file = FileEntry::new("abc123", "src/server/main.go", "text/x-go", 42);
        assert_eq!(file.extension(), "go");
        assert_eq!(file.language(), Language::Go);
        assert_eq!(file.module_stem(), "main");
    }

    #[test]
    fn test_commit_root_detection() {
        let root = Commit::new("aaa", 1, "", "alice", Utc::now(), "init");
        let child = Commit::new("bbb", 1, "aaa", "bob", Utc::now(), "more");
        assert!(root.is_root());
        assert!(!child.is_root());
    }

    #[test]
    fn test_file_processing_status_round_trip() {
        for status in [
            FileProcessingStatus::Clean,
            FileProcessingStatus::Added,
            FileProcessingStatus::Modified,
            FileProcessingStatus::Deleted,
        ] {
            assert_eq!(FileProcessingStatus::from_i64(status.as_i64()), status);
        }
    }
}
