use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Branch, Commit, Enrichment, FileEntry, Repository, SearchHit, Snippet, StatusNode, Tag,
};

#[derive(Debug, Deserialize)]
pub struct CreateRepositoryRequest {
    pub remote_uri: String,
}

#[derive(Debug, Serialize)]
pub struct RepositoryDto {
    pub id: i64,
    pub sanitized_remote_uri: String,
    pub remote_uri: String,
    pub tracking_branch: String,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub num_commits: i64,
    pub num_branches: i64,
    pub num_tags: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&Repository> for RepositoryDto {
    fn from(repository: &Repository) -> Self {
        Self {
            id: repository.id(),
            sanitized_remote_uri: repository.sanitized_remote_uri().to_string(),
            remote_uri: repository.remote_uri().to_string(),
            tracking_branch: repository.tracking_branch().to_string(),
            last_scanned_at: repository.last_scanned_at(),
            num_commits: repository.num_commits(),
            num_branches: repository.num_branches(),
            num_tags: repository.num_tags(),
            created_at: repository.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BranchDto {
    pub name: String,
    pub head_commit_sha: String,
}

impl From<&Branch> for BranchDto {
    fn from(branch: &Branch) -> Self {
        Self {
            name: branch.name().to_string(),
            head_commit_sha: branch.head_commit_sha().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TagDto {
    pub name: String,
    pub target_commit_sha: String,
    pub is_version_tag: bool,
}

impl From<&Tag> for TagDto {
    fn from(tag: &Tag) -> Self {
        Self {
            name: tag.name().to_string(),
            target_commit_sha: tag.target_commit_sha().to_string(),
            is_version_tag: tag.is_version_tag(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommitDto {
    pub commit_sha: String,
    pub parent_sha: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub message: String,
}

impl From<&Commit> for CommitDto {
    fn from(commit: &Commit) -> Self {
        Self {
            commit_sha: commit.commit_sha().to_string(),
            parent_sha: commit.parent_sha().to_string(),
            author: commit.author().to_string(),
            date: commit.date(),
            message: commit.message().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RepositoryDetailDto {
    #[serde(flatten)]
    pub repository: RepositoryDto,
    pub branches: Vec<BranchDto>,
    pub tags: Vec<TagDto>,
    pub recent_commits: Vec<CommitDto>,
}

#[derive(Debug, Serialize)]
pub struct FileDto {
    pub blob_sha: String,
    pub path: String,
    pub mime_type: String,
    pub size: i64,
    pub extension: String,
}

impl From<&FileEntry> for FileDto {
    fn from(file: &FileEntry) -> Self {
        Self {
            blob_sha: file.blob_sha().to_string(),
            path: file.path().to_string(),
            mime_type: file.mime_type().to_string(),
            size: file.size(),
            extension: file.extension().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnrichmentDto {
    pub kind: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Enrichment> for EnrichmentDto {
    fn from(enrichment: &Enrichment) -> Self {
        Self {
            kind: enrichment.kind().as_str().to_string(),
            content: enrichment.content().to_string(),
            created_at: enrichment.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SnippetDto {
    pub id: String,
    pub language: String,
    pub original_text: String,
    pub qualified_names: Vec<String>,
    pub derives_from: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub enrichments: Vec<EnrichmentDto>,
}

impl From<&Snippet> for SnippetDto {
    fn from(snippet: &Snippet) -> Self {
        Self {
            id: snippet.id().to_string(),
            language: snippet.language().as_str().to_string(),
            original_text: snippet.original_text().to_string(),
            qualified_names: snippet.qualified_names().to_vec(),
            derives_from: snippet.derives_from().to_vec(),
            created_at: snippet.created_at(),
            enrichments: snippet.enrichments().iter().map(EnrichmentDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusNodeDto {
    pub id: String,
    pub operation: String,
    pub state: String,
    pub parent: Option<String>,
    pub total: i64,
    pub current: i64,
    pub percent: f64,
    pub message: String,
    pub error: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&StatusNode> for StatusNodeDto {
    fn from(node: &StatusNode) -> Self {
        Self {
            id: node.id().to_string(),
            operation: node.operation().as_str().to_string(),
            state: node.state().as_str().to_string(),
            parent: node.parent().map(|p| p.to_string()),
            total: node.total(),
            current: node.current(),
            percent: node.percent(),
            message: node.message().to_string(),
            error: node.error().to_string(),
            created_at: node.created_at(),
            updated_at: node.updated_at(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchFiltersDto {
    pub language: Option<String>,
    pub author: Option<String>,
    pub created_after: Option<String>,
    pub created_before: Option<String>,
    pub source_repo: Option<String>,
    pub file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequestDto {
    pub keywords: Option<Vec<String>>,
    pub text: Option<String>,
    pub code: Option<String>,
    pub limit: Option<usize>,
    pub filters: Option<SearchFiltersDto>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponseDto {
    pub results: Vec<SearchHit>,
}
