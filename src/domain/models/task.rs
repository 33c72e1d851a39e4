use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Operations the system performs. The first five form the per-repository
/// indexing pipeline, in order; the `*ForCommit` variants are one-shot
/// commit-scoped enrichments; the rest are sub-operations that only appear
/// as progress-tree nodes, never as queued tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOperation {
    RefreshWorkingCopy,
    ExtractSnippets,
    CreateBm25Index,
    CreateCodeEmbeddings,
    EnrichSnippets,
    CreateCommitDescriptionForCommit,
    CreateArchitectureEnrichmentForCommit,
    CreatePublicApiDocsForCommit,
    CreateDatabaseSchemaForCommit,
    CreateCookbookForCommit,
    // Progress-only sub-operations.
    CreateIndex,
    DeleteOldSnippets,
    CreateTextEmbeddings,
    UpdateIndexTimestamp,
    ClearFileProcessingStatuses,
}

impl TaskOperation {
    /// The five pipeline phases in execution order.
    pub const PIPELINE: [TaskOperation; 5] = [
        TaskOperation::RefreshWorkingCopy,
        TaskOperation::ExtractSnippets,
        TaskOperation::CreateBm25Index,
        TaskOperation::CreateCodeEmbeddings,
        TaskOperation::EnrichSnippets,
    ];

    /// The commit-scoped enrichment operations.
    pub const COMMIT_ENRICHMENTS: [TaskOperation; 5] = [
        TaskOperation::CreateCommitDescriptionForCommit,
        TaskOperation::CreateArchitectureEnrichmentForCommit,
        TaskOperation::CreatePublicApiDocsForCommit,
        TaskOperation::CreateDatabaseSchemaForCommit,
        TaskOperation::CreateCookbookForCommit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOperation::RefreshWorkingCopy => "refresh_working_copy",
            TaskOperation::ExtractSnippets => "extract_snippets",
            TaskOperation::CreateBm25Index => "create_bm25_index",
            TaskOperation::CreateCodeEmbeddings => "create_code_embeddings",
            TaskOperation::EnrichSnippets => "enrich_snippets",
            TaskOperation::CreateCommitDescriptionForCommit => {
                "create_commit_description_for_commit"
            }
            TaskOperation::CreateArchitectureEnrichmentForCommit => {
                "create_architecture_enrichment_for_commit"
            }
            TaskOperation::CreatePublicApiDocsForCommit => "create_public_api_docs_for_commit",
            TaskOperation::CreateDatabaseSchemaForCommit => "create_database_schema_for_commit",
            TaskOperation::CreateCookbookForCommit => "create_cookbook_for_commit",
            TaskOperation::CreateIndex => "create_index",
            TaskOperation::DeleteOldSnippets => "delete_old_snippets",
            TaskOperation::CreateTextEmbeddings => "create_text_embeddings",
            TaskOperation::UpdateIndexTimestamp => "update_index_timestamp",
            TaskOperation::ClearFileProcessingStatuses => "clear_file_processing_statuses",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "refresh_working_copy" => Some(TaskOperation::RefreshWorkingCopy),
            "extract_snippets" => Some(TaskOperation::ExtractSnippets),
            "create_bm25_index" => Some(TaskOperation::CreateBm25Index),
            "create_code_embeddings" => Some(TaskOperation::CreateCodeEmbeddings),
            "enrich_snippets" => Some(TaskOperation::EnrichSnippets),
            "create_commit_description_for_commit" => {
                Some(TaskOperation::CreateCommitDescriptionForCommit)
            }
            "create_architecture_enrichment_for_commit" => {
                Some(TaskOperation::CreateArchitectureEnrichmentForCommit)
            }
            "create_public_api_docs_for_commit" => {
                Some(TaskOperation::CreatePublicApiDocsForCommit)
            }
            "create_database_schema_for_commit" => {
                Some(TaskOperation::CreateDatabaseSchemaForCommit)
            }
            "create_cookbook_for_commit" => Some(TaskOperation::CreateCookbookForCommit),
            "create_index" => Some(TaskOperation::CreateIndex),
            "delete_old_snippets" => Some(TaskOperation::DeleteOldSnippets),
            "create_text_embeddings" => Some(TaskOperation::CreateTextEmbeddings),
            "update_index_timestamp" => Some(TaskOperation::UpdateIndexTimestamp),
            "clear_file_processing_statuses" => Some(TaskOperation::ClearFileProcessingStatuses),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Priority classes. Higher dequeues sooner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePriority {
    UserInitiated,
    Normal,
    Background,
}

impl QueuePriority {
    pub fn value(self) -> i64 {
        match self {
            QueuePriority::UserInitiated => 100,
            QueuePriority::Normal => 50,
            QueuePriority::Background => 10,
        }
    }
}

/// A queued unit of work. Identity is the dedup key: SHA-1 over the
/// operation name and the canonical (key-sorted) JSON payload, so enqueuing
/// the same work twice collapses to one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    dedup_key: String,
    operation: TaskOperation,
    payload: serde_json::Value,
    priority: i64,
    created_at: DateTime<Utc>,
}

impl Task {
    pub fn create(operation: TaskOperation, priority: i64, payload: serde_json::Value) -> Self {
        let dedup_key = Self::create_id(operation, &payload);
        Self {
            dedup_key,
            operation,
            payload,
            priority,
            created_at: Utc::now(),
        }
    }

    pub fn reconstitute(
        dedup_key: String,
        operation: TaskOperation,
        payload: serde_json::Value,
        priority: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            dedup_key,
            operation,
            payload,
            priority,
            created_at,
        }
    }

    /// Derive the dedup key for an (operation, payload) pair.
    pub fn create_id(operation: TaskOperation, payload: &serde_json::Value) -> String {
        let mut hasher = Sha1::new();
        hasher.update(operation.as_str().as_bytes());
        hasher.update(canonical_json(payload).as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn dedup_key(&self) -> &str {
        &self.dedup_key
    }

    pub fn operation(&self) -> TaskOperation {
        self.operation
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn index_id(&self) -> Option<i64> {
        self.payload.get("index_id").and_then(|v| v.as_i64())
    }

    pub fn commit_sha(&self) -> Option<&str> {
        self.payload.get("commit_sha").and_then(|v| v.as_str())
    }
}

/// JSON with object keys sorted recursively, so payloads that differ only in
/// key order produce the same dedup key.
fn canonical_json(value: &serde_json::Value) -> String {
    fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let sorted: BTreeMap<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect();
                serde_json::to_value(sorted).unwrap_or_default()
            }
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(canonicalize).collect())
            }
            other => other.clone(),
        }
    }
    canonicalize(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_same_payload_same_dedup_key() {
        let a = Task::create(
            TaskOperation::ExtractSnippets,
            QueuePriority::UserInitiated.value(),
            json!({"index_id": 1}),
        );
        let b = Task::create(
            TaskOperation::ExtractSnippets,
            QueuePriority::Background.value(),
            json!({"index_id": 1}),
        );
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a = Task::create_id(
            TaskOperation::CreateCookbookForCommit,
            &json!({"index_id": 1, "commit_sha": "abc"}),
        );
        let b = Task::create_id(
            TaskOperation::CreateCookbookForCommit,
            &json!({"commit_sha": "abc", "index_id": 1}),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_operation_different_key() {
        let a = Task::create_id(TaskOperation::ExtractSnippets, &json!({"index_id": 1}));
        let b = Task::create_id(TaskOperation::CreateBm25Index, &json!({"index_id": 1}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_payload_accessors() {
        let task = Task::create(
            TaskOperation::CreateCookbookForCommit,
            QueuePriority::Normal.value(),
            json!({"index_id": 7, "commit_sha": "abc123"}),
        );
        assert_eq!(task.index_id(), Some(7));
        assert_eq!(task.commit_sha(), Some("abc123"));
    }

    #[test]
    fn test_priority_class_ordering() {
        assert!(QueuePriority::UserInitiated.value() > QueuePriority::Normal.value());
        assert!(QueuePriority::Normal.value() > QueuePriority::Background.value());
    }
}
