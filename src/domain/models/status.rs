use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TaskOperation;

/// Lifecycle of a progress node:
/// `pending → started → in_progress* → {completed | skipped | failed}`.
/// `skipped` means the operation had nothing to do; `failed` carries an
/// error string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Started,
    InProgress,
    Completed,
    Skipped,
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Started => "started",
            TaskState::InProgress => "in_progress",
            TaskState::Completed => "completed",
            TaskState::Skipped => "skipped",
            TaskState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => TaskState::Pending,
            "started" => TaskState::Started,
            "in_progress" => TaskState::InProgress,
            "completed" => TaskState::Completed,
            "skipped" => TaskState::Skipped,
            _ => TaskState::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Skipped | TaskState::Failed
        )
    }
}

/// What kind of entity a progress node tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackableType {
    Repository,
    Index,
}

impl TrackableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackableType::Repository => "repository",
            TrackableType::Index => "index",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "repository" => Some(TrackableType::Repository),
            "index" => Some(TrackableType::Index),
            _ => None,
        }
    }
}

/// One node of the hierarchical progress tree. Nodes form a forest; parent
/// pointers are stored as nullable id strings and resolved in memory after a
/// bulk load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusNode {
    id: String,
    operation: TaskOperation,
    state: TaskState,
    parent: Option<String>,
    trackable_type: Option<TrackableType>,
    trackable_id: Option<i64>,
    total: i64,
    current: i64,
    message: String,
    error: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StatusNode {
    pub fn new(
        operation: TaskOperation,
        parent: Option<String>,
        trackable_type: Option<TrackableType>,
        trackable_id: Option<i64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            operation,
            state: TaskState::Pending,
            parent,
            trackable_type,
            trackable_id,
            total: 0,
            current: 0,
            message: String::new(),
            error: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        operation: TaskOperation,
        state: TaskState,
        parent: Option<String>,
        trackable_type: Option<TrackableType>,
        trackable_id: Option<i64>,
        total: i64,
        current: i64,
        message: String,
        error: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            operation,
            state,
            parent,
            trackable_type,
            trackable_id,
            total,
            current,
            message,
            error,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn operation(&self) -> TaskOperation {
        self.operation
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn trackable_type(&self) -> Option<TrackableType> {
        self.trackable_type
    }

    pub fn trackable_id(&self) -> Option<i64> {
        self.trackable_id
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn percent(&self) -> f64 {
        if self.total > 0 {
            self.current as f64 / self.total as f64 * 100.0
        } else {
            0.0
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn start(&mut self) {
        self.state = TaskState::Started;
        self.touch();
    }

    pub fn set_total(&mut self, total: i64) {
        self.total = total;
        self.state = TaskState::InProgress;
        self.touch();
    }

    pub fn set_current(&mut self, current: i64, message: Option<&str>) {
        self.current = current;
        if let Some(message) = message {
            self.message = message.to_string();
        }
        self.state = TaskState::InProgress;
        self.touch();
    }

    pub fn complete(&mut self) {
        self.state = TaskState::Completed;
        self.touch();
    }

    pub fn skip(&mut self, reason: &str) {
        self.state = TaskState::Skipped;
        self.message = reason.to_string();
        self.touch();
    }

    pub fn fail(&mut self, error: &str) {
        self.state = TaskState::Failed;
        self.error = error.to_string();
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut node = StatusNode::new(TaskOperation::ExtractSnippets, None, None, Some(1));
        assert_eq!(node.state(), TaskState::Pending);

        node.start();
        assert_eq!(node.state(), TaskState::Started);

        node.set_total(10);
        node.set_current(5, Some("halfway"));
        assert_eq!(node.state(), TaskState::InProgress);
        assert!((node.percent() - 50.0).abs() < f64::EPSILON);

        node.complete();
        assert!(node.state().is_terminal());
    }

    #[test]
    fn test_percent_with_zero_total() {
        let node = StatusNode::new(TaskOperation::ExtractSnippets, None, None, None);
        assert_eq!(node.percent(), 0.0);
    }

    #[test]
    fn test_skip_records_reason() {
        let mut node = StatusNode::new(TaskOperation::CreateBm25Index, None, None, None);
        node.start();
        node.skip("nothing to index");
        assert_eq!(node.state(), TaskState::Skipped);
        assert_eq!(node.message(), "nothing to index");
    }

    #[test]
    fn test_fail_records_error() {
        let mut node = StatusNode::new(TaskOperation::RefreshWorkingCopy, None, None, None);
        node.start();
        node.fail("clone failed");
        assert_eq!(node.state(), TaskState::Failed);
        assert_eq!(node.error(), "clone failed");
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Skipped.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::InProgress.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
    }
}
