use async_trait::async_trait;

use crate::domain::{DomainError, Task, TaskOperation};

/// Durable, priority-ordered, deduplicated work queue.
///
/// Invariants: at most one task per dedup key is queued at a time; `take`
/// removes the returned task, so execution is at-most-once per dequeue.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Atomic upsert on the dedup key. When an identical-key task already
    /// exists the new one is dropped (the existing task keeps its original
    /// priority and position). Returns whether the task was inserted.
    async fn enqueue(&self, task: &Task) -> Result<bool, DomainError>;

    /// Atomically remove and return the highest-priority task, ties broken
    /// by oldest `created_at`. `None` when the queue is empty.
    async fn take(&self) -> Result<Option<Task>, DomainError>;

    async fn get(&self, dedup_key: &str) -> Result<Option<Task>, DomainError>;

    /// Queued tasks sorted by (priority desc, created_at asc), optionally
    /// restricted to one operation.
    async fn list(&self, operation: Option<TaskOperation>) -> Result<Vec<Task>, DomainError>;
}
