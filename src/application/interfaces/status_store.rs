use async_trait::async_trait;

use crate::domain::{DomainError, StatusNode, TrackableType};

/// Persistence for progress-tree nodes.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Insert or update one node.
    async fn save(&self, node: &StatusNode) -> Result<(), DomainError>;

    /// All nodes for an entity ordered by created_at; parent pointers are
    /// id strings resolved by the caller in memory.
    async fn load_with_hierarchy(
        &self,
        trackable_type: TrackableType,
        trackable_id: i64,
    ) -> Result<Vec<StatusNode>, DomainError>;

    /// Mark every non-terminal node failed with the given error. Used on
    /// worker startup to flush nodes orphaned by a dead process. Returns the
    /// number of swept nodes.
    async fn sweep_non_terminal(&self, error: &str) -> Result<u64, DomainError>;

    async fn delete_for_trackable(
        &self,
        trackable_type: TrackableType,
        trackable_id: i64,
    ) -> Result<(), DomainError>;
}
