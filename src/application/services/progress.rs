use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::application::StatusStore;
use crate::domain::{DomainError, StatusNode, TaskOperation, TrackableType};

/// Factory for progress-tree roots. Cheap to clone; every service that
/// reports progress holds one.
#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn StatusStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    /// Create a root tracker node in state `pending`, immediately moved to
    /// `started`.
    pub async fn create_child(
        &self,
        operation: TaskOperation,
        trackable_type: Option<TrackableType>,
        trackable_id: Option<i64>,
    ) -> Result<Tracker, DomainError> {
        Tracker::create(
            Arc::clone(&self.store),
            operation,
            None,
            trackable_type,
            trackable_id,
        )
        .await
    }

    pub fn store(&self) -> Arc<dyn StatusStore> {
        Arc::clone(&self.store)
    }
}

struct TrackerInner {
    store: Arc<dyn StatusStore>,
    node: tokio::sync::Mutex<StatusNode>,
    skipped: AtomicBool,
    trackable: (Option<TrackableType>, Option<i64>),
}

/// One node of the progress tree with scoped-acquisition semantics: drive
/// the body through [`Tracker::scope`] and the node is guaranteed a terminal
/// state on every exit path — `completed` on success, `failed` on error,
/// `skipped` when the body called [`Tracker::skip`].
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

impl Tracker {
    async fn create(
        store: Arc<dyn StatusStore>,
        operation: TaskOperation,
        parent: Option<String>,
        trackable_type: Option<TrackableType>,
        trackable_id: Option<i64>,
    ) -> Result<Self, DomainError> {
        let mut node = StatusNode::new(operation, parent, trackable_type, trackable_id);
        store.save(&node).await?;
        node.start();
        store.save(&node).await?;
        debug!(operation = %operation, id = %node.id(), "tracker started");
        Ok(Self {
            inner: Arc::new(TrackerInner {
                store,
                node: tokio::sync::Mutex::new(node),
                skipped: AtomicBool::new(false),
                trackable: (trackable_type, trackable_id),
            }),
        })
    }

    pub async fn id(&self) -> String {
        self.inner.node.lock().await.id().to_string()
    }

    /// Create a sub-operation node under this one. Children inherit the
    /// trackable so `load_with_hierarchy` finds the whole tree.
    pub async fn create_child(&self, operation: TaskOperation) -> Result<Tracker, DomainError> {
        let parent_id = self.id().await;
        let (trackable_type, trackable_id) = self.inner.trackable;
        Tracker::create(
            Arc::clone(&self.inner.store),
            operation,
            Some(parent_id),
            trackable_type,
            trackable_id,
        )
        .await
    }

    pub async fn set_total(&self, total: i64) -> Result<(), DomainError> {
        let mut node = self.inner.node.lock().await;
        node.set_total(total);
        self.inner.store.save(&node).await
    }

    pub async fn set_current(&self, current: i64, message: &str) -> Result<(), DomainError> {
        let mut node = self.inner.node.lock().await;
        node.set_current(current, Some(message));
        self.inner.store.save(&node).await
    }

    /// Transition to `skipped`. The body should return immediately after;
    /// [`Tracker::scope`] will not overwrite the terminal state.
    pub async fn skip(&self, reason: &str) -> Result<(), DomainError> {
        self.inner.skipped.store(true, Ordering::SeqCst);
        let mut node = self.inner.node.lock().await;
        node.skip(reason);
        self.inner.store.save(&node).await
    }

    pub fn is_skipped(&self) -> bool {
        self.inner.skipped.load(Ordering::SeqCst)
    }

    async fn complete(&self) -> Result<(), DomainError> {
        let mut node = self.inner.node.lock().await;
        node.complete();
        self.inner.store.save(&node).await
    }

    async fn fail(&self, error: &str) -> Result<(), DomainError> {
        let mut node = self.inner.node.lock().await;
        node.fail(error);
        self.inner.store.save(&node).await
    }

    /// Run a phase body to a guaranteed terminal state. Errors are recorded
    /// on the node and re-raised so the queue worker sees them.
    pub async fn scope<T>(
        &self,
        body: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        match body.await {
            Ok(value) => {
                if !self.is_skipped() {
                    self.complete().await?;
                }
                Ok(value)
            }
            Err(err) => {
                // Best effort: the original error matters more than a
                // failure to record it.
                if self.fail(&err.to_string()).await.is_err() {
                    debug!("failed to record tracker failure");
                }
                Err(err)
            }
        }
    }
}

/// Resolve parent pointers in memory and return the nodes in pre-order
/// (roots first, each followed by its children, siblings by created_at).
pub fn order_hierarchy(nodes: Vec<StatusNode>) -> Vec<StatusNode> {
    let mut by_parent: std::collections::HashMap<Option<String>, Vec<StatusNode>> =
        std::collections::HashMap::new();
    let known: std::collections::HashSet<String> =
        nodes.iter().map(|n| n.id().to_string()).collect();

    for node in nodes {
        // A parent outside the loaded set makes the node a root.
        let key = node
            .parent()
            .filter(|p| known.contains(*p))
            .map(|p| p.to_string());
        by_parent.entry(key).or_default().push(node);
    }
    for children in by_parent.values_mut() {
        children.sort_by_key(|n| n.created_at());
    }

    let mut ordered = Vec::new();
    let mut stack: Vec<StatusNode> = by_parent.remove(&None).unwrap_or_default();
    stack.reverse();
    while let Some(node) = stack.pop() {
        let id = node.id().to_string();
        ordered.push(node);
        if let Some(mut children) = by_parent.remove(&Some(id)) {
            children.reverse();
            stack.extend(children);
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemoryStatusStore {
        nodes: Mutex<HashMap<String, StatusNode>>,
    }

    #[async_trait]
    impl StatusStore for MemoryStatusStore {
        async fn save(&self, node: &StatusNode) -> Result<(), DomainError> {
            self.nodes
                .lock()
                .await
                .insert(node.id().to_string(), node.clone());
            Ok(())
        }

        async fn load_with_hierarchy(
            &self,
            _trackable_type: TrackableType,
            trackable_id: i64,
        ) -> Result<Vec<StatusNode>, DomainError> {
            let mut nodes: Vec<StatusNode> = self
                .nodes
                .lock()
                .await
                .values()
                .filter(|n| n.trackable_id() == Some(trackable_id))
                .cloned()
                .collect();
            nodes.sort_by_key(|n| n.created_at());
            Ok(nodes)
        }

        async fn sweep_non_terminal(&self, error: &str) -> Result<u64, DomainError> {
            let mut nodes = self.nodes.lock().await;
            let mut swept = 0;
            for node in nodes.values_mut() {
                if !node.state().is_terminal() {
                    node.fail(error);
                    swept += 1;
                }
            }
            Ok(swept)
        }

        async fn delete_for_trackable(
            &self,
            _trackable_type: TrackableType,
            trackable_id: i64,
        ) -> Result<(), DomainError> {
            self.nodes
                .lock()
                .await
                .retain(|_, n| n.trackable_id() != Some(trackable_id));
            Ok(())
        }
    }

    use crate::domain::TaskState;

    fn tracker_factory() -> (ProgressTracker, Arc<MemoryStatusStore>) {
        let store = Arc::new(MemoryStatusStore::default());
        (ProgressTracker::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_scope_completes_on_success() {
        let (progress, store) = tracker_factory();
        let tracker = progress
            .create_child(TaskOperation::ExtractSnippets, Some(TrackableType::Index), Some(1))
            .await
            .unwrap();

        tracker
            .scope(async {
                tracker.set_total(2).await?;
                tracker.set_current(2, "done").await?;
                Ok(())
            })
            .await
            .unwrap();

        let nodes = store
            .load_with_hierarchy(TrackableType::Index, 1)
            .await
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].state(), TaskState::Completed);
    }

    #[tokio::test]
    async fn test_scope_records_failure_and_reraises() {
        let (progress, store) = tracker_factory();
        let tracker = progress
            .create_child(TaskOperation::CreateBm25Index, Some(TrackableType::Index), Some(2))
            .await
            .unwrap();

        let result: Result<(), DomainError> = tracker
            .scope(async { Err(DomainError::internal("boom")) })
            .await;
        assert!(result.is_err());

        let nodes = store
            .load_with_hierarchy(TrackableType::Index, 2)
            .await
            .unwrap();
        assert_eq!(nodes[0].state(), TaskState::Failed);
        assert!(nodes[0].error().contains("boom"));
    }

    #[tokio::test]
    async fn test_skip_is_not_overwritten_by_completion() {
        let (progress, store) = tracker_factory();
        let tracker = progress
            .create_child(TaskOperation::EnrichSnippets, Some(TrackableType::Index), Some(3))
            .await
            .unwrap();

        tracker
            .scope(async {
                tracker.skip("nothing to enrich").await?;
                Ok(())
            })
            .await
            .unwrap();

        let nodes = store
            .load_with_hierarchy(TrackableType::Index, 3)
            .await
            .unwrap();
        assert_eq!(nodes[0].state(), TaskState::Skipped);
        assert_eq!(nodes[0].message(), "nothing to enrich");
    }

    #[tokio::test]
    async fn test_children_inherit_trackable_and_parent() {
        let (progress, store) = tracker_factory();
        let root = progress
            .create_child(TaskOperation::EnrichSnippets, Some(TrackableType::Index), Some(4))
            .await
            .unwrap();
        let child = root
            .create_child(TaskOperation::CreateTextEmbeddings)
            .await
            .unwrap();
        child.scope(async { Ok(()) }).await.unwrap();
        root.scope(async { Ok(()) }).await.unwrap();

        let nodes = store
            .load_with_hierarchy(TrackableType::Index, 4)
            .await
            .unwrap();
        assert_eq!(nodes.len(), 2);
        let ordered = order_hierarchy(nodes);
        assert_eq!(ordered[0].operation(), TaskOperation::EnrichSnippets);
        assert_eq!(ordered[1].operation(), TaskOperation::CreateTextEmbeddings);
        assert_eq!(ordered[1].parent(), Some(ordered[0].id()));
    }

    #[tokio::test]
    async fn test_sweep_marks_non_terminal_failed() {
        let (progress, store) = tracker_factory();
        let _dangling = progress
            .create_child(TaskOperation::RefreshWorkingCopy, Some(TrackableType::Index), Some(5))
            .await
            .unwrap();

        let swept = store.sweep_non_terminal("worker restart").await.unwrap();
        assert_eq!(swept, 1);

        let nodes = store
            .load_with_hierarchy(TrackableType::Index, 5)
            .await
            .unwrap();
        assert_eq!(nodes[0].state(), TaskState::Failed);
        assert_eq!(nodes[0].error(), "worker restart");
    }
}
