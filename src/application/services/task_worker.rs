use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::application::{
    CommitEnrichmentService, IndexingOrchestrator, StatusStore, TaskQueue,
};
use crate::domain::{DomainError, Task, TaskOperation};

/// Idle sleep between queue polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The single queue consumer. Dequeues the highest-priority task, runs it,
/// logs failures, and moves on — phase idempotence plus the periodic sync
/// make dropped work self-healing.
pub struct TaskWorker {
    queue: Arc<dyn TaskQueue>,
    orchestrator: Arc<IndexingOrchestrator>,
    commit_enrichments: Arc<CommitEnrichmentService>,
    status_store: Arc<dyn StatusStore>,
    shutdown: watch::Receiver<bool>,
}

impl TaskWorker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        orchestrator: Arc<IndexingOrchestrator>,
        commit_enrichments: Arc<CommitEnrichmentService>,
        status_store: Arc<dyn StatusStore>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            commit_enrichments,
            status_store,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        // Tracker nodes left non-terminal by a dead process are stale.
        match self.status_store.sweep_non_terminal("worker restart").await {
            Ok(0) => {}
            Ok(swept) => warn!(swept, "failed stale progress nodes from previous run"),
            Err(err) => error!("failed to sweep stale progress nodes: {err}"),
        }

        info!("task worker started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            match self.queue.take().await {
                Ok(Some(task)) => {
                    info!(
                        operation = %task.operation(),
                        priority = task.priority(),
                        "running task"
                    );
                    if let Err(err) = self.dispatch(&task).await {
                        // The tracker already recorded the failure; the next
                        // sync tick re-enqueues the pipeline.
                        error!(operation = %task.operation(), "task failed: {err}");
                    }
                }
                Ok(None) => self.idle().await,
                Err(err) => {
                    // DB unavailable. Sleep and retry; a temporary outage
                    // recovers naturally.
                    warn!("queue unavailable: {err}");
                    self.idle().await;
                }
            }
        }
        info!("task worker stopped");
    }

    async fn idle(&mut self) {
        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = self.shutdown.changed() => {}
        }
    }

    async fn dispatch(&self, task: &Task) -> Result<(), DomainError> {
        match task.operation() {
            TaskOperation::RefreshWorkingCopy
            | TaskOperation::ExtractSnippets
            | TaskOperation::CreateBm25Index
            | TaskOperation::CreateCodeEmbeddings
            | TaskOperation::EnrichSnippets => self.orchestrator.run_task(task).await,
            TaskOperation::CreateCommitDescriptionForCommit
            | TaskOperation::CreateArchitectureEnrichmentForCommit
            | TaskOperation::CreatePublicApiDocsForCommit
            | TaskOperation::CreateDatabaseSchemaForCommit
            | TaskOperation::CreateCookbookForCommit => {
                self.commit_enrichments.run_task(task).await
            }
            other => Err(DomainError::invalid_input(format!(
                "Unknown queued operation: {other}"
            ))),
        }
    }
}
