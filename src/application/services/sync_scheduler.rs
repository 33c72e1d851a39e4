use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::application::{IndexingOrchestrator, RepositoryStore};
use crate::domain::DomainError;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(1800);

/// Periodically re-enqueues the five-phase pipeline for every known
/// repository at background priority. Because the queue deduplicates and the
/// phases are idempotent, a tick over an already-synced repository is cheap.
pub struct SyncScheduler {
    repo_store: Arc<dyn RepositoryStore>,
    orchestrator: Arc<IndexingOrchestrator>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
    failures: Arc<AtomicU64>,
}

impl SyncScheduler {
    pub fn new(
        repo_store: Arc<dyn RepositoryStore>,
        orchestrator: Arc<IndexingOrchestrator>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            repo_store,
            orchestrator,
            interval,
            shutdown,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Counter handle for observability and tests.
    pub fn failure_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.failures)
    }

    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "sync scheduler started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.changed() => {}
            }
            if *self.shutdown.borrow() {
                break;
            }
            if let Err(err) = self.run_round().await {
                // One failed enqueue aborts the round; count it and keep the
                // loop alive for the next tick.
                self.failures.fetch_add(1, Ordering::SeqCst);
                warn!("sync round failed: {err}");
            }
        }
        info!("sync scheduler stopped");
    }

    /// Enqueue the pipeline for every repository. An enqueue error aborts
    /// the round.
    pub async fn run_round(&self) -> Result<usize, DomainError> {
        let repositories = self.repo_store.list().await?;
        for repository in &repositories {
            self.orchestrator
                .queue_index_tasks(repository.id(), false)
                .await?;
        }
        info!(repositories = repositories.len(), "sync round enqueued");
        Ok(repositories.len())
    }
}
