//! Shared test environment: in-memory DuckDB, mock embedding/chat services,
//! and a scriptable in-memory git adapter.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Mutex;

use repolens::{
    open_in_memory, CommitEnrichmentService, DomainError, DuckdbKeywordIndex,
    DuckdbRepositoryStore, DuckdbSnippetStore, DuckdbStatusStore, DuckdbTaskQueue,
    DuckdbVectorIndex, EnrichmentPipeline, FilesystemStructureScanner, GitAdapter, GitBranchInfo,
    GitCommitInfo, GitFileInfo, GitTagInfo, IndexingOrchestrator, MockChatClient,
    MockEmbeddingService, SearchService, TaskOperation, TreeSitterSlicer,
};

/// Scriptable git backend: tests describe commits, trees, and blob contents
/// directly and mutate them between scans.
#[derive(Default, Clone)]
pub struct StubRepoState {
    pub branch: String,
    /// Newest first, like `git log`.
    pub commits: Vec<GitCommitInfo>,
    pub files_by_commit: HashMap<String, Vec<GitFileInfo>>,
    pub blobs: HashMap<String, String>,
    pub tags: Vec<GitTagInfo>,
}

pub struct StubGitAdapter {
    pub state: Mutex<StubRepoState>,
}

impl StubGitAdapter {
    pub fn new(state: StubRepoState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn empty() -> Self {
        Self::new(StubRepoState {
            branch: "main".to_string(),
            ..Default::default()
        })
    }

    pub async fn set_state(&self, state: StubRepoState) {
        *self.state.lock().await = state;
    }
}

#[async_trait]
impl GitAdapter for StubGitAdapter {
    async fn clone_repository(&self, _remote_uri: &str, _dest: &Path) -> Result<(), DomainError> {
        Ok(())
    }

    async fn pull(&self, _repo_path: &Path) -> Result<(), DomainError> {
        Ok(())
    }

    async fn checkout_commit(
        &self,
        _repo_path: &Path,
        _commit_sha: &str,
    ) -> Result<(), DomainError> {
        Ok(())
    }

    async fn get_default_branch(&self, _repo_path: &Path) -> Result<String, DomainError> {
        Ok(self.state.lock().await.branch.clone())
    }

    async fn get_commits(
        &self,
        _repo_path: &Path,
        _branch: &str,
    ) -> Result<Vec<GitCommitInfo>, DomainError> {
        Ok(self.state.lock().await.commits.clone())
    }

    async fn get_commit_files(
        &self,
        _repo_path: &Path,
        commit_sha: &str,
    ) -> Result<Vec<GitFileInfo>, DomainError> {
        Ok(self
            .state
            .lock()
            .await
            .files_by_commit
            .get(commit_sha)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_file_content(
        &self,
        _repo_path: &Path,
        blob_sha: &str,
    ) -> Result<String, DomainError> {
        self.state
            .lock()
            .await
            .blobs
            .get(blob_sha)
            .cloned()
            .ok_or_else(|| DomainError::git(format!("unknown blob {blob_sha}")))
    }

    async fn get_all_branches(
        &self,
        _repo_path: &Path,
    ) -> Result<Vec<GitBranchInfo>, DomainError> {
        let state = self.state.lock().await;
        match state.commits.first() {
            Some(head) => Ok(vec![GitBranchInfo {
                name: state.branch.clone(),
                head_commit_sha: head.commit_sha.clone(),
            }]),
            None => Ok(Vec::new()),
        }
    }

    async fn get_all_tags(&self, _repo_path: &Path) -> Result<Vec<GitTagInfo>, DomainError> {
        Ok(self.state.lock().await.tags.clone())
    }

    async fn get_commit_diff(
        &self,
        _repo_path: &Path,
        commit_sha: &str,
    ) -> Result<String, DomainError> {
        Ok(format!("diff --git stub for {commit_sha}\n+added line\n"))
    }
}

pub struct TestEnv {
    pub repo_store: Arc<DuckdbRepositoryStore>,
    pub snippet_store: Arc<DuckdbSnippetStore>,
    pub status_store: Arc<DuckdbStatusStore>,
    pub queue: Arc<DuckdbTaskQueue>,
    pub keyword_index: Arc<DuckdbKeywordIndex>,
    pub vector_index: Arc<DuckdbVectorIndex>,
    pub git: Arc<StubGitAdapter>,
    pub orchestrator: Arc<IndexingOrchestrator>,
    pub commit_enrichments: Arc<CommitEnrichmentService>,
    pub search: SearchService,
    pub data_dir: tempfile::TempDir,
}

pub fn setup_env(git: StubGitAdapter) -> TestEnv {
    let conn = open_in_memory().expect("in-memory database");
    let data_dir = tempfile::tempdir().expect("temp dir");

    let repo_store = Arc::new(DuckdbRepositoryStore::with_connection(conn.clone()));
    let snippet_store = Arc::new(DuckdbSnippetStore::with_connection(conn.clone()));
    let status_store = Arc::new(DuckdbStatusStore::with_connection(conn.clone()));
    let queue = Arc::new(DuckdbTaskQueue::with_connection(conn.clone()));
    let keyword_index = Arc::new(DuckdbKeywordIndex::with_connection(conn.clone()));
    let vector_index = Arc::new(DuckdbVectorIndex::with_connection(conn));

    let git = Arc::new(git);
    let slicer = Arc::new(TreeSitterSlicer::new());
    let scanner = Arc::new(FilesystemStructureScanner::new());
    let embeddings = Arc::new(MockEmbeddingService::new());
    let enricher = Arc::new(EnrichmentPipeline::with_defaults(Arc::new(MockChatClient::new())));

    let orchestrator = Arc::new(IndexingOrchestrator::new(
        repo_store.clone(),
        snippet_store.clone(),
        status_store.clone(),
        queue.clone(),
        git.clone(),
        slicer.clone(),
        keyword_index.clone(),
        vector_index.clone(),
        embeddings.clone(),
        embeddings.clone(),
        enricher.clone(),
        data_dir.path().to_path_buf(),
    ));
    let commit_enrichments = Arc::new(CommitEnrichmentService::new(
        repo_store.clone(),
        git.clone(),
        slicer,
        scanner,
        enricher,
        orchestrator.progress().clone(),
    ));
    let search = SearchService::new(
        snippet_store.clone(),
        keyword_index.clone(),
        vector_index.clone(),
        embeddings.clone(),
        embeddings,
    );

    TestEnv {
        repo_store,
        snippet_store,
        status_store,
        queue,
        keyword_index,
        vector_index,
        git,
        orchestrator,
        commit_enrichments,
        search,
        data_dir,
    }
}

impl TestEnv {
    /// Drain the queue the way the worker does, dispatching by operation.
    pub async fn drain_queue(&self) {
        use repolens::TaskQueue;
        while let Some(task) = self.queue.take().await.expect("queue take") {
            let result = match task.operation() {
                TaskOperation::RefreshWorkingCopy
                | TaskOperation::ExtractSnippets
                | TaskOperation::CreateBm25Index
                | TaskOperation::CreateCodeEmbeddings
                | TaskOperation::EnrichSnippets => self.orchestrator.run_task(&task).await,
                _ => self.commit_enrichments.run_task(&task).await,
            };
            if let Err(err) = result {
                panic!("task {} failed: {err}", task.operation());
            }
        }
    }
}

/// A one-commit Go repository containing `func main`.
pub fn go_repo() -> StubRepoState {
    let commit = GitCommitInfo {
        commit_sha: "c1".to_string(),
        parent_sha: String::new(),
        author: "Alice <alice@example.com>".to_string(),
        date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        message: "initial".to_string(),
    };
    let files = vec![
        GitFileInfo {
            blob_sha: "blob-main".to_string(),
            path: "cmd/main.go".to_string(),
            size: 120,
        },
        GitFileInfo {
            blob_sha: "blob-util".to_string(),
            path: "pkg/util.go".to_string(),
            size: 80,
        },
    ];
    let mut blobs = HashMap::new();
    blobs.insert(
        "blob-main".to_string(),
        "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(greet())\n}\n".to_string(),
    );
    blobs.insert(
        "blob-util".to_string(),
        "package pkg\n\nfunc Greet() string {\n\treturn \"hello\"\n}\n".to_string(),
    );

    StubRepoState {
        branch: "main".to_string(),
        files_by_commit: HashMap::from([("c1".to_string(), files)]),
        commits: vec![commit],
        blobs,
        tags: vec![GitTagInfo {
            name: "v1.0.0".to_string(),
            target_commit_sha: "c1".to_string(),
        }],
    }
}
