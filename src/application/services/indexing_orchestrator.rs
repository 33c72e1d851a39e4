use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::application::{
    EmbeddingService, EnrichmentPipeline, GitAdapter, KeywordIndex, ProgressTracker,
    RepositoryStore, SlicerService, SnippetStore, SourceFile, StatusStore, TaskQueue, Tracker,
    VectorIndex,
};
use crate::application::services::prompts::SNIPPET_SUMMARY_SYSTEM_PROMPT;
use crate::domain::{
    clone_dir_key, Branch, Commit, Document, DomainError, EmbeddingKind, EmbeddingRequest,
    Enrichment, EnrichmentKind, EnrichmentRequest, FileEntry, FileProcessingStatus, Language,
    ProcessingPhase, QueuePriority, Repository, Tag, Task, TaskOperation, TrackableType,
};

/// Snippets embedded per provider round trip.
const EMBED_BATCH_SIZE: usize = 16;

/// The per-repository indexing state machine: enqueues the five pipeline
/// phases at descending priority offsets and executes their bodies. Every
/// phase is idempotent, so a crashed run is repaired by the next enqueue.
pub struct IndexingOrchestrator {
    repo_store: Arc<dyn RepositoryStore>,
    snippet_store: Arc<dyn SnippetStore>,
    status_store: Arc<dyn StatusStore>,
    queue: Arc<dyn TaskQueue>,
    git: Arc<dyn GitAdapter>,
    slicer: Arc<dyn SlicerService>,
    keyword_index: Arc<dyn KeywordIndex>,
    vector_index: Arc<dyn VectorIndex>,
    code_embeddings: Arc<dyn EmbeddingService>,
    text_embeddings: Arc<dyn EmbeddingService>,
    enricher: Arc<EnrichmentPipeline>,
    progress: ProgressTracker,
    data_dir: PathBuf,
}

impl IndexingOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo_store: Arc<dyn RepositoryStore>,
        snippet_store: Arc<dyn SnippetStore>,
        status_store: Arc<dyn StatusStore>,
        queue: Arc<dyn TaskQueue>,
        git: Arc<dyn GitAdapter>,
        slicer: Arc<dyn SlicerService>,
        keyword_index: Arc<dyn KeywordIndex>,
        vector_index: Arc<dyn VectorIndex>,
        code_embeddings: Arc<dyn EmbeddingService>,
        text_embeddings: Arc<dyn EmbeddingService>,
        enricher: Arc<EnrichmentPipeline>,
        data_dir: PathBuf,
    ) -> Self {
        let progress = ProgressTracker::new(Arc::clone(&status_store));
        Self {
            repo_store,
            snippet_store,
            status_store,
            queue,
            git,
            slicer,
            keyword_index,
            vector_index,
            code_embeddings,
            text_embeddings,
            enricher,
            progress,
            data_dir,
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Register a remote URI: creates the repository row and enqueues the
    /// full pipeline at user-initiated priority.
    pub async fn register_repository(&self, remote_uri: &str) -> Result<Repository, DomainError> {
        let mut repository = Repository::new(remote_uri, String::new())?;
        if let Some(existing) = self
            .repo_store
            .get_by_uri(repository.sanitized_remote_uri())
            .await?
        {
            return Err(DomainError::already_exists(format!(
                "Repository already registered: {}",
                existing.sanitized_remote_uri()
            )));
        }

        let clone_path = self
            .data_dir
            .join("clones")
            .join(clone_dir_key(repository.sanitized_remote_uri()));
        repository = Repository::new(remote_uri, clone_path.to_string_lossy().to_string())?;

        let id = self.repo_store.save(&repository).await?;
        repository.set_id(id);
        info!(
            repo_id = id,
            uri = repository.sanitized_remote_uri(),
            "registered repository"
        );

        self.queue_index_tasks(id, true).await?;
        Ok(repository)
    }

    /// Queue the five indexing tasks with priority ordering. Descending
    /// offsets within one priority class make the phases execute in declared
    /// order while a whole user-initiated pipeline still outranks any
    /// background one.
    pub async fn queue_index_tasks(
        &self,
        index_id: i64,
        is_user_initiated: bool,
    ) -> Result<(), DomainError> {
        let base = if is_user_initiated {
            QueuePriority::UserInitiated
        } else {
            QueuePriority::Background
        };

        let mut offset = (TaskOperation::PIPELINE.len() * 10) as i64;
        for operation in TaskOperation::PIPELINE {
            let task = Task::create(operation, base.value() + offset, json!({"index_id": index_id}));
            self.queue.enqueue(&task).await?;
            offset -= 10;
        }
        Ok(())
    }

    /// Execute one queued pipeline task.
    pub async fn run_task(&self, task: &Task) -> Result<(), DomainError> {
        let index_id = task
            .index_id()
            .ok_or_else(|| DomainError::invalid_input("Task payload is missing index_id"))?;

        match task.operation() {
            TaskOperation::RefreshWorkingCopy => self.process_refresh(index_id).await,
            TaskOperation::ExtractSnippets => self.process_extract(index_id).await,
            TaskOperation::CreateBm25Index => self.process_bm25(index_id).await,
            TaskOperation::CreateCodeEmbeddings => self.process_code_embeddings(index_id).await,
            TaskOperation::EnrichSnippets => self.process_enrich(index_id).await,
            other => Err(DomainError::invalid_input(format!(
                "Not a pipeline operation: {other}"
            ))),
        }
    }

    async fn get_repository(&self, index_id: i64) -> Result<Repository, DomainError> {
        self.repo_store
            .get(index_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Index not found: {index_id}")))
    }

    /// Head commit of the repository's tracking branch, if scanned.
    async fn head_commit_sha(&self, repository: &Repository) -> Result<Option<String>, DomainError> {
        let branches = self.repo_store.get_branches(repository.id()).await?;
        Ok(branches
            .into_iter()
            .find(|b| b.name() == repository.tracking_branch())
            .map(|b| b.head_commit_sha().to_string()))
    }

    // ── Phase 1: refresh the working copy ────────────────────────────────

    async fn process_refresh(&self, index_id: i64) -> Result<(), DomainError> {
        let mut repository = self.get_repository(index_id).await?;
        let tracker = self
            .progress
            .create_child(
                TaskOperation::RefreshWorkingCopy,
                Some(TrackableType::Index),
                Some(index_id),
            )
            .await?;

        let step = tracker.clone();
        tracker
            .scope(async move {
                let repo_path = PathBuf::from(repository.cloned_path());
                let previous_head = self.head_commit_sha(&repository).await?;

                if repo_path.join(".git").exists() {
                    self.git.pull(&repo_path).await?;
                } else {
                    tokio::fs::create_dir_all(&repo_path).await?;
                    self.git
                        .clone_repository(repository.remote_uri(), &repo_path)
                        .await?;
                }

                let branch = self.git.get_default_branch(&repo_path).await?;
                repository.set_tracking_branch(&branch);

                // An empty repository completes the phase: the clone itself
                // succeeded and there is nothing further to enumerate.
                let commit_infos = self.git.get_commits(&repo_path, &branch).await?;
                if commit_infos.is_empty() {
                    repository.mark_scanned();
                    self.repo_store.save(&repository).await?;
                    info!(index_id, "repository has no commits");
                    return Ok(());
                }
                let head_sha = commit_infos[0].commit_sha.clone();

                let commits: Vec<Commit> = commit_infos
                    .iter()
                    .map(|c| {
                        Commit::new(
                            &c.commit_sha,
                            index_id,
                            &c.parent_sha,
                            &c.author,
                            c.date,
                            &c.message,
                        )
                    })
                    .collect();
                self.repo_store.upsert_commits(&commits).await?;

                let branch_infos = self.git.get_all_branches(&repo_path).await?;
                let branches: Vec<Branch> = branch_infos
                    .iter()
                    .map(|b| Branch::new(index_id, &b.name, &b.head_commit_sha))
                    .collect();
                self.repo_store.replace_branches(index_id, &branches).await?;

                let tag_infos = self.git.get_all_tags(&repo_path).await?;
                let tags: Vec<Tag> = tag_infos
                    .iter()
                    .map(|t| Tag::new(index_id, &t.name, &t.target_commit_sha))
                    .collect();
                self.repo_store.replace_tags(index_id, &tags).await?;

                // Diff the head tree against the previously scanned head to
                // classify files. Everything is `added` on the first scan.
                let head_files = self.git.get_commit_files(&repo_path, &head_sha).await?;
                let previous_files = match &previous_head {
                    Some(sha) if *sha != head_sha => {
                        self.repo_store.get_commit_files(sha).await?
                    }
                    Some(_) => self.repo_store.get_commit_files(&head_sha).await?,
                    None => Vec::new(),
                };
                let previous_blobs: HashSet<&str> =
                    previous_files.iter().map(|f| f.blob_sha()).collect();
                let previous_paths: HashSet<&str> =
                    previous_files.iter().map(|f| f.path()).collect();

                let mut entries = Vec::with_capacity(head_files.len());
                let mut links = Vec::with_capacity(head_files.len());
                let mut seen_blobs = HashSet::new();
                let mut changed = 0usize;
                let unchanged_rescan = previous_head.as_deref() == Some(head_sha.as_str());
                for file in &head_files {
                    // Identical content at several paths shares one blob row.
                    if !seen_blobs.insert(file.blob_sha.clone()) {
                        continue;
                    }
                    let entry = FileEntry::new(
                        &file.blob_sha,
                        &file.path,
                        guess_mime_type(&file.path),
                        file.size,
                    );
                    let status = if unchanged_rescan || previous_blobs.contains(file.blob_sha.as_str())
                    {
                        FileProcessingStatus::Clean
                    } else if previous_paths.contains(file.path.as_str()) {
                        FileProcessingStatus::Modified
                    } else {
                        FileProcessingStatus::Added
                    };
                    if status.is_changed() {
                        changed += 1;
                    }
                    links.push((file.blob_sha.clone(), status));
                    entries.push(entry);
                }
                self.repo_store.upsert_files(&entries).await?;
                self.repo_store.set_commit_files(&head_sha, &links).await?;

                repository.update_counts(
                    commits.len() as i64,
                    branches.len() as i64,
                    tags.len() as i64,
                );
                repository.mark_scanned();
                self.repo_store.save(&repository).await?;

                if changed == 0 {
                    info!(index_id, "no new changes to index");
                    step.skip("No new changes to index").await?;
                    return Ok(());
                }

                debug!(index_id, changed, "working copy refreshed");
                self.queue_commit_enrichment_tasks(index_id, &head_sha).await?;
                Ok(())
            })
            .await
    }

    /// Commit-scoped enrichments run once per commit, keyed by
    /// (operation, commit_sha), at normal priority.
    async fn queue_commit_enrichment_tasks(
        &self,
        index_id: i64,
        commit_sha: &str,
    ) -> Result<(), DomainError> {
        for operation in TaskOperation::COMMIT_ENRICHMENTS {
            let task = Task::create(
                operation,
                QueuePriority::Normal.value(),
                json!({"index_id": index_id, "commit_sha": commit_sha}),
            );
            self.queue.enqueue(&task).await?;
        }
        Ok(())
    }

    // ── Phase 2: extract snippets ────────────────────────────────────────

    async fn process_extract(&self, index_id: i64) -> Result<(), DomainError> {
        let repository = self.get_repository(index_id).await?;
        let head = self.head_commit_sha(&repository).await?;

        let tracker = self
            .progress
            .create_child(
                TaskOperation::ExtractSnippets,
                Some(TrackableType::Index),
                Some(index_id),
            )
            .await?;

        let step = tracker.clone();
        tracker
            .scope(async move {
                let Some(head_sha) = head else {
                    step.skip("No files to extract").await?;
                    return Ok(());
                };
                let changed_files = self.repo_store.get_changed_files(&head_sha).await?;
                if changed_files.is_empty() {
                    step.skip("No files to extract").await?;
                    return Ok(());
                }

                let repo_path = PathBuf::from(repository.cloned_path());
                step.set_total(changed_files.len() as i64).await?;

                let mut by_language: HashMap<Language, Vec<FileEntry>> = HashMap::new();
                for file in changed_files {
                    let language = file.language();
                    if language.is_known() {
                        by_language.entry(language).or_default().push(file);
                    }
                }

                let mut snippets = Vec::new();
                let mut processed = 0i64;
                for (language, files) in by_language {
                    let mut sources = Vec::with_capacity(files.len());
                    for file in &files {
                        let content = match self
                            .git
                            .get_file_content(&repo_path, file.blob_sha())
                            .await
                        {
                            Ok(content) => content,
                            Err(err) => {
                                debug!(path = file.path(), "skipping unreadable file: {err}");
                                continue;
                            }
                        };
                        sources.push(SourceFile {
                            blob_sha: file.blob_sha().to_string(),
                            path: file.path().to_string(),
                            content,
                        });
                    }
                    let extracted = self.slicer.extract_snippets(&sources, language).await?;
                    processed += files.len() as i64;
                    step.set_current(
                        processed,
                        &format!("Extracted snippets from {processed} files"),
                    )
                    .await?;
                    snippets.extend(extracted);
                }

                // Persist before pruning: a snippet re-derived with the same
                // content hash keeps its id, created_at, and processing
                // states, so unchanged code never re-runs a phase.
                self.snippet_store.save(&head_sha, &snippets).await?;

                let keep_ids: Vec<String> = snippets.iter().map(|s| s.id().to_string()).collect();
                let prune_step = step.create_child(TaskOperation::DeleteOldSnippets).await?;
                let orphaned = prune_step
                    .scope(self.snippet_store.prune_for_commit(&head_sha, &keep_ids))
                    .await?;
                self.evict_from_indexes(&orphaned).await?;

                info!(index_id, snippets = keep_ids.len(), "snippets extracted");
                Ok(())
            })
            .await
    }

    async fn evict_from_indexes(&self, snippet_ids: &[String]) -> Result<(), DomainError> {
        if snippet_ids.is_empty() {
            return Ok(());
        }
        self.keyword_index.delete(snippet_ids).await?;
        self.vector_index.delete(snippet_ids).await?;
        Ok(())
    }

    // ── Phase 3: BM25 keyword index ──────────────────────────────────────

    async fn process_bm25(&self, index_id: i64) -> Result<(), DomainError> {
        let tracker = self
            .progress
            .create_child(
                TaskOperation::CreateBm25Index,
                Some(TrackableType::Index),
                Some(index_id),
            )
            .await?;

        let step = tracker.clone();
        tracker
            .scope(async move {
                let pending = self
                    .snippet_store
                    .get_snippets_needing(index_id, ProcessingPhase::Bm25Index)
                    .await?;
                if pending.is_empty() {
                    step.skip("All snippets already have BM25 index").await?;
                    return Ok(());
                }

                let documents: Vec<Document> = pending
                    .iter()
                    .map(|s| Document {
                        snippet_id: s.id().to_string(),
                        text: s.original_text().to_string(),
                    })
                    .collect();
                self.keyword_index.index_documents(&documents).await?;

                let ids: Vec<String> = pending.iter().map(|s| s.id().to_string()).collect();
                self.snippet_store
                    .mark_completed(&ids, ProcessingPhase::Bm25Index)
                    .await?;
                info!(index_id, indexed = ids.len(), "BM25 documents created");
                Ok(())
            })
            .await
    }

    // ── Phase 4: code embeddings ─────────────────────────────────────────

    async fn process_code_embeddings(&self, index_id: i64) -> Result<(), DomainError> {
        let tracker = self
            .progress
            .create_child(
                TaskOperation::CreateCodeEmbeddings,
                Some(TrackableType::Index),
                Some(index_id),
            )
            .await?;

        let step = tracker.clone();
        tracker
            .scope(async move {
                let pending = self
                    .snippet_store
                    .get_snippets_needing(index_id, ProcessingPhase::CodeEmbeddings)
                    .await?;
                if pending.is_empty() {
                    step.skip("All snippets already have code embeddings").await?;
                    return Ok(());
                }

                step.set_total(pending.len() as i64).await?;
                let mut processed = 0i64;
                for chunk in pending.chunks(EMBED_BATCH_SIZE) {
                    let requests: Vec<EmbeddingRequest> = chunk
                        .iter()
                        .map(|s| EmbeddingRequest {
                            snippet_id: s.id().to_string(),
                            text: s.original_text().to_string(),
                        })
                        .collect();
                    let responses = self.code_embeddings.embed(&requests).await?;
                    self.vector_index
                        .index_embeddings(EmbeddingKind::Code, &responses)
                        .await?;
                    processed += chunk.len() as i64;
                    step.set_current(
                        processed,
                        &format!("Creating code embeddings for {processed} snippets"),
                    )
                    .await?;
                }

                let ids: Vec<String> = pending.iter().map(|s| s.id().to_string()).collect();
                self.snippet_store
                    .mark_completed(&ids, ProcessingPhase::CodeEmbeddings)
                    .await?;
                Ok(())
            })
            .await
    }

    // ── Phase 5: enrich snippets ─────────────────────────────────────────

    async fn process_enrich(&self, index_id: i64) -> Result<(), DomainError> {
        let repository = self.get_repository(index_id).await?;
        let tracker = self
            .progress
            .create_child(
                TaskOperation::EnrichSnippets,
                Some(TrackableType::Index),
                Some(index_id),
            )
            .await?;

        let step = tracker.clone();
        tracker
            .scope(async move {
                let head = self.head_commit_sha(&repository).await?;
                if head.is_none() {
                    step.skip("No snippets to enrich").await?;
                    return Ok(());
                }

                let pending = self
                    .snippet_store
                    .get_snippets_needing(index_id, ProcessingPhase::EnrichSnippets)
                    .await?;

                if pending.is_empty() {
                    info!(index_id, "no snippets need enrichment");
                } else {
                    step.set_total(pending.len() as i64).await?;
                    let requests: Vec<EnrichmentRequest> = pending
                        .iter()
                        .map(|s| EnrichmentRequest {
                            id: s.id().to_string(),
                            text: s.original_text().to_string(),
                            system_prompt: SNIPPET_SUMMARY_SYSTEM_PROMPT.to_string(),
                        })
                        .collect();

                    let mut responses = self.enricher.enrich(requests);
                    let mut processed = 0i64;
                    while let Some(response) = responses.next().await {
                        if !response.text.trim().is_empty() {
                            self.snippet_store
                                .add_enrichment(
                                    &response.id,
                                    &Enrichment::new(EnrichmentKind::Summary, response.text),
                                )
                                .await?;
                        }
                        processed += 1;
                        step.set_current(
                            processed,
                            &format!("Enriched {processed} snippets"),
                        )
                        .await?;
                    }

                    let ids: Vec<String> = pending.iter().map(|s| s.id().to_string()).collect();
                    self.snippet_store
                        .mark_completed(&ids, ProcessingPhase::EnrichSnippets)
                        .await?;
                }

                self.create_text_embeddings(index_id, &step).await?;

                let touch_step = step.create_child(TaskOperation::UpdateIndexTimestamp).await?;
                touch_step
                    .scope(self.repo_store.touch_updated_at(index_id))
                    .await?;

                let clear_step = step
                    .create_child(TaskOperation::ClearFileProcessingStatuses)
                    .await?;
                let head = self.head_commit_sha(&repository).await?;
                clear_step
                    .scope(async {
                        if let Some(head_sha) = head {
                            self.repo_store.clear_file_statuses(&head_sha).await?;
                        }
                        Ok(())
                    })
                    .await?;

                Ok(())
            })
            .await
    }

    /// Text embeddings for snippets whose summary is non-empty; runs inside
    /// phase 5 as a tracked sub-operation.
    async fn create_text_embeddings(
        &self,
        index_id: i64,
        parent: &Tracker,
    ) -> Result<(), DomainError> {
        let text_pending = self
            .snippet_store
            .get_snippets_needing(index_id, ProcessingPhase::TextEmbeddings)
            .await?;
        if text_pending.is_empty() {
            return Ok(());
        }

        let child = parent.create_child(TaskOperation::CreateTextEmbeddings).await?;
        let step = child.clone();
        child
            .scope(async {
                let with_summaries: Vec<_> = text_pending
                    .iter()
                    .filter(|s| s.has_summary())
                    .collect();
                if with_summaries.is_empty() {
                    step.skip("No snippets with summaries to create text embeddings")
                        .await?;
                    return Ok(());
                }

                step.set_total(with_summaries.len() as i64).await?;
                let mut processed = 0i64;
                for chunk in with_summaries.chunks(EMBED_BATCH_SIZE) {
                    let requests: Vec<EmbeddingRequest> = chunk
                        .iter()
                        .map(|s| EmbeddingRequest {
                            snippet_id: s.id().to_string(),
                            text: s.summary_text().to_string(),
                        })
                        .collect();
                    let responses = self.text_embeddings.embed(&requests).await?;
                    self.vector_index
                        .index_embeddings(EmbeddingKind::Text, &responses)
                        .await?;
                    processed += chunk.len() as i64;
                    step.set_current(
                        processed,
                        &format!("Creating text embeddings for {processed} snippets"),
                    )
                    .await?;
                }
                Ok(())
            })
            .await?;

        // Summaryless snippets will never grow one for this content hash;
        // marking the whole pending set keeps the phase idempotent.
        let ids: Vec<String> = text_pending.iter().map(|s| s.id().to_string()).collect();
        self.snippet_store
            .mark_completed(&ids, ProcessingPhase::TextEmbeddings)
            .await?;
        Ok(())
    }

    // ── Deletion ─────────────────────────────────────────────────────────

    /// Delete a repository and everything derived from it, including index
    /// entries of snippets that lost their last derivation.
    pub async fn delete_repository(&self, index_id: i64) -> Result<(), DomainError> {
        let repository = self.get_repository(index_id).await?;

        let commits = self.repo_store.get_commits(index_id, None).await?;
        let mut orphaned = Vec::new();
        for commit in &commits {
            orphaned.extend(self.snippet_store.delete_for_commit(commit.commit_sha()).await?);
        }
        self.evict_from_indexes(&orphaned).await?;

        self.repo_store.delete(index_id).await?;
        self.status_store
            .delete_for_trackable(TrackableType::Index, index_id)
            .await?;

        let clone_path = PathBuf::from(repository.cloned_path());
        if clone_path.starts_with(self.data_dir.join("clones")) && clone_path.exists() {
            if let Err(err) = tokio::fs::remove_dir_all(&clone_path).await {
                warn!(path = %clone_path.display(), "failed to remove clone: {err}");
            }
        }

        info!(index_id, orphaned = orphaned.len(), "repository deleted");
        Ok(())
    }
}

/// Rough MIME classification for stored file metadata.
pub fn guess_mime_type(path: &str) -> &'static str {
    match Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
        .as_str()
    {
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "ico" => "image/unknown",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "md" | "markdown" => "text/markdown",
        "" => "application/octet-stream",
        _ => "text/plain",
    }
}
