use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{debug, info};

use crate::application::services::prompts::{
    fill_placeholder, ARCHITECTURE_ENRICHMENT_SYSTEM_PROMPT, ARCHITECTURE_ENRICHMENT_TASK_PROMPT,
    COMMIT_DESCRIPTION_SYSTEM_PROMPT, COOKBOOK_SYSTEM_PROMPT, COOKBOOK_TASK_PROMPT,
    DATABASE_SCHEMA_SYSTEM_PROMPT, DATABASE_SCHEMA_TASK_PROMPT,
    REPOSITORY_STRUCTURE_ENRICHMENT_SYSTEM_PROMPT, REPOSITORY_STRUCTURE_ENRICHMENT_TASK_PROMPT,
};
use crate::application::{
    EnrichmentPipeline, GitAdapter, ProgressTracker, RepositoryStore, SlicerService, SourceFile,
    StructureScanner, Tracker,
};
use crate::domain::{
    DomainError, Enrichment, EnrichmentKind, EnrichmentRequest, FileEntry, Language, Repository,
    Task, TaskOperation, TrackableType,
};

/// Generates the commit-scoped enrichments: commit description,
/// physical-architecture notes, public API docs, database schema
/// documentation, and the usage cookbook. Each runs once per commit; an
/// existence check makes re-runs cheap no-ops.
pub struct CommitEnrichmentService {
    repo_store: Arc<dyn RepositoryStore>,
    git: Arc<dyn GitAdapter>,
    slicer: Arc<dyn SlicerService>,
    scanner: Arc<dyn StructureScanner>,
    enricher: Arc<EnrichmentPipeline>,
    progress: ProgressTracker,
}

impl CommitEnrichmentService {
    pub fn new(
        repo_store: Arc<dyn RepositoryStore>,
        git: Arc<dyn GitAdapter>,
        slicer: Arc<dyn SlicerService>,
        scanner: Arc<dyn StructureScanner>,
        enricher: Arc<EnrichmentPipeline>,
        progress: ProgressTracker,
    ) -> Self {
        Self {
            repo_store,
            git,
            slicer,
            scanner,
            enricher,
            progress,
        }
    }

    /// Execute one queued commit-enrichment task.
    pub async fn run_task(&self, task: &Task) -> Result<(), DomainError> {
        let index_id = task
            .index_id()
            .ok_or_else(|| DomainError::invalid_input("Task payload is missing index_id"))?;
        let commit_sha = task
            .commit_sha()
            .ok_or_else(|| DomainError::invalid_input("Task payload is missing commit_sha"))?
            .to_string();

        match task.operation() {
            TaskOperation::CreateCommitDescriptionForCommit => {
                self.create_commit_description(index_id, &commit_sha).await
            }
            TaskOperation::CreateArchitectureEnrichmentForCommit => {
                self.create_architecture_enrichment(index_id, &commit_sha).await
            }
            TaskOperation::CreatePublicApiDocsForCommit => {
                self.create_api_docs(index_id, &commit_sha).await
            }
            TaskOperation::CreateDatabaseSchemaForCommit => {
                self.create_database_schema(index_id, &commit_sha).await
            }
            TaskOperation::CreateCookbookForCommit => {
                self.create_cookbook(index_id, &commit_sha).await
            }
            other => Err(DomainError::invalid_input(format!(
                "Not a commit enrichment operation: {other}"
            ))),
        }
    }

    async fn get_repository(&self, repository_id: i64) -> Result<Repository, DomainError> {
        self.repo_store
            .get(repository_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Repository not found: {repository_id}")))
    }

    async fn tracker(
        &self,
        operation: TaskOperation,
        repository_id: i64,
    ) -> Result<Tracker, DomainError> {
        self.progress
            .create_child(operation, Some(TrackableType::Repository), Some(repository_id))
            .await
    }

    /// Run one request through the pipeline and return its text.
    async fn enrich_one(&self, request: EnrichmentRequest) -> String {
        let mut content = String::new();
        let mut responses = self.enricher.enrich(vec![request]);
        while let Some(response) = responses.next().await {
            content = response.text;
        }
        content
    }

    /// Generate commit description from the diff.
    pub async fn create_commit_description(
        &self,
        repository_id: i64,
        commit_sha: &str,
    ) -> Result<(), DomainError> {
        let tracker = self
            .tracker(TaskOperation::CreateCommitDescriptionForCommit, repository_id)
            .await?;
        let step = tracker.clone();
        tracker
            .scope(async move {
                if self
                    .repo_store
                    .has_commit_enrichment(commit_sha, EnrichmentKind::CommitDescription)
                    .await?
                {
                    step.skip("Commit description already exists for commit").await?;
                    return Ok(());
                }
                let repository = self.get_repository(repository_id).await?;
                let repo_path = PathBuf::from(repository.cloned_path());

                step.set_total(3).await?;
                step.set_current(1, "Getting commit diff").await?;
                let diff = self.git.get_commit_diff(&repo_path, commit_sha).await?;
                if diff.trim().is_empty() {
                    step.skip("No diff found for commit").await?;
                    return Ok(());
                }

                step.set_current(2, "Enriching commit description with LLM").await?;
                let content = self
                    .enrich_one(EnrichmentRequest {
                        id: commit_sha.to_string(),
                        text: diff,
                        system_prompt: COMMIT_DESCRIPTION_SYSTEM_PROMPT.to_string(),
                    })
                    .await;

                self.repo_store
                    .save_commit_enrichment(
                        commit_sha,
                        &Enrichment::new(EnrichmentKind::CommitDescription, content),
                    )
                    .await?;
                step.set_current(3, "Commit description enrichment completed").await?;
                Ok(())
            })
            .await
    }

    /// Discover physical architecture and document it.
    pub async fn create_architecture_enrichment(
        &self,
        repository_id: i64,
        commit_sha: &str,
    ) -> Result<(), DomainError> {
        let tracker = self
            .tracker(
                TaskOperation::CreateArchitectureEnrichmentForCommit,
                repository_id,
            )
            .await?;
        let step = tracker.clone();
        tracker
            .scope(async move {
                if self
                    .repo_store
                    .has_commit_enrichment(commit_sha, EnrichmentKind::Architecture)
                    .await?
                {
                    step.skip("Architecture enrichment already exists for commit").await?;
                    return Ok(());
                }
                let repository = self.get_repository(repository_id).await?;
                let repo_path = PathBuf::from(repository.cloned_path());

                step.set_total(3).await?;
                step.set_current(1, "Discovering physical architecture").await?;
                let narrative = self.scanner.discover_architecture(&repo_path).await?;

                step.set_current(2, "Enriching architecture notes with LLM").await?;
                let content = self
                    .enrich_one(EnrichmentRequest {
                        id: commit_sha.to_string(),
                        text: fill_placeholder(
                            ARCHITECTURE_ENRICHMENT_TASK_PROMPT,
                            "architecture_narrative",
                            &narrative,
                        ),
                        system_prompt: ARCHITECTURE_ENRICHMENT_SYSTEM_PROMPT.to_string(),
                    })
                    .await;

                self.repo_store
                    .save_commit_enrichment(
                        commit_sha,
                        &Enrichment::new(EnrichmentKind::Architecture, content),
                    )
                    .await?;
                step.set_current(3, "Architecture enrichment completed").await?;
                Ok(())
            })
            .await
    }

    /// Generate public-API documentation from code, one record per module.
    pub async fn create_api_docs(
        &self,
        repository_id: i64,
        commit_sha: &str,
    ) -> Result<(), DomainError> {
        let tracker = self
            .tracker(TaskOperation::CreatePublicApiDocsForCommit, repository_id)
            .await?;
        let step = tracker.clone();
        tracker
            .scope(async move {
                if self
                    .repo_store
                    .has_commit_enrichment(commit_sha, EnrichmentKind::ApiDoc)
                    .await?
                {
                    step.skip("API docs already exist for commit").await?;
                    return Ok(());
                }
                let repository = self.get_repository(repository_id).await?;
                let repo_path = PathBuf::from(repository.cloned_path());

                let files = self.repo_store.get_commit_files(commit_sha).await?;
                if files.is_empty() {
                    step.skip("No files to extract API docs from").await?;
                    return Ok(());
                }

                let by_language = group_by_language(&files);
                step.set_total(by_language.len() as i64).await?;

                let mut records = 0usize;
                for (i, (language, lang_files)) in by_language.into_iter().enumerate() {
                    step.set_current(i as i64, &format!("Extracting API docs for {language}"))
                        .await?;
                    let mut sources = Vec::with_capacity(lang_files.len());
                    for file in lang_files {
                        match self.git.get_file_content(&repo_path, file.blob_sha()).await {
                            Ok(content) => sources.push(SourceFile {
                                blob_sha: file.blob_sha().to_string(),
                                path: file.path().to_string(),
                                content,
                            }),
                            Err(err) => {
                                debug!(path = file.path(), "skipping unreadable file: {err}")
                            }
                        }
                    }
                    let docs = self.slicer.extract_api_docs(&sources, language, false).await?;
                    for doc in docs {
                        self.repo_store
                            .save_commit_enrichment(
                                commit_sha,
                                &Enrichment::new(EnrichmentKind::ApiDoc, doc.content),
                            )
                            .await?;
                        records += 1;
                    }
                }

                if records == 0 {
                    step.skip("No public API to document").await?;
                    return Ok(());
                }
                info!(repository_id, records, "API docs created");
                Ok(())
            })
            .await
    }

    /// Discover and document database schemas.
    pub async fn create_database_schema(
        &self,
        repository_id: i64,
        commit_sha: &str,
    ) -> Result<(), DomainError> {
        let tracker = self
            .tracker(TaskOperation::CreateDatabaseSchemaForCommit, repository_id)
            .await?;
        let step = tracker.clone();
        tracker
            .scope(async move {
                if self
                    .repo_store
                    .has_commit_enrichment(commit_sha, EnrichmentKind::DatabaseSchema)
                    .await?
                {
                    step.skip("Database schema already exists for commit").await?;
                    return Ok(());
                }
                let repository = self.get_repository(repository_id).await?;
                let repo_path = PathBuf::from(repository.cloned_path());

                step.set_total(3).await?;
                step.set_current(1, "Discovering database schemas").await?;
                let schema_report = self.scanner.discover_schemas(&repo_path).await?;
                if schema_report.contains("No database schemas detected") {
                    step.skip("No database schemas found in repository").await?;
                    return Ok(());
                }

                step.set_current(2, "Enriching schema documentation with LLM").await?;
                let content = self
                    .enrich_one(EnrichmentRequest {
                        id: commit_sha.to_string(),
                        text: fill_placeholder(
                            DATABASE_SCHEMA_TASK_PROMPT,
                            "schema_report",
                            &schema_report,
                        ),
                        system_prompt: DATABASE_SCHEMA_SYSTEM_PROMPT.to_string(),
                    })
                    .await;

                self.repo_store
                    .save_commit_enrichment(
                        commit_sha,
                        &Enrichment::new(EnrichmentKind::DatabaseSchema, content),
                    )
                    .await?;
                step.set_current(3, "Database schema enrichment completed").await?;
                Ok(())
            })
            .await
    }

    /// Generate usage cookbook examples.
    pub async fn create_cookbook(
        &self,
        repository_id: i64,
        commit_sha: &str,
    ) -> Result<(), DomainError> {
        let tracker = self
            .tracker(TaskOperation::CreateCookbookForCommit, repository_id)
            .await?;
        let step = tracker.clone();
        tracker
            .scope(async move {
                if self
                    .repo_store
                    .has_commit_enrichment(commit_sha, EnrichmentKind::Cookbook)
                    .await?
                {
                    step.skip("Cookbook already exists for commit").await?;
                    return Ok(());
                }
                let repository = self.get_repository(repository_id).await?;
                let repo_path = PathBuf::from(repository.cloned_path());

                step.set_total(4).await?;
                step.set_current(1, "Getting files for cookbook generation").await?;
                let files = self.repo_store.get_commit_files(commit_sha).await?;
                if files.is_empty() {
                    step.skip("No files to generate cookbook from").await?;
                    return Ok(());
                }

                let by_language = group_by_language(&files);
                let Some((primary_language, _)) = by_language
                    .iter()
                    .max_by_key(|(_, files)| files.len())
                    .map(|(l, f)| (*l, f.len()))
                else {
                    step.skip("No supported languages found for cookbook").await?;
                    return Ok(());
                };

                // A summarized repository tree sharpens the context the
                // cookbook prompt sees.
                step.set_current(2, "Summarizing repository structure").await?;
                let tree = self.scanner.repository_tree(&repo_path).await?;
                let tree_summary = self
                    .enrich_one(EnrichmentRequest {
                        id: format!("{commit_sha}-tree"),
                        text: fill_placeholder(
                            REPOSITORY_STRUCTURE_ENRICHMENT_TASK_PROMPT,
                            "repository_tree",
                            &tree,
                        ),
                        system_prompt: REPOSITORY_STRUCTURE_ENRICHMENT_SYSTEM_PROMPT.to_string(),
                    })
                    .await;

                step.set_current(3, "Gathering repository context for cookbook").await?;
                let mut context = self
                    .scanner
                    .gather_context(&repo_path, primary_language)
                    .await?;
                if !tree_summary.trim().is_empty() {
                    context.push_str("\n\n## Repository structure\n\n");
                    context.push_str(&tree_summary);
                }

                step.set_current(4, "Generating cookbook examples with LLM").await?;
                let content = self
                    .enrich_one(EnrichmentRequest {
                        id: commit_sha.to_string(),
                        text: fill_placeholder(COOKBOOK_TASK_PROMPT, "repository_context", &context),
                        system_prompt: COOKBOOK_SYSTEM_PROMPT.to_string(),
                    })
                    .await;

                self.repo_store
                    .save_commit_enrichment(
                        commit_sha,
                        &Enrichment::new(EnrichmentKind::Cookbook, content),
                    )
                    .await?;
                Ok(())
            })
            .await
    }
}

fn group_by_language(files: &[FileEntry]) -> HashMap<Language, Vec<&FileEntry>> {
    let mut by_language: HashMap<Language, Vec<&FileEntry>> = HashMap::new();
    for file in files {
        let language = file.language();
        if language.is_known() {
            by_language.entry(language).or_default().push(file);
        }
    }
    by_language
}
