use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::debug;

use super::dto::{
    BranchDto, CommitDto, CreateRepositoryRequest, EnrichmentDto, FileDto, RepositoryDetailDto,
    RepositoryDto, SearchRequestDto, SearchResponseDto, SnippetDto, StatusNodeDto, TagDto,
};
use crate::application::{
    order_hierarchy, IndexingOrchestrator, RepositoryStore, SearchService, SnippetStore,
    StatusStore,
};
use crate::domain::{
    DomainError, MultiSearchRequest, Repository, SearchFilters, TrackableType,
};

/// Shared handler state: the thin HTTP layer delegates everything to the
/// application services.
pub struct AppState {
    pub repo_store: Arc<dyn RepositoryStore>,
    pub snippet_store: Arc<dyn SnippetStore>,
    pub status_store: Arc<dyn StatusStore>,
    pub orchestrator: Arc<IndexingOrchestrator>,
    pub search: Arc<SearchService>,
}

/// `DomainError` mapped onto HTTP statuses at the boundary.
pub struct ApiError(DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::AlreadyExists(_) => StatusCode::CONFLICT,
            DomainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        debug!(status = %status, "request failed: {}", self.0);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/v1/repositories",
            post(create_repository).get(list_repositories),
        )
        .route(
            "/api/v1/repositories/{id}",
            get(get_repository).delete(delete_repository),
        )
        .route("/api/v1/repositories/{id}/sync", post(sync_repository))
        .route("/api/v1/repositories/{id}/status", get(repository_status))
        .route("/api/v1/repositories/{id}/commits", get(list_commits))
        .route("/api/v1/repositories/{id}/commits/{sha}", get(get_commit))
        .route(
            "/api/v1/repositories/{id}/commits/{sha}/files",
            get(list_commit_files),
        )
        .route(
            "/api/v1/repositories/{id}/commits/{sha}/files/{blob_sha}",
            get(get_commit_file),
        )
        .route(
            "/api/v1/repositories/{id}/commits/{sha}/snippets",
            get(list_commit_snippets),
        )
        .route(
            "/api/v1/repositories/{id}/commits/{sha}/enrichments",
            get(list_commit_enrichments),
        )
        .route("/api/v1/search", post(search))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn create_repository(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRepositoryRequest>,
) -> Result<(StatusCode, Json<RepositoryDto>), ApiError> {
    let repository = state
        .orchestrator
        .register_repository(&request.remote_uri)
        .await?;
    Ok((StatusCode::CREATED, Json(RepositoryDto::from(&repository))))
}

async fn list_repositories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RepositoryDto>>, ApiError> {
    let repositories = state.repo_store.list().await?;
    Ok(Json(repositories.iter().map(RepositoryDto::from).collect()))
}

async fn load_repository(state: &AppState, id: i64) -> Result<Repository, DomainError> {
    state
        .repo_store
        .get(id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Repository not found: {id}")))
}

async fn get_repository(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<RepositoryDetailDto>, ApiError> {
    let repository = load_repository(&state, id).await?;
    let branches = state.repo_store.get_branches(id).await?;
    let tags = state.repo_store.get_tags(id).await?;
    let recent_commits = state.repo_store.get_commits(id, Some(10)).await?;

    Ok(Json(RepositoryDetailDto {
        repository: RepositoryDto::from(&repository),
        branches: branches.iter().map(BranchDto::from).collect(),
        tags: tags.iter().map(TagDto::from).collect(),
        recent_commits: recent_commits.iter().map(CommitDto::from).collect(),
    }))
}

async fn delete_repository(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator.delete_repository(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sync_repository(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    load_repository(&state, id).await?;
    state.orchestrator.queue_index_tasks(id, true).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn repository_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<StatusNodeDto>>, ApiError> {
    load_repository(&state, id).await?;
    let mut nodes = state
        .status_store
        .load_with_hierarchy(TrackableType::Index, id)
        .await?;
    nodes.extend(
        state
            .status_store
            .load_with_hierarchy(TrackableType::Repository, id)
            .await?,
    );
    let ordered = order_hierarchy(nodes);
    Ok(Json(ordered.iter().map(StatusNodeDto::from).collect()))
}

async fn list_commits(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<CommitDto>>, ApiError> {
    load_repository(&state, id).await?;
    let commits = state.repo_store.get_commits(id, None).await?;
    Ok(Json(commits.iter().map(CommitDto::from).collect()))
}

/// Resolve a commit and check it belongs to the repository in the path.
async fn load_commit(
    state: &AppState,
    repo_id: i64,
    sha: &str,
) -> Result<crate::domain::Commit, DomainError> {
    let commit = state
        .repo_store
        .get_commit(sha)
        .await?
        .filter(|c| c.repo_id() == repo_id)
        .ok_or_else(|| DomainError::not_found(format!("Commit not found: {sha}")))?;
    Ok(commit)
}

async fn get_commit(
    State(state): State<Arc<AppState>>,
    Path((id, sha)): Path<(i64, String)>,
) -> Result<Json<CommitDto>, ApiError> {
    let commit = load_commit(&state, id, &sha).await?;
    Ok(Json(CommitDto::from(&commit)))
}

async fn list_commit_files(
    State(state): State<Arc<AppState>>,
    Path((id, sha)): Path<(i64, String)>,
) -> Result<Json<Vec<FileDto>>, ApiError> {
    load_commit(&state, id, &sha).await?;
    let files = state.repo_store.get_commit_files(&sha).await?;
    Ok(Json(files.iter().map(FileDto::from).collect()))
}

async fn get_commit_file(
    State(state): State<Arc<AppState>>,
    Path((id, sha, blob_sha)): Path<(i64, String, String)>,
) -> Result<Json<FileDto>, ApiError> {
    load_commit(&state, id, &sha).await?;
    let file = state
        .repo_store
        .get_file(&blob_sha)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("File not found: {blob_sha}")))?;
    Ok(Json(FileDto::from(&file)))
}

async fn list_commit_snippets(
    State(state): State<Arc<AppState>>,
    Path((id, sha)): Path<(i64, String)>,
) -> Result<Json<Vec<SnippetDto>>, ApiError> {
    load_commit(&state, id, &sha).await?;
    // Snippets come back with their enrichments inline.
    let snippets = state.snippet_store.get_for_commit(&sha).await?;
    Ok(Json(snippets.iter().map(SnippetDto::from).collect()))
}

async fn list_commit_enrichments(
    State(state): State<Arc<AppState>>,
    Path((id, sha)): Path<(i64, String)>,
) -> Result<Json<Vec<EnrichmentDto>>, ApiError> {
    load_commit(&state, id, &sha).await?;
    let enrichments = state.repo_store.get_commit_enrichments(&sha).await?;
    Ok(Json(enrichments.iter().map(EnrichmentDto::from).collect()))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequestDto>,
) -> Result<Json<SearchResponseDto>, ApiError> {
    let filters = match request.filters {
        Some(dto) => {
            let (created_after, created_before) = SearchFilters::parse_dates(
                dto.created_after.as_deref(),
                dto.created_before.as_deref(),
            )?;
            Some(SearchFilters {
                language: dto.language,
                author: dto.author,
                created_after,
                created_before,
                source_repo: dto.source_repo,
                file_path: dto.file_path,
            })
        }
        None => None,
    };

    let results = state
        .search
        .search(MultiSearchRequest {
            top_k: request.limit.unwrap_or(0),
            text_query: request.text,
            code_query: request.code,
            keywords: request.keywords,
            filters,
        })
        .await?;
    Ok(Json(SearchResponseDto { results }))
}
