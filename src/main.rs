//! RepoLens server - repository indexing and hybrid code search.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use repolens::{
    build_router, open_database, AppConfig, AppState, ChatClient, CommitEnrichmentService,
    DuckdbKeywordIndex, DuckdbRepositoryStore, DuckdbSnippetStore, DuckdbStatusStore,
    DuckdbTaskQueue, DuckdbVectorIndex, EmbeddingService, EnrichmentPipeline,
    FilesystemStructureScanner, GitCliAdapter, HttpChatClient, HttpEmbeddingService,
    IndexingOrchestrator, MockChatClient, MockEmbeddingService, SearchService, SyncScheduler,
    TaskWorker, TreeSitterSlicer,
};

/// RepoLens - repository indexing and hybrid code search
#[derive(Parser)]
#[command(name = "repolens")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Override the data directory (otherwise DATA_DIR)
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Override the listen address (otherwise LISTEN_ADDR)
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(data_dir) = &cli.data_dir {
        std::env::set_var("DATA_DIR", data_dir);
    }
    if let Some(listen) = &cli.listen {
        std::env::set_var("LISTEN_ADDR", listen);
    }

    let config = AppConfig::from_env()?;

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if config.disable_telemetry {
        info!("telemetry disabled");
    }

    std::fs::create_dir_all(config.clones_dir())?;
    let conn = open_database(&config.db_path)?;
    info!(db = %config.db_path.display(), "database opened");

    // Storage adapters share the single DuckDB connection.
    let repo_store = Arc::new(DuckdbRepositoryStore::with_connection(conn.clone()));
    let snippet_store = Arc::new(DuckdbSnippetStore::with_connection(conn.clone()));
    let status_store = Arc::new(DuckdbStatusStore::with_connection(conn.clone()));
    let queue = Arc::new(DuckdbTaskQueue::with_connection(conn.clone()));
    let keyword_index = Arc::new(DuckdbKeywordIndex::with_connection(conn.clone()));
    let vector_index = Arc::new(DuckdbVectorIndex::with_connection(conn));

    let git = Arc::new(GitCliAdapter::new());
    let slicer = Arc::new(TreeSitterSlicer::new());
    let scanner = Arc::new(FilesystemStructureScanner::new());

    let embedding_service: Arc<dyn EmbeddingService> = match &config.embedding.base_url {
        Some(base_url) => Arc::new(HttpEmbeddingService::new(
            base_url,
            &config.embedding.model,
            &config.embedding.api_key,
            config.embedding.timeout,
        )),
        None => {
            warn!("EMBEDDING_ENDPOINT_BASE_URL not set, using mock embeddings");
            Arc::new(MockEmbeddingService::new())
        }
    };
    let chat_client: Arc<dyn ChatClient> = match &config.enrichment.base_url {
        Some(base_url) => Arc::new(HttpChatClient::new(
            base_url,
            &config.enrichment.model,
            &config.enrichment.api_key,
            config.enrichment.timeout,
        )),
        None => {
            warn!("ENRICHMENT_ENDPOINT_BASE_URL not set, using mock enrichment");
            Arc::new(MockChatClient::new())
        }
    };
    let enricher = Arc::new(EnrichmentPipeline::new(
        chat_client,
        config.enrichment.num_parallel_tasks,
        config.enrichment.timeout,
    ));

    let orchestrator = Arc::new(IndexingOrchestrator::new(
        repo_store.clone(),
        snippet_store.clone(),
        status_store.clone(),
        queue.clone(),
        git.clone(),
        slicer.clone(),
        keyword_index.clone(),
        vector_index.clone(),
        embedding_service.clone(),
        embedding_service.clone(),
        enricher.clone(),
        config.data_dir.clone(),
    ));
    let commit_enrichments = Arc::new(CommitEnrichmentService::new(
        repo_store.clone(),
        git,
        slicer,
        scanner,
        enricher,
        orchestrator.progress().clone(),
    ));
    let search = Arc::new(SearchService::new(
        snippet_store.clone(),
        keyword_index,
        vector_index,
        embedding_service.clone(),
        embedding_service,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = TaskWorker::new(
        queue,
        orchestrator.clone(),
        commit_enrichments,
        status_store.clone(),
        shutdown_rx.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    let scheduler_handle = if config.periodic_sync_enabled {
        let scheduler = SyncScheduler::new(
            repo_store.clone(),
            orchestrator.clone(),
            config.periodic_sync_interval,
            shutdown_rx,
        );
        Some(tokio::spawn(scheduler.run()))
    } else {
        info!("periodic sync disabled");
        None
    };

    let state = Arc::new(AppState {
        repo_store,
        snippet_store,
        status_store,
        orchestrator,
        search,
    });
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    // Let in-flight work finish before exit.
    let _ = shutdown_tx.send(true);
    let _ = worker_handle.await;
    if let Some(handle) = scheduler_handle {
        let _ = handle.await;
    }
    info!("bye");
    Ok(())
}
