use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::application::services::rrf::rrf_fuse;
use crate::application::{EmbeddingService, KeywordIndex, SnippetStore, VectorIndex};
use crate::domain::{
    DomainError, EmbeddingKind, EngineHit, MultiSearchRequest, SearchHit,
};

/// Pool multiplier so RRF has enough candidates from every engine before the
/// final cut to `top_k`.
const FETCH_MULTIPLIER: usize = 2;
const MIN_FETCH: usize = 20;

/// Composes filters, dispatches to the engines, fuses via RRF, and hydrates
/// results with file/commit/author metadata. Stateless beyond read-only
/// indexes, so concurrent searches are fine.
pub struct SearchService {
    snippet_store: Arc<dyn SnippetStore>,
    keyword_index: Arc<dyn KeywordIndex>,
    vector_index: Arc<dyn VectorIndex>,
    code_embeddings: Arc<dyn EmbeddingService>,
    text_embeddings: Arc<dyn EmbeddingService>,
}

impl SearchService {
    pub fn new(
        snippet_store: Arc<dyn SnippetStore>,
        keyword_index: Arc<dyn KeywordIndex>,
        vector_index: Arc<dyn VectorIndex>,
        code_embeddings: Arc<dyn EmbeddingService>,
        text_embeddings: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            snippet_store,
            keyword_index,
            vector_index,
            code_embeddings,
            text_embeddings,
        }
    }

    pub async fn search(&self, request: MultiSearchRequest) -> Result<Vec<SearchHit>, DomainError> {
        if !request.has_query() {
            return Err(DomainError::invalid_input(
                "Search requires at least one of keywords, text, or code",
            ));
        }

        let start_time = Instant::now();
        let top_k = request.top_k_or_default();
        let fetch = (top_k * FETCH_MULTIPLIER).max(MIN_FETCH);

        let filters = request.filters.clone().unwrap_or_default().canonicalize();
        let candidates = self.snippet_store.filter_candidates(&filters).await?;
        if let Some(ids) = &candidates {
            if ids.is_empty() {
                debug!("filters matched no snippets");
                return Ok(Vec::new());
            }
        }
        let candidate_slice = candidates.as_deref();

        // Engine order is fixed (keyword, code, text) so original_scores
        // positions are stable; absent query kinds contribute empty rankings.
        let mut rankings: Vec<Vec<EngineHit>> = vec![Vec::new(), Vec::new(), Vec::new()];

        if let Some(keywords) = request.keywords.as_ref().filter(|k| !k.is_empty()) {
            rankings[0] = self
                .keyword_index
                .search(keywords, fetch, candidate_slice)
                .await?;
        }
        if let Some(code_query) = &request.code_query {
            let query_vector = self.code_embeddings.embed_query(code_query).await?;
            rankings[1] = self
                .vector_index
                .search(EmbeddingKind::Code, &query_vector, fetch, candidate_slice)
                .await?;
        }
        if let Some(text_query) = &request.text_query {
            let query_vector = self.text_embeddings.embed_query(text_query).await?;
            rankings[2] = self
                .vector_index
                .search(EmbeddingKind::Text, &query_vector, fetch, candidate_slice)
                .await?;
        }

        let fused = rrf_fuse(&rankings, top_k);
        if fused.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = fused.iter().map(|f| f.snippet_id.clone()).collect();
        let contexts = self.snippet_store.get_contexts(&ids).await?;
        let mut by_id: HashMap<String, _> = contexts
            .into_iter()
            .map(|c| (c.snippet.id().to_string(), c))
            .collect();

        let mut hits = Vec::with_capacity(fused.len());
        for fused_hit in fused {
            let Some(context) = by_id.remove(&fused_hit.snippet_id) else {
                debug!(snippet_id = %fused_hit.snippet_id, "hit lost its snippet during hydration");
                continue;
            };
            hits.push(SearchHit {
                snippet_id: fused_hit.snippet_id,
                content: context.snippet.original_text().to_string(),
                language: context.snippet.language().display_name().to_string(),
                source_uri: context.source_uri,
                relative_path: context.relative_path,
                authors: context.authors,
                created_at: context.created_at,
                original_scores: fused_hit.original_scores,
                fused_score: fused_hit.score,
                summary: context.snippet.summary_text().to_string(),
            });
        }

        info!(
            results = hits.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "search completed"
        );
        Ok(hits)
    }
}
