//! Hybrid search over an indexed repository: keyword scoring, vector legs,
//! fusion ordering, and filter precision.

mod common;

use common::{go_repo, setup_env, StubGitAdapter};
use repolens::{MultiSearchRequest, SearchFilters};

async fn indexed_env() -> common::TestEnv {
    let env = setup_env(StubGitAdapter::new(go_repo()));
    env.orchestrator
        .register_repository("https://github.com/acme/app.git")
        .await
        .unwrap();
    env.drain_queue().await;
    env
}

#[tokio::test]
async fn test_keyword_search_finds_go_main() {
    let env = indexed_env().await;

    let hits = env
        .search
        .search(MultiSearchRequest {
            top_k: 5,
            keywords: Some(vec!["main".to_string(), "func".to_string()]),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(!hits.is_empty());
    let hit = &hits[0];
    assert!(hit.content.contains("func"));
    assert!(hit.content.contains("main"));
    assert_eq!(hit.language, "Go");
    assert!(hit.relative_path.ends_with(".go"));
    assert_eq!(hit.source_uri, "https://github.com/acme/app");
    assert!(!hit.authors.is_empty());
    assert!(hit.fused_score > 0.0);
}

#[tokio::test]
async fn test_language_filter_precision() {
    let env = indexed_env().await;

    // The repository contains only .go files; a python filter matches none.
    let hits = env
        .search
        .search(MultiSearchRequest {
            top_k: 5,
            keywords: Some(vec!["main".to_string(), "func".to_string()]),
            filters: Some(SearchFilters {
                language: Some("python".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(hits.is_empty());

    // Case-insensitive match against the detected language.
    let hits = env
        .search
        .search(MultiSearchRequest {
            top_k: 5,
            keywords: Some(vec!["main".to_string()]),
            filters: Some(SearchFilters {
                language: Some("Go".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!hits.is_empty());
}

#[tokio::test]
async fn test_source_repo_filter_is_substring() {
    let env = indexed_env().await;

    let hits = env
        .search
        .search(MultiSearchRequest {
            top_k: 5,
            keywords: Some(vec!["main".to_string()]),
            filters: Some(SearchFilters {
                source_repo: Some("github.com/acme".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!hits.is_empty());

    let hits = env
        .search
        .search(MultiSearchRequest {
            top_k: 5,
            keywords: Some(vec!["main".to_string()]),
            filters: Some(SearchFilters {
                source_repo: Some("gitlab.com".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_hybrid_queries_fuse_and_order_by_score() {
    let env = indexed_env().await;

    let hits = env
        .search
        .search(MultiSearchRequest {
            top_k: 10,
            keywords: Some(vec!["greet".to_string()]),
            code_query: Some("func Greet() string".to_string()),
            text_query: Some("a function that greets".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(!hits.is_empty());
    // Fused scores are monotonically decreasing; equal scores order by id.
    for pair in hits.windows(2) {
        assert!(
            pair[0].fused_score > pair[1].fused_score
                || (pair[0].fused_score == pair[1].fused_score
                    && pair[0].snippet_id < pair[1].snippet_id)
        );
    }
    // Raw scores are reported per engine: keyword, code, text.
    assert_eq!(hits[0].original_scores.len(), 3);
}

#[tokio::test]
async fn test_snippets_carry_summaries_after_enrichment() {
    let env = indexed_env().await;

    let hits = env
        .search
        .search(MultiSearchRequest {
            top_k: 5,
            keywords: Some(vec!["main".to_string()]),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(hits.iter().all(|h| h.summary.starts_with("Mock summary:")));
}

#[tokio::test]
async fn test_query_without_any_leg_is_invalid() {
    let env = indexed_env().await;

    let err = env
        .search
        .search(MultiSearchRequest::default())
        .await
        .unwrap_err();
    assert!(err.is_invalid_input());
}

#[tokio::test]
async fn test_top_k_limits_results() {
    let env = indexed_env().await;

    let hits = env
        .search
        .search(MultiSearchRequest {
            top_k: 1,
            keywords: Some(vec!["func".to_string()]),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(hits.len() <= 1);
}
