//! End-to-end pipeline scenarios over the scriptable git backend.

mod common;

use std::collections::{HashMap, HashSet};

use common::{go_repo, setup_env, StubGitAdapter};
use repolens::{
    EnrichmentKind, GitCommitInfo, GitFileInfo, RepositoryStore, SnippetStore, StatusStore,
    TaskOperation, TaskState, TrackableType,
};

async fn top_level_phase_states(
    env: &common::TestEnv,
    index_id: i64,
) -> Vec<(TaskOperation, TaskState)> {
    let nodes = env
        .status_store
        .load_with_hierarchy(TrackableType::Index, index_id)
        .await
        .unwrap();
    nodes
        .iter()
        .filter(|n| n.parent().is_none() && TaskOperation::PIPELINE.contains(&n.operation()))
        .map(|n| (n.operation(), n.state()))
        .collect()
}

#[tokio::test]
async fn test_register_creates_repository_with_sanitized_uri() {
    let env = setup_env(StubGitAdapter::new(go_repo()));

    let repository = env
        .orchestrator
        .register_repository("https://user:pw@github.com/x/y.git")
        .await
        .unwrap();
    assert_eq!(repository.sanitized_remote_uri(), "https://github.com/x/y");

    let listed = env.repo_store.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].sanitized_remote_uri(), "https://github.com/x/y");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let env = setup_env(StubGitAdapter::new(go_repo()));

    env.orchestrator
        .register_repository("https://github.com/x/y.git")
        .await
        .unwrap();
    let err = env
        .orchestrator
        .register_repository("https://github.com/x/y")
        .await
        .unwrap_err();
    assert!(err.is_already_exists());
}

#[tokio::test]
async fn test_invalid_uri_is_rejected() {
    let env = setup_env(StubGitAdapter::new(go_repo()));
    let err = env
        .orchestrator
        .register_repository("not-a-uri")
        .await
        .unwrap_err();
    assert!(err.is_invalid_input());
}

#[tokio::test]
async fn test_full_pipeline_reaches_terminal_states() {
    let env = setup_env(StubGitAdapter::new(go_repo()));
    let repository = env
        .orchestrator
        .register_repository("https://github.com/acme/app.git")
        .await
        .unwrap();
    env.drain_queue().await;

    let phases = top_level_phase_states(&env, repository.id()).await;
    assert_eq!(phases.len(), 5, "five top-level phase nodes: {phases:?}");
    for (operation, state) in &phases {
        assert!(
            matches!(state, TaskState::Completed | TaskState::Skipped),
            "{operation} ended {state:?}"
        );
    }

    // Snippets were extracted, enriched, and indexed.
    let snippets = env.snippet_store.get_for_commit("c1").await.unwrap();
    assert_eq!(snippets.len(), 2);
    for snippet in &snippets {
        assert!(snippet.has_summary(), "snippet should carry a mock summary");
    }

    // Repository metadata was refreshed.
    let repository = env.repo_store.get(repository.id()).await.unwrap().unwrap();
    assert_eq!(repository.tracking_branch(), "main");
    assert_eq!(repository.num_commits(), 1);
    assert_eq!(repository.num_tags(), 1);
    assert!(repository.has_been_scanned());

    let tags = env.repo_store.get_tags(repository.id()).await.unwrap();
    assert!(tags[0].is_version_tag());
}

#[tokio::test]
async fn test_commit_enrichments_are_generated_once() {
    let env = setup_env(StubGitAdapter::new(go_repo()));
    let repository = env
        .orchestrator
        .register_repository("https://github.com/acme/app.git")
        .await
        .unwrap();
    env.drain_queue().await;

    let enrichments = env.repo_store.get_commit_enrichments("c1").await.unwrap();
    let kinds: HashSet<EnrichmentKind> = enrichments.iter().map(|e| e.kind()).collect();
    assert!(kinds.contains(&EnrichmentKind::CommitDescription));
    assert!(kinds.contains(&EnrichmentKind::Cookbook));
    assert!(kinds.contains(&EnrichmentKind::ApiDoc));

    // Re-running the same commit enrichment is an existence-check no-op.
    let before = enrichments.len();
    env.commit_enrichments
        .create_commit_description(repository.id(), "c1")
        .await
        .unwrap();
    let after = env.repo_store.get_commit_enrichments("c1").await.unwrap();
    assert_eq!(after.len(), before);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let env = setup_env(StubGitAdapter::new(go_repo()));
    let repository = env
        .orchestrator
        .register_repository("https://github.com/acme/app.git")
        .await
        .unwrap();
    env.drain_queue().await;

    let first_ids: HashSet<String> = env
        .snippet_store
        .get_for_commit("c1")
        .await
        .unwrap()
        .iter()
        .map(|s| s.id().to_string())
        .collect();

    env.orchestrator
        .queue_index_tasks(repository.id(), true)
        .await
        .unwrap();
    env.drain_queue().await;

    let second_ids: HashSet<String> = env
        .snippet_store
        .get_for_commit("c1")
        .await
        .unwrap()
        .iter()
        .map(|s| s.id().to_string())
        .collect();
    assert_eq!(first_ids, second_ids);

    // Nothing failed on the second pass either.
    let nodes = env
        .status_store
        .load_with_hierarchy(TrackableType::Index, repository.id())
        .await
        .unwrap();
    assert!(nodes.iter().all(|n| n.state() != TaskState::Failed));

    // The second refresh found no changes and skipped.
    let refreshes: Vec<TaskState> = nodes
        .iter()
        .filter(|n| n.operation() == TaskOperation::RefreshWorkingCopy)
        .map(|n| n.state())
        .collect();
    assert_eq!(refreshes.len(), 2);
    assert!(refreshes.contains(&TaskState::Skipped));
}

#[tokio::test]
async fn test_renamed_file_with_same_content_keeps_snippet_ids() {
    let env = setup_env(StubGitAdapter::new(go_repo()));
    let repository = env
        .orchestrator
        .register_repository("https://github.com/acme/app.git")
        .await
        .unwrap();
    env.drain_queue().await;

    let first_ids: HashSet<String> = env
        .snippet_store
        .get_for_commit("c1")
        .await
        .unwrap()
        .iter()
        .map(|s| s.id().to_string())
        .collect();

    // New commit renames main.go; the tree reports a fresh blob id but the
    // byte content is identical.
    let mut state = go_repo();
    let main_content = state.blobs["blob-main"].clone();
    let commit2 = GitCommitInfo {
        commit_sha: "c2".to_string(),
        parent_sha: "c1".to_string(),
        author: "Bob <bob@example.com>".to_string(),
        date: chrono::Utc::now(),
        message: "rename main.go".to_string(),
    };
    let files2 = vec![
        GitFileInfo {
            blob_sha: "blob-main-renamed".to_string(),
            path: "cmd/app.go".to_string(),
            size: 120,
        },
        GitFileInfo {
            blob_sha: "blob-util".to_string(),
            path: "pkg/util.go".to_string(),
            size: 80,
        },
    ];
    state.blobs.insert("blob-main-renamed".to_string(), main_content);
    state.files_by_commit = HashMap::from([
        ("c1".to_string(), state.files_by_commit["c1"].clone()),
        ("c2".to_string(), files2),
    ]);
    state.commits = vec![commit2, state.commits[0].clone()];
    env.git.set_state(state).await;

    env.orchestrator
        .queue_index_tasks(repository.id(), true)
        .await
        .unwrap();
    env.drain_queue().await;

    let renamed_ids: HashSet<String> = env
        .snippet_store
        .get_for_commit("c2")
        .await
        .unwrap()
        .iter()
        .map(|s| s.id().to_string())
        .collect();
    // The renamed file's snippet inherited its id from the first run.
    assert!(!renamed_ids.is_empty());
    assert!(renamed_ids.is_subset(&first_ids));
}

#[tokio::test]
async fn test_empty_repository_skips_phases_two_to_five() {
    let env = setup_env(StubGitAdapter::empty());
    let repository = env
        .orchestrator
        .register_repository("https://github.com/acme/empty.git")
        .await
        .unwrap();
    env.drain_queue().await;

    let phases = top_level_phase_states(&env, repository.id()).await;
    assert_eq!(phases.len(), 5);
    for (operation, state) in &phases {
        match operation {
            TaskOperation::RefreshWorkingCopy => assert_eq!(*state, TaskState::Completed),
            _ => assert_eq!(*state, TaskState::Skipped, "{operation} should skip"),
        }
    }

    // Search over the empty repository returns nothing.
    let hits = env
        .search
        .search(repolens::MultiSearchRequest {
            keywords: Some(vec!["main".to_string()]),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_delete_repository_cascades() {
    let env = setup_env(StubGitAdapter::new(go_repo()));
    let repository = env
        .orchestrator
        .register_repository("https://github.com/acme/app.git")
        .await
        .unwrap();
    env.drain_queue().await;

    env.orchestrator
        .delete_repository(repository.id())
        .await
        .unwrap();

    assert!(env.repo_store.get(repository.id()).await.unwrap().is_none());
    assert!(env
        .snippet_store
        .get_for_commit("c1")
        .await
        .unwrap()
        .is_empty());
    let nodes = env
        .status_store
        .load_with_hierarchy(TrackableType::Index, repository.id())
        .await
        .unwrap();
    assert!(nodes.is_empty());

    // Search finds nothing afterwards.
    let hits = env
        .search
        .search(repolens::MultiSearchRequest {
            keywords: Some(vec!["main".to_string(), "func".to_string()]),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(hits.is_empty());
}
