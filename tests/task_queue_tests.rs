//! Queue semantics: dedup, strict priority, FIFO within a priority.

mod common;

use std::sync::Arc;

use serde_json::json;

use common::{setup_env, StubGitAdapter};
use repolens::{QueuePriority, Task, TaskOperation, TaskQueue};

#[tokio::test]
async fn test_enqueue_take_round_trip() {
    let env = setup_env(StubGitAdapter::empty());
    let task = Task::create(
        TaskOperation::RefreshWorkingCopy,
        QueuePriority::UserInitiated.value(),
        json!({"index_id": 123}),
    );

    assert!(env.queue.enqueue(&task).await.unwrap());

    let taken = env.queue.take().await.unwrap().expect("queued task");
    assert_eq!(taken.dedup_key(), task.dedup_key());
    assert_eq!(taken.operation(), TaskOperation::RefreshWorkingCopy);
    assert_eq!(taken.priority(), QueuePriority::UserInitiated.value());
    assert_eq!(taken.index_id(), Some(123));

    // Taken means removed.
    assert!(env.queue.take().await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_dedup_key_is_dropped() {
    let env = setup_env(StubGitAdapter::empty());
    let original = Task::create(
        TaskOperation::ExtractSnippets,
        QueuePriority::UserInitiated.value(),
        json!({"index_id": 1}),
    );
    let duplicate = Task::create(
        TaskOperation::ExtractSnippets,
        QueuePriority::Background.value(),
        json!({"index_id": 1}),
    );

    assert!(env.queue.enqueue(&original).await.unwrap());
    assert!(!env.queue.enqueue(&duplicate).await.unwrap());

    // The original task keeps its priority.
    let taken = env.queue.take().await.unwrap().unwrap();
    assert_eq!(taken.priority(), QueuePriority::UserInitiated.value());
    assert!(env.queue.take().await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_enqueue_of_same_key_yields_one_task() {
    let env = setup_env(StubGitAdapter::empty());
    let queue = env.queue.clone();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let queue: Arc<_> = queue.clone();
        handles.push(tokio::spawn(async move {
            let task = Task::create(
                TaskOperation::CreateBm25Index,
                QueuePriority::Normal.value(),
                json!({"index_id": 42}),
            );
            queue.enqueue(&task).await.unwrap()
        }));
    }
    let mut inserted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            inserted += 1;
        }
    }

    assert_eq!(inserted, 1);
    assert_eq!(env.queue.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_strict_priority_order() {
    let env = setup_env(StubGitAdapter::empty());
    let background = Task::create(
        TaskOperation::RefreshWorkingCopy,
        QueuePriority::Background.value(),
        json!({"index_id": 1}),
    );
    let user = Task::create(
        TaskOperation::RefreshWorkingCopy,
        QueuePriority::UserInitiated.value(),
        json!({"index_id": 2}),
    );
    let normal = Task::create(
        TaskOperation::RefreshWorkingCopy,
        QueuePriority::Normal.value(),
        json!({"index_id": 3}),
    );

    env.queue.enqueue(&background).await.unwrap();
    env.queue.enqueue(&user).await.unwrap();
    env.queue.enqueue(&normal).await.unwrap();

    let order: Vec<i64> = vec![
        env.queue.take().await.unwrap().unwrap().index_id().unwrap(),
        env.queue.take().await.unwrap().unwrap().index_id().unwrap(),
        env.queue.take().await.unwrap().unwrap().index_id().unwrap(),
    ];
    assert_eq!(order, vec![2, 3, 1]);
}

#[tokio::test]
async fn test_fifo_within_same_priority() {
    let env = setup_env(StubGitAdapter::empty());
    for index_id in 1..=3 {
        let task = Task::create(
            TaskOperation::EnrichSnippets,
            QueuePriority::Normal.value(),
            json!({"index_id": index_id}),
        );
        env.queue.enqueue(&task).await.unwrap();
        // created_at is the tiebreaker; make sure it differs.
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    for expected in 1..=3 {
        let taken = env.queue.take().await.unwrap().unwrap();
        assert_eq!(taken.index_id(), Some(expected));
    }
}

#[tokio::test]
async fn test_pipeline_offsets_preserve_phase_order() {
    let env = setup_env(StubGitAdapter::empty());
    env.orchestrator.queue_index_tasks(7, true).await.unwrap();

    let operations: Vec<TaskOperation> = env
        .queue
        .list(None)
        .await
        .unwrap()
        .iter()
        .map(|t| t.operation())
        .collect();
    assert_eq!(operations, TaskOperation::PIPELINE.to_vec());

    // A whole user-initiated pipeline outranks any background one.
    let lowest_user_priority = env
        .queue
        .list(None)
        .await
        .unwrap()
        .iter()
        .map(|t| t.priority())
        .min()
        .unwrap();
    assert!(lowest_user_priority > QueuePriority::Normal.value());
}

#[tokio::test]
async fn test_list_filters_by_operation() {
    let env = setup_env(StubGitAdapter::empty());
    env.orchestrator.queue_index_tasks(7, false).await.unwrap();

    let refreshes = env
        .queue
        .list(Some(TaskOperation::RefreshWorkingCopy))
        .await
        .unwrap();
    assert_eq!(refreshes.len(), 1);
    assert_eq!(refreshes[0].operation(), TaskOperation::RefreshWorkingCopy);
}
