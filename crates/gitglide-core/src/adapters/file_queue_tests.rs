//! Tests for the file-backed event queue.

use super::*;
use crate::test_support::sample_event;
use tempfile::TempDir;

async fn receive_now(queue: &FileBackedEventQueue) -> Option<QueuedEvent> {
    queue.receive(Duration::from_millis(10)).await.unwrap()
}

#[tokio::test]
async fn test_published_event_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().to_path_buf();

    let message_id = {
        let queue = FileBackedEventQueue::open(data_dir.clone()).await.unwrap();
        queue.publish(sample_event("dpl_1")).await.unwrap()
    };

    let reopened = FileBackedEventQueue::open(data_dir).await.unwrap();
    assert_eq!(reopened.pending_count().await, 1);

    let received = receive_now(&reopened).await.unwrap();
    assert_eq!(received.message_id, message_id);
    assert_eq!(received.event.deployment_id.as_str(), "dpl_1");
}

#[tokio::test]
async fn test_in_flight_event_is_pending_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().to_path_buf();

    {
        let queue = FileBackedEventQueue::open(data_dir.clone()).await.unwrap();
        queue.publish(sample_event("dpl_1")).await.unwrap();
        queue.publish(sample_event("dpl_2")).await.unwrap();
        let first = receive_now(&queue).await.unwrap();
        assert_eq!(first.event.deployment_id.as_str(), "dpl_1");
    }

    let reopened = FileBackedEventQueue::open(data_dir).await.unwrap();
    assert_eq!(reopened.pending_count().await, 2);
    let first = receive_now(&reopened).await.unwrap();
    assert_eq!(first.event.deployment_id.as_str(), "dpl_1");
}

#[tokio::test]
async fn test_settled_events_are_not_restored() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().to_path_buf();

    {
        let queue = FileBackedEventQueue::open(data_dir.clone()).await.unwrap();
        queue.publish(sample_event("dpl_1")).await.unwrap();
        queue.publish(sample_event("dpl_2")).await.unwrap();

        let done = receive_now(&queue).await.unwrap();
        queue.complete(&done.receipt).await.unwrap();
        let failed = receive_now(&queue).await.unwrap();
        queue
            .dead_letter(&failed.receipt, "Vercel token not found".to_string())
            .await
            .unwrap();
    }

    let reopened = FileBackedEventQueue::open(data_dir).await.unwrap();
    assert_eq!(reopened.pending_count().await, 0);
    assert!(receive_now(&reopened).await.is_none());

    let dead = reopened.dead_letters().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].reason, "Vercel token not found");
    assert_eq!(dead[0].event.deployment_id.as_str(), "dpl_2");
}

#[tokio::test]
async fn test_publish_fails_when_full_and_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let queue = FileBackedEventQueue::open(temp_dir.path().to_path_buf())
        .await
        .unwrap()
        .with_capacity(0);

    let result = queue.publish(sample_event("dpl_1")).await;

    assert!(matches!(result, Err(QueueError::QueueFull { capacity: 0 })));
    assert!(!queue.snapshot_path().exists());
}

#[tokio::test]
async fn test_corrupt_snapshot_fails_open() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(QUEUE_FILE_NAME), b"{ not json").unwrap();

    let result = FileBackedEventQueue::open(temp_dir.path().to_path_buf()).await;
    assert!(matches!(result, Err(QueueError::Unavailable { .. })));
}
