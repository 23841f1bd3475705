//! Tests for the in-memory store.

use super::*;
use crate::webhook_log::SOURCE_VERCEL;
use crate::ProjectId;
use serde_json::json;

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn key(project: &str) -> CapabilityKey {
    CapabilityKey::for_vercel_project(&ProjectId::new(project).unwrap())
}

fn new_log(user_id: &str, deployment: &str) -> NewWebhookLog {
    NewWebhookLog {
        user_id: Some(user(user_id)),
        source: SOURCE_VERCEL.to_string(),
        event: "deployment.error".to_string(),
        deployment_id: Some(DeploymentId::new(deployment).unwrap()),
        payload: json!({ "type": "deployment.error" }),
    }
}

// ============================================================================
// Integration configs
// ============================================================================

#[tokio::test]
async fn test_upsert_keeps_single_row_per_user_and_key() {
    let store = InMemoryStore::new();

    store
        .upsert(&user("u1"), &key("p1"), true, json!({ "webhookId": "h1", "secret": "a" }))
        .await
        .unwrap();
    let second = store
        .upsert(&user("u1"), &key("p1"), true, json!({ "webhookId": "h2", "secret": "b" }))
        .await
        .unwrap();

    assert_eq!(store.config_count().await, 1);
    assert_eq!(second.config["webhookId"], "h2");
}

#[tokio::test]
async fn test_update_requires_existing_row() {
    let store = InMemoryStore::new();
    let result = store.update(&user("u1"), &key("p1"), false, json!({})).await;
    assert!(matches!(result, Err(StorageError::ConfigNotFound { .. })));
}

#[tokio::test]
async fn test_find_enabled_skips_disabled_rows() {
    let store = InMemoryStore::new();
    store
        .upsert(&user("u1"), &key("p1"), false, json!({}))
        .await
        .unwrap();
    assert!(store.find_enabled_by_key(&key("p1")).await.unwrap().is_none());

    store
        .upsert(&user("u2"), &key("p1"), true, json!({ "webhookId": "h", "secret": "s" }))
        .await
        .unwrap();
    let found = store.find_enabled_by_key(&key("p1")).await.unwrap().unwrap();
    assert_eq!(found.user_id, user("u2"));
}

#[tokio::test]
async fn test_list_for_user_filters_by_prefix() {
    let store = InMemoryStore::new();
    store
        .upsert(&user("u1"), &key("p1"), true, json!({}))
        .await
        .unwrap();
    store
        .upsert(&user("u1"), &key("p2"), false, json!({}))
        .await
        .unwrap();
    store
        .upsert(&user("u2"), &key("p3"), true, json!({}))
        .await
        .unwrap();

    let rows = store
        .list_for_user(&user("u1"), CapabilityKey::VERCEL_PROJECT_PREFIX)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

// ============================================================================
// Webhook logs
// ============================================================================

#[tokio::test]
async fn test_list_recent_is_newest_first_and_limited() {
    let store = InMemoryStore::new();
    for deployment in ["d1", "d2", "d3"] {
        store.create(new_log("u1", deployment)).await.unwrap();
    }
    store.create(new_log("u2", "d4")).await.unwrap();

    let query = WebhookLogQuery::for_user(user("u1")).with_limit(2);
    let logs = store.list_recent(&query).await.unwrap();

    let ids: Vec<_> = logs
        .iter()
        .map(|l| l.deployment_id.as_ref().unwrap().as_str())
        .collect();
    assert_eq!(ids, vec!["d3", "d2"]);
}

#[tokio::test]
async fn test_complete_is_single_shot() {
    let store = InMemoryStore::new();
    let log = store.create(new_log("u1", "d1")).await.unwrap();

    store
        .complete(
            &log.id,
            LogOutcome::Success {
                session_id: "s1".to_string(),
            },
        )
        .await
        .unwrap();

    let second = store
        .complete(
            &log.id,
            LogOutcome::Failed {
                error: "late".to_string(),
            },
        )
        .await;
    assert!(matches!(second, Err(StorageError::AlreadyTerminal { .. })));

    let stored = WebhookLogStore::get(&store, &log.id).await.unwrap().unwrap();
    assert_eq!(stored.status, LogStatus::Success);
}

#[tokio::test]
async fn test_complete_unknown_log() {
    let store = InMemoryStore::new();
    let result = store
        .complete(
            &WebhookLogId::new(),
            LogOutcome::Failed {
                error: "x".to_string(),
            },
        )
        .await;
    assert!(matches!(result, Err(StorageError::LogNotFound { .. })));
}

#[tokio::test]
async fn test_find_active_ignores_failed_rows() {
    let store = InMemoryStore::new();
    let failed = store.create(new_log("u1", "d1")).await.unwrap();
    store
        .complete(
            &failed.id,
            LogOutcome::Failed {
                error: "x".to_string(),
            },
        )
        .await
        .unwrap();

    let deployment = DeploymentId::new("d1").unwrap();
    assert!(store
        .find_active_for_deployment(&deployment)
        .await
        .unwrap()
        .is_none());

    let processing = store.create(new_log("u1", "d1")).await.unwrap();
    let found = store
        .find_active_for_deployment(&deployment)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, processing.id);
}

#[tokio::test]
async fn test_create_unless_active_returns_existing_row() {
    let store = InMemoryStore::new();

    let first = match store.create_unless_active(new_log("u1", "d1")).await.unwrap() {
        LogCreation::Created(log) => log,
        other => panic!("expected a new row, got {:?}", other),
    };
    let second = store.create_unless_active(new_log("u1", "d1")).await.unwrap();

    assert_eq!(second, LogCreation::Existing(first));
    assert_eq!(store.log_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_create_unless_active_inserts_once() {
    let store = InMemoryStore::new();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.create_unless_active(new_log("u1", "d1")).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if let LogCreation::Created(_) = handle.await.unwrap().unwrap() {
            created += 1;
        }
    }
    assert_eq!(created, 1);
    assert_eq!(store.log_count().await, 1);
}

#[tokio::test]
async fn test_stale_processing_uses_cutoff() {
    let store = InMemoryStore::new();
    let log = store.create(new_log("u1", "d1")).await.unwrap();

    let past = log.updated_at.subtract_duration(std::time::Duration::from_secs(60));
    assert!(store.list_stale_processing(past).await.unwrap().is_empty());

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let stale = store.list_stale_processing(Timestamp::now()).await.unwrap();
    assert_eq!(stale.len(), 1);
}
