//! Tests for the webhook receiver.

use super::*;
use crate::adapters::{InMemoryEventQueue, InMemoryStore};
use crate::integration_config::AutofixSettings;
use crate::signature::compute_signature;
use crate::test_support::{project_id, user_id};
use crate::webhook_log::WebhookLogStore;
use std::time::Duration;

const BODY: &str = r#"{"type":"deployment.error","payload":{"project":{"id":"proj_1"},"deployment":{"id":"dep_9"}}}"#;

struct Harness {
    receiver: WebhookReceiver,
    store: InMemoryStore,
    queue: InMemoryEventQueue,
}

async fn harness() -> Harness {
    let store = InMemoryStore::new();
    let queue = InMemoryEventQueue::new();

    let settings = AutofixSettings {
        webhook_id: "hook_1".to_string(),
        secret: "s3cr3t".to_string(),
    };
    store
        .upsert(
            &user_id(),
            &CapabilityKey::for_vercel_project(&project_id()),
            true,
            settings.to_value(),
        )
        .await
        .unwrap();

    let receiver = WebhookReceiver::new(
        Arc::new(store.clone()),
        Arc::new(queue.clone()),
        ReceiverSettings::default(),
    );
    Harness {
        receiver,
        store,
        queue,
    }
}

fn sign(secret: &str, body: &str) -> String {
    compute_signature(secret, body.as_bytes()).unwrap()
}

#[tokio::test]
async fn test_valid_delivery_is_dispatched() {
    let h = harness().await;

    let outcome = h
        .receiver
        .receive(BODY.as_bytes(), Some(&sign("s3cr3t", BODY)))
        .await
        .unwrap();
    assert!(matches!(outcome, ReceiveOutcome::Dispatched { .. }));

    let queued = h
        .queue
        .receive(Duration::from_millis(10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(queued.event.user_id, user_id());
    assert_eq!(queued.event.project_id.as_str(), "proj_1");
    assert_eq!(queued.event.deployment_id.as_str(), "dep_9");
    assert_eq!(queued.event.event_type, "deployment.error");
    assert_eq!(
        queued.event.payload,
        serde_json::from_str::<serde_json::Value>(BODY).unwrap()
    );
}

#[tokio::test]
async fn test_canceled_events_are_tracked() {
    let h = harness().await;
    let body = BODY.replace("deployment.error", "deployment.canceled");

    let outcome = h
        .receiver
        .receive(body.as_bytes(), Some(&sign("s3cr3t", &body)))
        .await
        .unwrap();
    assert!(matches!(outcome, ReceiveOutcome::Dispatched { .. }));
}

#[tokio::test]
async fn test_wrong_secret_is_rejected_without_side_effects() {
    let h = harness().await;

    let result = h
        .receiver
        .receive(BODY.as_bytes(), Some(&sign("wrong", BODY)))
        .await;
    assert!(matches!(result, Err(ReceiveError::InvalidSignature)));
    assert_eq!(h.queue.pending_count().await, 0);
    assert_eq!(h.store.log_count().await, 0);
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let h = harness().await;

    let result = h.receiver.receive(BODY.as_bytes(), None).await;
    assert!(matches!(result, Err(ReceiveError::MissingSignature)));

    let result = h.receiver.receive(BODY.as_bytes(), Some("")).await;
    assert!(matches!(result, Err(ReceiveError::MissingSignature)));
}

#[tokio::test]
async fn test_unparseable_body_is_rejected() {
    let h = harness().await;

    let result = h.receiver.receive(b"not json", Some("sha1=00")).await;
    assert!(matches!(result, Err(ReceiveError::MalformedPayload { .. })));
}

#[tokio::test]
async fn test_untracked_event_type_is_acknowledged() {
    let h = harness().await;
    let body = BODY.replace("deployment.error", "deployment.succeeded");

    // Signature is never checked for untracked types
    let outcome = h
        .receiver
        .receive(body.as_bytes(), Some("sha1=bogus"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReceiveOutcome::Ignored(IgnoreReason::UntrackedEventType(
            "deployment.succeeded".to_string()
        ))
    );
    assert_eq!(h.queue.pending_count().await, 0);
}

#[tokio::test]
async fn test_unknown_project_is_acknowledged() {
    let h = harness().await;
    let body = BODY.replace("proj_1", "proj_unknown");

    let outcome = h
        .receiver
        .receive(body.as_bytes(), Some(&sign("s3cr3t", &body)))
        .await
        .unwrap();
    assert_eq!(outcome, ReceiveOutcome::Ignored(IgnoreReason::NoEnabledConfig));
    assert_eq!(h.queue.pending_count().await, 0);
    assert!(h
        .store
        .list_recent(&crate::webhook_log::WebhookLogQuery::for_user(user_id()))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_disabled_project_is_acknowledged() {
    let h = harness().await;
    h.store
        .update(
            &user_id(),
            &CapabilityKey::for_vercel_project(&project_id()),
            false,
            serde_json::json!({}),
        )
        .await
        .unwrap();

    let outcome = h
        .receiver
        .receive(BODY.as_bytes(), Some(&sign("s3cr3t", BODY)))
        .await
        .unwrap();
    assert_eq!(outcome, ReceiveOutcome::Ignored(IgnoreReason::NoEnabledConfig));
}

#[tokio::test]
async fn test_missing_identifiers_are_acknowledged() {
    let h = harness().await;
    let body = r#"{"type":"deployment.error","payload":{"project":{"id":"proj_1"}}}"#;

    let outcome = h
        .receiver
        .receive(body.as_bytes(), Some(&sign("s3cr3t", body)))
        .await
        .unwrap();
    assert_eq!(outcome, ReceiveOutcome::Ignored(IgnoreReason::MissingIdentifiers));
}

#[tokio::test]
async fn test_dispatch_failure_is_an_error() {
    let store = InMemoryStore::new();
    store
        .upsert(
            &user_id(),
            &CapabilityKey::for_vercel_project(&project_id()),
            true,
            AutofixSettings {
                webhook_id: "hook_1".to_string(),
                secret: "s3cr3t".to_string(),
            }
            .to_value(),
        )
        .await
        .unwrap();
    let queue = InMemoryEventQueue::with_capacity(0);
    let receiver = WebhookReceiver::new(
        Arc::new(store),
        Arc::new(queue),
        ReceiverSettings::default(),
    );

    let result = receiver
        .receive(BODY.as_bytes(), Some(&sign("s3cr3t", BODY)))
        .await;
    assert!(matches!(result, Err(ReceiveError::Dispatch(_))));
}

#[tokio::test]
async fn test_config_with_secret_only_still_authenticates() {
    let store = InMemoryStore::new();
    store
        .upsert(
            &user_id(),
            &CapabilityKey::for_vercel_project(&project_id()),
            true,
            serde_json::json!({ "secret": "s3cr3t" }),
        )
        .await
        .unwrap();
    let queue = InMemoryEventQueue::new();
    let receiver = WebhookReceiver::new(
        Arc::new(store),
        Arc::new(queue.clone()),
        ReceiverSettings::default(),
    );

    let outcome = receiver
        .receive(BODY.as_bytes(), Some(&sign("s3cr3t", BODY)))
        .await
        .unwrap();
    assert!(matches!(outcome, ReceiveOutcome::Dispatched { .. }));
    assert_eq!(queue.pending_count().await, 1);
}

#[test]
fn test_error_categories() {
    assert_eq!(
        ReceiveError::InvalidSignature.error_category(),
        ErrorCategory::Security
    );
    assert_eq!(
        ReceiveError::MalformedPayload {
            message: "x".to_string()
        }
        .error_category(),
        ErrorCategory::Permanent
    );
}
