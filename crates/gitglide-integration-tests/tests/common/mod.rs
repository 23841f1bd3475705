//! Common test utilities for GitGlide integration tests
//!
//! This module provides:
//! - A harness wiring the real Vercel and Jules clients to mock servers
//! - Request builders for user and webhook traffic
//! - Shared payload fixtures

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use gitglide_api::{create_router, AppState, Backends, RemediationWorker, ServiceConfig};
use gitglide_core::adapters::{InMemoryCredentialVault, InMemoryEventQueue, InMemoryStore};
use gitglide_core::signature::compute_signature;
use gitglide_core::upstream::{JulesClient, VercelClient};
use gitglide_core::{CredentialVault, Provider, SecretToken, UserId};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USER: &str = "user-1";
pub const USER_HEADER: &str = "x-authenticated-user";
pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const PUBLIC_BASE_URL: &str = "https://glide.example.com";

pub fn user() -> UserId {
    UserId::new(USER).unwrap()
}

// ============================================================================
// Harness
// ============================================================================

/// Service wired to in-memory storage and mock upstreams
pub struct Harness {
    pub state: AppState,
    pub backends: Backends,
    pub vercel: MockServer,
    pub jules: MockServer,
    pub store: InMemoryStore,
    pub queue: InMemoryEventQueue,
    pub vault: InMemoryCredentialVault,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut ServiceConfig)) -> Self {
        let vercel = MockServer::start().await;
        let jules = MockServer::start().await;

        let mut config = ServiceConfig::default();
        config.upstream.vercel_api_url = vercel.uri();
        config.upstream.jules_api_url = jules.uri();
        config.autofix.public_base_url = Some(PUBLIC_BASE_URL.to_string());
        configure(&mut config);

        let upstream = config.upstream_config();
        let store = InMemoryStore::new();
        let queue = InMemoryEventQueue::new();
        let vault = InMemoryCredentialVault::new();

        let backends = Backends {
            vault: Arc::new(vault.clone()),
            configs: Arc::new(store.clone()),
            logs: Arc::new(store.clone()),
            queue: Arc::new(queue.clone()),
            platform: Arc::new(VercelClient::new(&upstream).unwrap()),
            agent: Arc::new(JulesClient::new(&upstream).unwrap()),
        };
        let metrics = gitglide_api::ServiceMetrics::new().unwrap();
        let state = AppState::new(config, &backends, metrics);

        Self {
            state,
            backends,
            vercel,
            jules,
            store,
            queue,
            vault,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub fn worker(&self) -> RemediationWorker {
        self.backends
            .worker(&self.state.config, self.state.metrics.clone())
            .with_poll_timeout(Duration::from_millis(50))
    }

    pub async fn connect(&self, provider: Provider, token: &str) {
        self.vault
            .set_token(&user(), provider, SecretToken::new(token))
            .await
            .unwrap();
    }

    pub async fn connect_all(&self) {
        self.connect(Provider::Vercel, "vercel-token").await;
        self.connect(Provider::Jules, "jules-key").await;
    }

    /// Mount a webhook registration answer and enable auto-fix for `project_id`
    pub async fn enable(&self, project_id: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/webhooks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "hook_1",
                "secret": WEBHOOK_SECRET
            })))
            .mount(&self.vercel)
            .await;

        let (status, body) = self.send(toggle_request(project_id, true)).await;
        assert_eq!(status, StatusCode::OK, "enable failed: {}", body);
    }

    /// Mount a linked deployment detail for `deployment_id`
    pub async fn mount_deployment(&self, deployment_id: &str, meta: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v13/deployments/{}", deployment_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "web",
                "meta": meta
            })))
            .mount(&self.vercel)
            .await;
    }
}

// ============================================================================
// Request Builders
// ============================================================================

pub fn user_request(http_method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(http_method)
        .uri(uri)
        .header(USER_HEADER, USER);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn toggle_request(project_id: &str, enabled: bool) -> Request<Body> {
    user_request(
        Method::POST,
        "/api/integrations/vercel/projects/toggle",
        Some(json!({ "projectId": project_id, "enabled": enabled })),
    )
}

pub fn signed_delivery(body: &Value, secret: &str) -> Request<Body> {
    let raw = body.to_string().into_bytes();
    let signature = compute_signature(secret, &raw).unwrap();
    Request::builder()
        .method(Method::POST)
        .uri("/api/webhooks/vercel")
        .header("content-type", "application/json")
        .header("x-vercel-signature", signature)
        .body(Body::from(raw))
        .unwrap()
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn deployment_event(event_type: &str, project_id: &str, deployment_id: &str) -> Value {
    json!({
        "id": "evt_1",
        "type": event_type,
        "createdAt": 1_700_000_000_000_i64,
        "payload": {
            "project": { "id": project_id },
            "deployment": {
                "id": deployment_id,
                "url": "web-git-main-acme.vercel.app",
                "name": "web"
            }
        }
    })
}

pub fn linked_meta() -> Value {
    json!({
        "githubCommitOrg": "acme",
        "githubCommitRepo": "web",
        "githubCommitRef": "main"
    })
}
