//! Stub upstreams and state builders for router and worker tests.

use crate::{AppState, Backends, ServiceConfig, ServiceMetrics};
use async_trait::async_trait;
use gitglide_core::adapters::{InMemoryCredentialVault, InMemoryEventQueue, InMemoryStore};
use gitglide_core::upstream::{
    AgentSessionService, CreateWebhookRequest, CreatedSession, CreatedWebhook, DeploymentDetail,
    DeploymentPlatform, DeploymentSummary, ProjectSummary, SessionRequest, WebhookDeletion,
};
use gitglide_core::{DeploymentId, SecretToken, UpstreamError};
use serde_json::json;
use std::sync::{Arc, Mutex};

pub const SECRET: &str = "s3cr3t";

pub fn unauthorized() -> UpstreamError {
    UpstreamError::HttpError {
        service: "vercel",
        status: 403,
        body: "{\"error\":{\"code\":\"forbidden\"}}".to_string(),
    }
}

/// Deployment platform stub answering from preset values
#[derive(Clone)]
pub struct StubPlatform {
    pub projects: Arc<Mutex<Result<Vec<ProjectSummary>, u16>>>,
    pub deployments: Arc<Mutex<Vec<DeploymentSummary>>>,
    pub detail: Arc<Mutex<DeploymentDetail>>,
    pub created: Arc<Mutex<Vec<CreateWebhookRequest>>>,
    pub deleted: Arc<Mutex<Vec<String>>>,
}

impl StubPlatform {
    pub fn new() -> Self {
        let detail = serde_json::from_value(json!({
            "name": "web",
            "meta": {
                "githubCommitOrg": "acme",
                "githubCommitRepo": "web",
                "githubCommitRef": "main"
            }
        }))
        .unwrap();

        Self {
            projects: Arc::new(Mutex::new(Ok(Vec::new()))),
            deployments: Arc::new(Mutex::new(Vec::new())),
            detail: Arc::new(Mutex::new(detail)),
            created: Arc::new(Mutex::new(Vec::new())),
            deleted: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl DeploymentPlatform for StubPlatform {
    async fn create_webhook(
        &self,
        _token: &SecretToken,
        request: &CreateWebhookRequest,
    ) -> Result<CreatedWebhook, UpstreamError> {
        self.created.lock().unwrap().push(request.clone());
        Ok(CreatedWebhook {
            id: "wh_1".to_string(),
            secret: SECRET.to_string(),
        })
    }

    async fn delete_webhook(
        &self,
        _token: &SecretToken,
        webhook_id: &str,
    ) -> Result<WebhookDeletion, UpstreamError> {
        self.deleted.lock().unwrap().push(webhook_id.to_string());
        Ok(WebhookDeletion::Deleted)
    }

    async fn get_deployment(
        &self,
        _token: &SecretToken,
        _deployment_id: &DeploymentId,
    ) -> Result<DeploymentDetail, UpstreamError> {
        Ok(self.detail.lock().unwrap().clone())
    }

    async fn list_deployments(
        &self,
        _token: &SecretToken,
        _limit: usize,
    ) -> Result<Vec<DeploymentSummary>, UpstreamError> {
        Ok(self.deployments.lock().unwrap().clone())
    }

    async fn list_projects(&self, _token: &SecretToken) -> Result<Vec<ProjectSummary>, UpstreamError> {
        match &*self.projects.lock().unwrap() {
            Ok(projects) => Ok(projects.clone()),
            Err(403) => Err(unauthorized()),
            Err(status) => Err(UpstreamError::HttpError {
                service: "vercel",
                status: *status,
                body: String::new(),
            }),
        }
    }
}

/// Agent stub recording every session request
#[derive(Clone, Default)]
pub struct StubAgent {
    pub requests: Arc<Mutex<Vec<SessionRequest>>>,
    pub reject_with: Arc<Mutex<Option<u16>>>,
}

#[async_trait]
impl AgentSessionService for StubAgent {
    async fn create_session(
        &self,
        _api_key: &SecretToken,
        request: &SessionRequest,
    ) -> Result<CreatedSession, UpstreamError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(status) = *self.reject_with.lock().unwrap() {
            return Err(UpstreamError::HttpError {
                service: "jules",
                status,
                body: "rejected".to_string(),
            });
        }
        Ok(CreatedSession {
            id: "sess_42".to_string(),
        })
    }
}

/// Everything a router or worker test needs to inspect afterwards
pub struct TestContext {
    pub state: AppState,
    pub backends: Backends,
    pub store: InMemoryStore,
    pub queue: InMemoryEventQueue,
    pub vault: InMemoryCredentialVault,
    pub platform: StubPlatform,
    pub agent: StubAgent,
}

pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.autofix.public_base_url = Some("https://glide.example.com".to_string());
    config
}

pub fn test_context() -> TestContext {
    test_context_with(test_config())
}

pub fn test_context_with(config: ServiceConfig) -> TestContext {
    let store = InMemoryStore::new();
    let queue = InMemoryEventQueue::new();
    let vault = InMemoryCredentialVault::new();
    let platform = StubPlatform::new();
    let agent = StubAgent::default();

    let backends = Backends {
        vault: Arc::new(vault.clone()),
        configs: Arc::new(store.clone()),
        logs: Arc::new(store.clone()),
        queue: Arc::new(queue.clone()),
        platform: Arc::new(platform.clone()),
        agent: Arc::new(agent.clone()),
    };
    let metrics = ServiceMetrics::new().unwrap();
    let state = AppState::new(config, &backends, metrics);

    TestContext {
        state,
        backends,
        store,
        queue,
        vault,
        platform,
        agent,
    }
}
