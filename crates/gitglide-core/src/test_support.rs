//! Shared fixtures and recording mocks for unit tests.

use crate::credential_vault::SecretToken;
use crate::event_queue::BuildFailedEvent;
use crate::upstream::{
    AgentSessionService, CreateWebhookRequest, CreatedSession, CreatedWebhook, DeploymentDetail,
    DeploymentPlatform, DeploymentSummary, ProjectSummary, SessionRequest, UpstreamError,
    WebhookDeletion,
};
use crate::{DeploymentId, ProjectId, UserId};
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};

pub fn user_id() -> UserId {
    UserId::new("u1").unwrap()
}

pub fn project_id() -> ProjectId {
    ProjectId::new("proj_1").unwrap()
}

pub fn sample_event(deployment: &str) -> BuildFailedEvent {
    BuildFailedEvent {
        user_id: user_id(),
        project_id: project_id(),
        deployment_id: DeploymentId::new(deployment).unwrap(),
        event_type: "deployment.error".to_string(),
        payload: json!({
            "type": "deployment.error",
            "payload": {
                "project": { "id": "proj_1" },
                "deployment": { "id": deployment, "url": "web-abc.vercel.app" }
            }
        }),
    }
}

pub fn linked_deployment() -> DeploymentDetail {
    serde_json::from_value(json!({
        "name": "web",
        "meta": {
            "githubCommitOrg": "acme",
            "githubCommitRepo": "web",
            "githubCommitRef": "main"
        }
    }))
    .unwrap()
}

fn http_error(service: &'static str, status: u16, body: &str) -> UpstreamError {
    UpstreamError::HttpError {
        service,
        status,
        body: body.to_string(),
    }
}

// ============================================================================
// Deployment platform mock
// ============================================================================

/// Scripted response for a mocked platform call
#[derive(Clone)]
pub enum Scripted<T> {
    Ok(T),
    Status(u16),
    Timeout,
}

impl<T: Clone> Scripted<T> {
    fn resolve(&self, service: &'static str) -> Result<T, UpstreamError> {
        match self {
            Self::Ok(v) => Ok(v.clone()),
            Self::Status(status) => Err(http_error(service, *status, "scripted failure")),
            Self::Timeout => Err(UpstreamError::Timeout {
                service,
                timeout_seconds: 10,
            }),
        }
    }
}

#[derive(Clone)]
pub struct MockPlatform {
    pub create_response: Arc<Mutex<Scripted<CreatedWebhook>>>,
    pub delete_response: Arc<Mutex<Scripted<WebhookDeletion>>>,
    pub deployment_response: Arc<Mutex<Scripted<DeploymentDetail>>>,
    pub created: Arc<Mutex<Vec<CreateWebhookRequest>>>,
    pub deleted: Arc<Mutex<Vec<String>>>,
    pub deployment_lookups: Arc<Mutex<Vec<String>>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            create_response: Arc::new(Mutex::new(Scripted::Ok(CreatedWebhook {
                id: "hook_1".to_string(),
                secret: "s3cr3t".to_string(),
            }))),
            delete_response: Arc::new(Mutex::new(Scripted::Ok(WebhookDeletion::Deleted))),
            deployment_response: Arc::new(Mutex::new(Scripted::Ok(linked_deployment()))),
            created: Arc::new(Mutex::new(Vec::new())),
            deleted: Arc::new(Mutex::new(Vec::new())),
            deployment_lookups: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_create(&self, response: Scripted<CreatedWebhook>) {
        *self.create_response.lock().unwrap() = response;
    }

    pub fn set_delete(&self, response: Scripted<WebhookDeletion>) {
        *self.delete_response.lock().unwrap() = response;
    }

    pub fn set_deployment(&self, response: Scripted<DeploymentDetail>) {
        *self.deployment_response.lock().unwrap() = response;
    }
}

#[async_trait]
impl DeploymentPlatform for MockPlatform {
    async fn create_webhook(
        &self,
        _token: &SecretToken,
        request: &CreateWebhookRequest,
    ) -> Result<CreatedWebhook, UpstreamError> {
        self.created.lock().unwrap().push(request.clone());
        self.create_response.lock().unwrap().resolve("vercel")
    }

    async fn delete_webhook(
        &self,
        _token: &SecretToken,
        webhook_id: &str,
    ) -> Result<WebhookDeletion, UpstreamError> {
        self.deleted.lock().unwrap().push(webhook_id.to_string());
        self.delete_response.lock().unwrap().resolve("vercel")
    }

    async fn get_deployment(
        &self,
        _token: &SecretToken,
        deployment_id: &DeploymentId,
    ) -> Result<DeploymentDetail, UpstreamError> {
        self.deployment_lookups
            .lock()
            .unwrap()
            .push(deployment_id.to_string());
        self.deployment_response.lock().unwrap().resolve("vercel")
    }

    async fn list_deployments(
        &self,
        _token: &SecretToken,
        _limit: usize,
    ) -> Result<Vec<DeploymentSummary>, UpstreamError> {
        Ok(Vec::new())
    }

    async fn list_projects(&self, _token: &SecretToken) -> Result<Vec<ProjectSummary>, UpstreamError> {
        Ok(Vec::new())
    }
}

// ============================================================================
// Agent service mock
// ============================================================================

#[derive(Clone)]
pub struct MockAgent {
    pub response: Arc<Mutex<Scripted<CreatedSession>>>,
    pub requests: Arc<Mutex<Vec<SessionRequest>>>,
}

impl MockAgent {
    pub fn new() -> Self {
        Self {
            response: Arc::new(Mutex::new(Scripted::Ok(CreatedSession {
                id: "sess_42".to_string(),
            }))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_response(&self, response: Scripted<CreatedSession>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AgentSessionService for MockAgent {
    async fn create_session(
        &self,
        _api_key: &SecretToken,
        request: &SessionRequest,
    ) -> Result<CreatedSession, UpstreamError> {
        self.requests.lock().unwrap().push(request.clone());
        self.response.lock().unwrap().resolve("jules")
    }
}
