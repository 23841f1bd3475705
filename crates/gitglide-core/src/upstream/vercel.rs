//! # Vercel Client
//!
//! reqwest-backed [`DeploymentPlatform`] speaking the Vercel REST API with a
//! bearer token.

use super::{
    build_http_client, error_from_response, map_request_error, CreateWebhookRequest,
    CreatedWebhook, DeploymentDetail, DeploymentPlatform, DeploymentSummary, ProjectSummary,
    UpstreamConfig, UpstreamError, WebhookDeletion,
};
use crate::credential_vault::SecretToken;
use crate::DeploymentId;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const SERVICE: &str = "vercel";

#[derive(Deserialize)]
struct DeploymentList {
    #[serde(default)]
    deployments: Vec<DeploymentSummary>,
}

#[derive(Deserialize)]
struct ProjectList {
    #[serde(default)]
    projects: Vec<ProjectSummary>,
}

/// Vercel REST API client
#[derive(Debug, Clone)]
pub struct VercelClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl VercelClient {
    /// Create a client from upstream configuration
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            http_client: build_http_client(config)?,
            base_url: config.vercel_api_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_error(&self, error: reqwest::Error) -> UpstreamError {
        map_request_error(SERVICE, self.timeout, error)
    }
}

#[async_trait]
impl DeploymentPlatform for VercelClient {
    #[instrument(skip(self, token), fields(project_ids = ?request.project_ids))]
    async fn create_webhook(
        &self,
        token: &SecretToken,
        request: &CreateWebhookRequest,
    ) -> Result<CreatedWebhook, UpstreamError> {
        let response = self
            .http_client
            .post(self.url("/v1/webhooks"))
            .bearer_auth(token.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        if !response.status().is_success() {
            return Err(error_from_response(SERVICE, response).await);
        }

        let created: CreatedWebhook = response.json().await.map_err(|e| self.map_error(e))?;
        debug!(webhook_id = %created.id, "Vercel webhook created");
        Ok(created)
    }

    #[instrument(skip(self, token))]
    async fn delete_webhook(
        &self,
        token: &SecretToken,
        webhook_id: &str,
    ) -> Result<WebhookDeletion, UpstreamError> {
        let response = self
            .http_client
            .delete(self.url(&format!("/v1/webhooks/{}", webhook_id)))
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if status.is_success() {
            Ok(WebhookDeletion::Deleted)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Ok(WebhookDeletion::AlreadyGone)
        } else {
            Err(error_from_response(SERVICE, response).await)
        }
    }

    #[instrument(skip(self, token))]
    async fn get_deployment(
        &self,
        token: &SecretToken,
        deployment_id: &DeploymentId,
    ) -> Result<DeploymentDetail, UpstreamError> {
        let response = self
            .http_client
            .get(self.url(&format!("/v13/deployments/{}", deployment_id)))
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Deployment lookup returned non-success status");
        }

        response.json().await.map_err(|e| self.map_error(e))
    }

    #[instrument(skip(self, token))]
    async fn list_deployments(
        &self,
        token: &SecretToken,
        limit: usize,
    ) -> Result<Vec<DeploymentSummary>, UpstreamError> {
        let response = self
            .http_client
            .get(self.url("/v6/deployments"))
            .query(&[("limit", limit.to_string())])
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        if !response.status().is_success() {
            return Err(error_from_response(SERVICE, response).await);
        }

        let list: DeploymentList = response.json().await.map_err(|e| self.map_error(e))?;
        Ok(list.deployments)
    }

    #[instrument(skip(self, token))]
    async fn list_projects(&self, token: &SecretToken) -> Result<Vec<ProjectSummary>, UpstreamError> {
        let response = self
            .http_client
            .get(self.url("/v9/projects"))
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        if !response.status().is_success() {
            return Err(error_from_response(SERVICE, response).await);
        }

        let list: ProjectList = response.json().await.map_err(|e| self.map_error(e))?;
        Ok(list.projects)
    }
}

#[cfg(test)]
#[path = "vercel_tests.rs"]
mod tests;
