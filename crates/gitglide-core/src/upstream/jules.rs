//! # Jules Client
//!
//! reqwest-backed [`AgentSessionService`] authenticating with the
//! `x-goog-api-key` header.

use super::{
    build_http_client, error_from_response, map_request_error, AgentSessionService,
    CreatedSession, SessionRequest, UpstreamConfig, UpstreamError,
};
use crate::credential_vault::SecretToken;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

const SERVICE: &str = "jules";

/// Header carrying the Jules API key
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Jules REST API client
#[derive(Debug, Clone)]
pub struct JulesClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl JulesClient {
    /// Create a client from upstream configuration
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        Ok(Self {
            http_client: build_http_client(config)?,
            base_url: config.jules_api_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }
}

#[async_trait]
impl AgentSessionService for JulesClient {
    #[instrument(skip(self, api_key, request), fields(source = %request.source_context.source))]
    async fn create_session(
        &self,
        api_key: &SecretToken,
        request: &SessionRequest,
    ) -> Result<CreatedSession, UpstreamError> {
        let response = self
            .http_client
            .post(format!("{}/v1alpha/sessions", self.base_url))
            .header(API_KEY_HEADER, api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| map_request_error(SERVICE, self.timeout, e))?;

        if !response.status().is_success() {
            return Err(error_from_response(SERVICE, response).await);
        }

        let session: CreatedSession = response
            .json()
            .await
            .map_err(|e| map_request_error(SERVICE, self.timeout, e))?;
        debug!(session_id = %session.id, "Jules session created");
        Ok(session)
    }
}

#[cfg(test)]
#[path = "jules_tests.rs"]
mod tests;
