//! # Upstream Platforms
//!
//! Trait seams and wire types for the two external services the pipeline
//! calls: the Vercel deployment platform ([`DeploymentPlatform`]) and the
//! Jules coding agent ([`AgentSessionService`]).
//!
//! Both reqwest-backed clients share [`UpstreamConfig`] and apply a per-call
//! timeout (10 seconds by default); a call that exceeds it fails with
//! [`UpstreamError::Timeout`].

use crate::credential_vault::SecretToken;
use crate::{DeploymentId, ErrorCategory};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod jules;
pub mod vercel;

pub use jules::JulesClient;
pub use vercel::VercelClient;

/// Default Vercel REST API base URL
pub const DEFAULT_VERCEL_API_URL: &str = "https://api.vercel.com";

/// Default Jules REST API base URL
pub const DEFAULT_JULES_API_URL: &str = "https://jules.googleapis.com";

/// Default bound on every upstream call
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for upstream clients
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub vercel_api_url: String,
    pub jules_api_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            vercel_api_url: DEFAULT_VERCEL_API_URL.to_string(),
            jules_api_url: DEFAULT_JULES_API_URL.to_string(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            user_agent: format!("gitglide/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub(crate) fn build_http_client(config: &UpstreamConfig) -> Result<reqwest::Client, UpstreamError> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(&config.user_agent)
        .build()
        .map_err(|e| UpstreamError::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

pub(crate) fn map_request_error(
    service: &'static str,
    timeout: Duration,
    error: reqwest::Error,
) -> UpstreamError {
    if error.is_timeout() {
        UpstreamError::Timeout {
            service,
            timeout_seconds: timeout.as_secs(),
        }
    } else if error.is_decode() {
        UpstreamError::InvalidResponse {
            service,
            message: error.to_string(),
        }
    } else {
        UpstreamError::Transport {
            service,
            message: error.to_string(),
        }
    }
}

pub(crate) async fn error_from_response(
    service: &'static str,
    response: reqwest::Response,
) -> UpstreamError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    UpstreamError::HttpError {
        service,
        status,
        body,
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by upstream clients
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{service} returned HTTP {status}: {body}")]
    HttpError {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} request timed out after {timeout_seconds}s")]
    Timeout {
        service: &'static str,
        timeout_seconds: u64,
    },

    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned an unreadable response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("Upstream client configuration error: {message}")]
    Configuration { message: String },
}

impl UpstreamError {
    /// Check if this error represents a transient condition
    ///
    /// Transient conditions are timeouts, transport failures, 5xx and 429.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError { status, .. } => *status >= 500 || *status == 429,
            Self::Timeout { .. } => true,
            Self::Transport { .. } => true,
            Self::InvalidResponse { .. } => false,
            Self::Configuration { .. } => false,
        }
    }

    /// Get error category for monitoring
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::HttpError { status, .. } if *status == 401 || *status == 403 => {
                ErrorCategory::Security
            }
            _ if self.is_transient() => ErrorCategory::Transient,
            _ => ErrorCategory::Permanent,
        }
    }

    /// Check if the upstream rejected the credential
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::HttpError { status, .. } if *status == 401 || *status == 403)
    }

    /// HTTP status returned by the upstream, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ============================================================================
// Deployment Platform Types
// ============================================================================

/// Body of a webhook registration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebhookRequest {
    pub events: Vec<String>,
    pub project_ids: Vec<String>,
    pub url: String,
}

/// Webhook returned by the platform at registration time
#[derive(Clone, Deserialize)]
pub struct CreatedWebhook {
    pub id: String,
    pub secret: String,
}

impl std::fmt::Debug for CreatedWebhook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedWebhook")
            .field("id", &self.id)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

/// Result of a remote webhook deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookDeletion {
    Deleted,
    /// The platform no longer knows the webhook
    AlreadyGone,
}

/// Deployment detail used to locate the failing repository and branch
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentDetail {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

impl DeploymentDetail {
    /// Read a non-empty string entry from the deployment metadata
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta
            .as_ref()?
            .get(key)?
            .as_str()
            .filter(|v| !v.is_empty())
    }
}

/// Creator of a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentCreator {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Deployment as returned by the deployment listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSummary {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    /// Creation time in milliseconds since the epoch
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub creator: Option<DeploymentCreator>,
    #[serde(default)]
    pub inspector_url: Option<String>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

impl DeploymentSummary {
    /// Deployment identifier, preferring `uid`
    pub fn deployment_id(&self) -> Option<&str> {
        self.uid.as_deref().or(self.id.as_deref())
    }
}

/// Link between a project and its source repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectLink {
    #[serde(default)]
    pub repo_url: Option<String>,
}

/// Project as returned by the project listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub link: Option<ProjectLink>,
}

impl ProjectSummary {
    /// Check if the project is linked to a source repository
    pub fn has_linked_repo(&self) -> bool {
        self.link
            .as_ref()
            .and_then(|l| l.repo_url.as_deref())
            .is_some_and(|url| !url.is_empty())
    }
}

/// Operations on the deployment platform
#[async_trait]
pub trait DeploymentPlatform: Send + Sync {
    /// Register a project-scoped webhook
    async fn create_webhook(
        &self,
        token: &SecretToken,
        request: &CreateWebhookRequest,
    ) -> Result<CreatedWebhook, UpstreamError>;

    /// Delete a webhook; a 404 is reported as [`WebhookDeletion::AlreadyGone`]
    async fn delete_webhook(
        &self,
        token: &SecretToken,
        webhook_id: &str,
    ) -> Result<WebhookDeletion, UpstreamError>;

    /// Fetch deployment detail
    ///
    /// The body is decoded regardless of status; a non-2xx answer simply
    /// yields a detail without metadata.
    async fn get_deployment(
        &self,
        token: &SecretToken,
        deployment_id: &DeploymentId,
    ) -> Result<DeploymentDetail, UpstreamError>;

    /// List the most recent deployments visible to the token
    async fn list_deployments(
        &self,
        token: &SecretToken,
        limit: usize,
    ) -> Result<Vec<DeploymentSummary>, UpstreamError>;

    /// List projects visible to the token
    async fn list_projects(&self, token: &SecretToken) -> Result<Vec<ProjectSummary>, UpstreamError>;
}

// ============================================================================
// Agent Session Types
// ============================================================================

/// How the agent applies its changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutomationMode {
    /// Open a pull request without waiting for review of the plan
    #[serde(rename = "AUTO_CREATE_PR")]
    AutoCreatePr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubRepoContext {
    pub starting_branch: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceContext {
    /// `sources/github-{org}-{repo}`
    pub source: String,
    pub github_repo_context: GithubRepoContext,
}

/// Body of a remediation session request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub prompt: String,
    pub title: String,
    pub source_context: SourceContext,
    pub require_plan_approval: bool,
    pub automation_mode: AutomationMode,
}

/// Session returned by the agent service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedSession {
    pub id: String,
}

/// Operations on the coding-agent service
#[async_trait]
pub trait AgentSessionService: Send + Sync {
    /// Open a remediation session; any non-2xx answer is an
    /// [`UpstreamError::HttpError`] carrying status and body
    async fn create_session(
        &self,
        api_key: &SecretToken,
        request: &SessionRequest,
    ) -> Result<CreatedSession, UpstreamError>;
}
