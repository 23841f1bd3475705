//! Response envelopes, request bodies, and view types for the API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use gitglide_core::upstream::ProjectSummary;
use gitglide_core::AnnotatedDeployment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Envelopes
// ============================================================================

/// Success envelope: `{success: true, data}`
#[derive(Debug, Serialize)]
pub struct ApiSuccess<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiSuccess<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Error envelope: `{success: false, error: {message, code?}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiErrorBody {
    pub fn new(message: impl Into<String>, code: Option<&str>) -> Self {
        Self {
            success: false,
            error: ApiErrorDetail {
                message: message.into(),
                code: code.map(str::to_string),
            },
        }
    }
}

// ============================================================================
// Webhook
// ============================================================================

/// Acknowledgement for every accepted or ignored delivery
#[derive(Debug, Serialize)]
pub struct ReceivedResponse {
    pub received: bool,
}

// ============================================================================
// Integrations
// ============================================================================

/// Body of the auto-fix toggle command
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub project_id: String,
    pub enabled: bool,
}

/// A project with its auto-fix state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: String,
    pub name: Option<String>,
    pub framework: Option<String>,
    pub enabled: bool,
    pub has_linked_repo: bool,
}

impl ProjectView {
    pub fn from_summary(project: ProjectSummary, enabled: bool) -> Self {
        let has_linked_repo = project.has_linked_repo();
        Self {
            id: project.id,
            name: project.name,
            framework: project.framework,
            enabled,
            has_linked_repo,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectView>,
}

#[derive(Debug, Serialize)]
pub struct DeploymentListResponse {
    pub deployments: Vec<AnnotatedDeployment>,
}

// ============================================================================
// Credentials
// ============================================================================

/// Whether a provider credential is stored, and its masked form
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatus {
    pub is_set: bool,
    pub masked: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct KeysResponse {
    pub providers: BTreeMap<&'static str, KeyStatus>,
}

#[derive(Debug, Deserialize)]
pub struct SetKeyRequest {
    pub provider: String,
    pub key: String,
}

// ============================================================================
// Health
// ============================================================================

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

/// Readiness response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: String,
    pub checks: BTreeMap<String, String>,
}
