//! Error types for the HTTP service

use crate::responses::ApiErrorBody;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use gitglide_core::{
    Provider, ReceiveError, RemediationError, StorageError, UpstreamError, VaultError,
};
use tracing::{error, warn};

/// Message shown for upstream credential rejection
pub const UPSTREAM_UNAUTHORIZED_MESSAGE: &str = "Vercel token invalid or expired";

/// Handler errors with HTTP status code mapping
///
/// Every error renders as the `{success: false, error: {message, code}}`
/// envelope. Messages returned to clients are fixed strings; the detailed
/// error is logged server-side with the request's correlation ID.
///
/// - `400 Bad Request`: malformed input, unknown provider, missing credential
/// - `401 Unauthorized`: no caller identity, bad delivery signature, or the
///   upstream rejected the stored token
/// - `500 Internal Server Error`: unexpected failures and missing server
///   configuration
/// - `502`/`504`: upstream failure or timeout
/// - `503 Service Unavailable`: transient storage failure
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// No authenticated user on the request
    #[error("Unauthorized")]
    Unauthorized,

    /// The request body or parameters are invalid
    #[error("{message}")]
    BadRequest { message: String },

    /// The caller has not stored the credential this route needs
    #[error("{} not connected", provider_display_name(.provider))]
    NotConnected { provider: Provider },

    /// Inbound webhook delivery rejected or failed
    #[error(transparent)]
    Webhook(#[from] ReceiveError),

    /// Auto-fix toggle failed
    #[error(transparent)]
    Remediation(#[from] RemediationError),

    /// A listing call to the deployment platform failed
    #[error("{context}: {source}")]
    Upstream {
        context: &'static str,
        #[source]
        source: UpstreamError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

impl HandlerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn upstream(context: &'static str, source: UpstreamError) -> Self {
        Self::Upstream { context, source }
    }

    /// Status, client-facing message, error code and optional retry delay
    pub fn response_parts(&self) -> (StatusCode, String, &'static str, Option<u64>) {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized".to_string(),
                "unauthorized",
                None,
            ),
            Self::BadRequest { message } => (
                StatusCode::BAD_REQUEST,
                message.clone(),
                "invalid_request",
                None,
            ),
            Self::NotConnected { .. } => (
                StatusCode::BAD_REQUEST,
                self.to_string(),
                "not_connected",
                None,
            ),
            Self::Webhook(e) => webhook_parts(e),
            Self::Remediation(e) => remediation_parts(e),
            Self::Upstream { context, source } => upstream_parts(context, source),
            Self::Storage(e) => storage_parts(e.is_transient()),
            Self::Vault(e) => match e {
                VaultError::UnknownProvider { .. } => (
                    StatusCode::BAD_REQUEST,
                    "Invalid provider".to_string(),
                    "invalid_provider",
                    None,
                ),
                VaultError::EmptyCredential => (
                    StatusCode::BAD_REQUEST,
                    "Key is required".to_string(),
                    "invalid_request",
                    None,
                ),
                VaultError::Unavailable { .. } => storage_parts(true),
            },
        }
    }
}

fn provider_display_name(provider: &Provider) -> &'static str {
    match provider {
        Provider::Jules => "Jules",
        Provider::Vercel => "Vercel",
    }
}

fn webhook_parts(error: &ReceiveError) -> (StatusCode, String, &'static str, Option<u64>) {
    match error {
        ReceiveError::MissingSignature => (
            StatusCode::UNAUTHORIZED,
            "Missing signature".to_string(),
            "missing_signature",
            None,
        ),
        ReceiveError::InvalidSignature => (
            StatusCode::UNAUTHORIZED,
            "Invalid signature".to_string(),
            "invalid_signature",
            None,
        ),
        ReceiveError::MalformedPayload { .. } => (
            StatusCode::BAD_REQUEST,
            "Invalid payload".to_string(),
            "invalid_payload",
            None,
        ),
        ReceiveError::Storage(_) | ReceiveError::Dispatch(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook processing failed".to_string(),
            "internal_error",
            None,
        ),
    }
}

fn remediation_parts(error: &RemediationError) -> (StatusCode, String, &'static str, Option<u64>) {
    match error {
        RemediationError::CredentialMissing { provider } => (
            StatusCode::BAD_REQUEST,
            format!("{} not connected", provider_display_name(provider)),
            "not_connected",
            None,
        ),
        RemediationError::Configuration { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Auto-fix is not available on this server".to_string(),
            "configuration_error",
            None,
        ),
        RemediationError::Upstream(e) => upstream_parts("Failed to update auto-fix", e),
        RemediationError::SessionCreate { .. } => (
            StatusCode::BAD_GATEWAY,
            "Failed to create remediation session".to_string(),
            "upstream_error",
            None,
        ),
        RemediationError::MissingRepositoryLinkage { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Deployment is not linked to a repository".to_string(),
            "missing_repository_linkage",
            None,
        ),
        RemediationError::Storage(e) => storage_parts(e.is_transient()),
        RemediationError::Vault(e) => storage_parts(e.is_transient()),
    }
}

fn upstream_parts(
    context: &str,
    error: &UpstreamError,
) -> (StatusCode, String, &'static str, Option<u64>) {
    if error.is_unauthorized() {
        return (
            StatusCode::UNAUTHORIZED,
            UPSTREAM_UNAUTHORIZED_MESSAGE.to_string(),
            "upstream_unauthorized",
            None,
        );
    }

    match error {
        UpstreamError::HttpError { status, .. } => {
            let status = StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            (status, context.to_string(), "upstream_error", None)
        }
        UpstreamError::Timeout { .. } => (
            StatusCode::GATEWAY_TIMEOUT,
            context.to_string(),
            "upstream_timeout",
            Some(5),
        ),
        _ => (
            StatusCode::BAD_GATEWAY,
            context.to_string(),
            "upstream_error",
            None,
        ),
    }
}

fn storage_parts(transient: bool) -> (StatusCode, String, &'static str, Option<u64>) {
    if transient {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable. Please try again later.".to_string(),
            "unavailable",
            Some(60),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error occurred. Please try again later.".to_string(),
            "internal_error",
            None,
        )
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let (status, message, code, retry_after) = self.response_parts();

        if matches!(
            self,
            Self::Remediation(RemediationError::Configuration { .. })
        ) {
            error!(error = %self, "Auto-fix configuration is incomplete");
        } else if status.is_server_error() {
            error!(error = %self, status = %status, "Request failed");
        } else {
            warn!(error = %self, status = %status, "Request rejected");
        }

        let mut response = (status, Json(ApiErrorBody::new(message, Some(code)))).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for '{key}': {message}")]
    Invalid { key: String, message: String },

    #[error("Failed to initialize {component}: {message}")]
    Initialization {
        component: &'static str,
        message: String,
    },
}

impl ConfigError {
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
