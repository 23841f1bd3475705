//! Configuration types for the HTTP service
//!
//! Every section carries serde defaults, so an empty configuration source
//! yields a runnable service. [`ServiceConfig::validate`] rejects values that
//! would only fail later at runtime.

use crate::errors::ConfigError;
use axum::http::HeaderName;
use gitglide_core::registrar::{DEFAULT_RECEIVER_PATH, DEFAULT_TRACKED_EVENTS};
use gitglide_core::upstream::{DEFAULT_JULES_API_URL, DEFAULT_VERCEL_API_URL};
use gitglide_core::{ReceiverSettings, RegistrarSettings, UpstreamConfig, WorkflowSettings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Header carrying the platform's `sha1=<hex>` delivery signature
pub const DEFAULT_SIGNATURE_HEADER: &str = "x-vercel-signature";

/// Header carrying the user id established by the identity provider
pub const DEFAULT_USER_HEADER: &str = "x-authenticated-user";

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Upstream platform endpoints
    pub upstream: UpstreamSettings,

    /// Webhook registration and delivery settings
    pub autofix: AutofixConfig,

    /// Remediation worker settings
    pub workflow: WorkflowConfig,

    /// Persistence settings
    pub storage: StorageConfig,

    /// Caller identity settings
    pub auth: AuthConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Reject configuration that cannot produce a working service
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "must not be 0"));
        }
        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "server.timeout_seconds",
                "must be greater than 0",
            ));
        }
        if self.upstream.timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "upstream.timeout_seconds",
                "must be greater than 0",
            ));
        }
        validate_http_url("upstream.vercel_api_url", &self.upstream.vercel_api_url)?;
        validate_http_url("upstream.jules_api_url", &self.upstream.jules_api_url)?;

        if let Some(base) = &self.autofix.public_base_url {
            validate_http_url("autofix.public_base_url", base)?;
        }
        if !self.autofix.receiver_path.starts_with('/') {
            return Err(ConfigError::invalid(
                "autofix.receiver_path",
                "must start with '/'",
            ));
        }
        if self.autofix.tracked_events.is_empty() {
            return Err(ConfigError::invalid(
                "autofix.tracked_events",
                "at least one event type is required",
            ));
        }
        validate_header_name("autofix.signature_header", &self.autofix.signature_header)?;
        validate_header_name("auth.user_header", &self.auth.user_header)?;

        if self.workflow.worker_concurrency == 0 {
            return Err(ConfigError::invalid(
                "workflow.worker_concurrency",
                "must be greater than 0",
            ));
        }
        if self.workflow.stale_after_seconds == 0 {
            return Err(ConfigError::invalid(
                "workflow.stale_after_seconds",
                "must be greater than 0",
            ));
        }
        if self.workflow.sweep_interval_seconds == 0 {
            return Err(ConfigError::invalid(
                "workflow.sweep_interval_seconds",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Settings for the Vercel and Jules clients
    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            vercel_api_url: self.upstream.vercel_api_url.clone(),
            jules_api_url: self.upstream.jules_api_url.clone(),
            timeout: Duration::from_secs(self.upstream.timeout_seconds),
            ..UpstreamConfig::default()
        }
    }

    pub fn registrar_settings(&self) -> RegistrarSettings {
        RegistrarSettings {
            public_base_url: self.autofix.public_base_url.clone(),
            receiver_path: self.autofix.receiver_path.clone(),
            tracked_events: self.autofix.tracked_events.clone(),
        }
    }

    pub fn receiver_settings(&self) -> ReceiverSettings {
        ReceiverSettings {
            tracked_events: self.autofix.tracked_events.clone(),
        }
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            skip_duplicate_deployments: self.workflow.skip_duplicate_deployments,
        }
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::invalid(key, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::invalid(
            key,
            format!("scheme '{}' is not http or https", other),
        )),
    }
}

fn validate_header_name(key: &str, value: &str) -> Result<(), ConfigError> {
    HeaderName::from_bytes(value.as_bytes())
        .map(|_| ())
        .map_err(|_| ConfigError::invalid(key, format!("'{}' is not a valid header name", value)))
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 30,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
            enable_cors: true,
        }
    }
}

/// Upstream platform endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    pub vercel_api_url: String,
    pub jules_api_url: String,

    /// Bound on every outbound call
    pub timeout_seconds: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            vercel_api_url: DEFAULT_VERCEL_API_URL.to_string(),
            jules_api_url: DEFAULT_JULES_API_URL.to_string(),
            timeout_seconds: 10,
        }
    }
}

/// Webhook registration and delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutofixConfig {
    /// Public base URL the platform delivers to; required to enable auto-fix
    pub public_base_url: Option<String>,

    /// Route of the inbound webhook endpoint
    pub receiver_path: String,

    /// Event types that trigger remediation
    pub tracked_events: Vec<String>,

    /// Header carrying the delivery signature
    pub signature_header: String,
}

impl Default for AutofixConfig {
    fn default() -> Self {
        Self {
            public_base_url: None,
            receiver_path: DEFAULT_RECEIVER_PATH.to_string(),
            tracked_events: DEFAULT_TRACKED_EVENTS.iter().map(|e| e.to_string()).collect(),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
        }
    }
}

/// Remediation worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Maximum number of workflows running at once
    pub worker_concurrency: usize,

    /// How long the worker waits on an empty queue before re-checking shutdown
    pub poll_timeout_seconds: u64,

    /// Age after which a `processing` row is considered abandoned
    pub stale_after_seconds: u64,

    /// How often the stale row sweeper runs
    pub sweep_interval_seconds: u64,

    /// Skip events whose deployment already has an active or successful run
    pub skip_duplicate_deployments: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            worker_concurrency: 4,
            poll_timeout_seconds: 5,
            stale_after_seconds: 900,
            sweep_interval_seconds: 60,
            skip_duplicate_deployments: false,
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the JSON snapshot; state is kept in memory when unset
    pub data_dir: Option<PathBuf>,
}

/// Caller identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Header set by the authenticating proxy
    pub user_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_header: DEFAULT_USER_HEADER.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
