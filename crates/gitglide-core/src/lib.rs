//! # GitGlide Core
//!
//! Domain logic for the deployment-failure auto-remediation pipeline.
//!
//! When a user enables auto-fix for a Vercel project, the [`registrar`]
//! registers a project-scoped webhook with Vercel and records the returned
//! secret. Inbound deliveries are authenticated by the [`receiver`] and handed
//! to an [`event_queue::EventQueue`]; the [`workflow`] engine consumes each
//! event, opens a Jules remediation session and records the outcome in the
//! [`webhook_log`] audit trail.
//!
//! ## Architecture
//!
//! - Business logic depends only on trait abstractions (storage, vault, queue,
//!   upstream platforms)
//! - Infrastructure implementations are injected at construction time
//! - In-memory and file-backed adapters live in [`adapters`]
//!
//! ## Usage
//!
//! ```rust
//! use gitglide_core::{CapabilityKey, ProjectId};
//!
//! let project = ProjectId::new("prj_123").unwrap();
//! let key = CapabilityKey::for_vercel_project(&project);
//! assert_eq!(key.as_str(), "vercel_project_prj_123");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub use ulid::Ulid;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Identifier of a dashboard user, as issued by the external identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create new user ID with validation
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_identifier("user_id", &value, 255)?;
        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Vercel project identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Create new project ID with validation
    ///
    /// # Validation Rules
    /// - Must be 1-128 characters
    /// - Must not contain whitespace or control characters
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_identifier("project_id", &value, 128)?;
        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Vercel deployment identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(String);

impl DeploymentId {
    /// Create new deployment ID with validation
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_identifier("deployment_id", &value, 128)?;
        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeploymentId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Key distinguishing which per-project capability an integration row governs
///
/// Format: `vercel_project_{project_id}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityKey(String);

impl CapabilityKey {
    /// Prefix shared by every Vercel auto-fix capability key
    pub const VERCEL_PROJECT_PREFIX: &'static str = "vercel_project_";

    /// Build the auto-fix capability key for a Vercel project
    pub fn for_vercel_project(project_id: &ProjectId) -> Self {
        Self(format!("{}{}", Self::VERCEL_PROJECT_PREFIX, project_id))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the Vercel project ID when this is a project auto-fix key
    pub fn vercel_project_id(&self) -> Option<&str> {
        self.0.strip_prefix(Self::VERCEL_PROJECT_PREFIX)
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for audit log rows
///
/// Uses ULID so identifiers sort roughly by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebhookLogId(Ulid);

impl WebhookLogId {
    /// Generate a new unique log ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for WebhookLogId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WebhookLogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WebhookLogId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = s.parse::<Ulid>().map_err(|_| ValidationError::InvalidFormat {
            field: "webhook_log_id".to_string(),
            message: "must be a ULID".to_string(),
        })?;
        Ok(Self(ulid))
    }
}

fn validate_identifier(field: &str, value: &str, max_length: usize) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > max_length {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max_length,
        });
    }

    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidCharacters {
            field: field.to_string(),
            invalid_chars: "whitespace or control characters".to_string(),
        });
    }

    Ok(())
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wrap an existing chrono datetime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Subtract duration from timestamp
    pub fn subtract_duration(&self, duration: Duration) -> Self {
        let chrono_duration = chrono::Duration::from_std(duration).unwrap_or_default();
        Self(self.0 - chrono_duration)
    }

    /// Get duration since another timestamp (zero if `other` is later)
    pub fn duration_since(&self, other: Self) -> Duration {
        self.0
            .signed_duration_since(other.0)
            .to_std()
            .unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry and alerting decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that could succeed on a later attempt
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
    /// Security-related failures
    Security,
    /// Deployment-time configuration is missing or invalid
    Configuration,
}

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },
}

/// Failures of the auto-fix toggle and the remediation workflow
///
/// Every failure recorded in a [`webhook_log::WebhookLog`] row is the
/// `Display` text of one of these variants.
#[derive(Debug, thiserror::Error)]
pub enum RemediationError {
    #[error("{} not found", .provider.credential_label())]
    CredentialMissing { provider: Provider },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Failed to create Jules session. Status: {status}. Body: {body}")]
    SessionCreate { status: u16, body: String },

    #[error("Deployment does not have GitHub linkage metadata (missing: {})", .missing.join(", "))]
    MissingRepositoryLinkage { missing: Vec<&'static str> },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Credential vault error: {0}")]
    Vault(#[from] VaultError),
}

impl RemediationError {
    /// Check if error is transient and a later attempt could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Upstream(e) => e.is_transient(),
            Self::SessionCreate { status, .. } => *status >= 500 || *status == 429,
            Self::Storage(e) => e.is_transient(),
            Self::Vault(e) => e.is_transient(),
            Self::CredentialMissing { .. } => false,
            Self::Configuration { .. } => false,
            Self::MissingRepositoryLinkage { .. } => false,
        }
    }

    /// Get error category for monitoring and alerting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            _ if self.is_transient() => ErrorCategory::Transient,
            _ => ErrorCategory::Permanent,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Storage adapters (in-memory, file-backed, vault and queue)
pub mod adapters;

/// Audit log reader used to annotate deployment listings
pub mod audit_reader;

/// Credential vault abstraction for per-user provider tokens
pub mod credential_vault;

/// Hand-off queue between the webhook receiver and the workflow engine
pub mod event_queue;

/// Per-user, per-capability integration configuration
pub mod integration_config;

/// Inbound webhook authentication and dispatch
pub mod receiver;

/// Remote webhook registration for auto-fix toggles
pub mod registrar;

/// HMAC signature computation and verification
pub mod signature;

/// Storage error type shared by store traits
pub mod storage;

/// Reconciliation of audit rows stuck in `processing`
pub mod sweeper;

/// HTTP clients for Vercel and Jules
pub mod upstream;

/// Audit log of inbound failure events and workflow outcomes
pub mod webhook_log;

/// Step-wise remediation workflow engine
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

pub use audit_reader::{annotate_deployments, AnnotatedDeployment, AuditLogReader};
pub use credential_vault::{CredentialVault, Provider, SecretToken, VaultError};
pub use event_queue::{BuildFailedEvent, EventQueue, MessageId, QueueError, QueuedEvent};
pub use integration_config::{AutofixSettings, IntegrationConfig, IntegrationConfigStore};
pub use receiver::{IgnoreReason, ReceiveError, ReceiveOutcome, ReceiverSettings, WebhookReceiver};
pub use registrar::{RegistrarSettings, ToggleResult, WebhookRegistrar};
pub use storage::StorageError;
pub use sweeper::StaleLogSweeper;
pub use upstream::{
    AgentSessionService, DeploymentPlatform, UpstreamConfig, UpstreamError,
};
pub use webhook_log::{
    LogCreation, LogOutcome, LogStatus, NewWebhookLog, WebhookLog, WebhookLogQuery, WebhookLogStore,
    WorkflowStep,
};
pub use workflow::{RemediationWorkflow, WorkflowOutcome, WorkflowSettings};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
