//! # Webhook Audit Log
//!
//! Every failure event the workflow engine accepts produces exactly one
//! [`WebhookLog`] row. Rows start as `processing` and move to `success` or
//! `failed` exactly once; a second terminal write is rejected with
//! [`StorageError::AlreadyTerminal`].
//!
//! Between creation and the terminal write the engine records the last
//! completed [`WorkflowStep`] so a row stuck in `processing` shows how far
//! its run got.

use crate::storage::StorageError;
use crate::{DeploymentId, Timestamp, UserId, WebhookLogId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source tag for deliveries from Vercel
pub const SOURCE_VERCEL: &str = "vercel";

// ============================================================================
// Status and Steps
// ============================================================================

/// Lifecycle status of an audit row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Processing,
    Success,
    Failed,
}

impl LogStatus {
    /// Check if no further status transition is allowed
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Workflow checkpoints, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    /// Audit row created
    Logged,
    /// Both provider credentials loaded from the vault
    CredentialsLoaded,
    /// Deployment detail fetched from the platform
    DeploymentFetched,
    /// Repository, organization and branch derived from deployment metadata
    RepositoryResolved,
    /// Agent session created
    SessionCreated,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logged => "logged",
            Self::CredentialsLoaded => "credentials_loaded",
            Self::DeploymentFetched => "deployment_fetched",
            Self::RepositoryResolved => "repository_resolved",
            Self::SessionCreated => "session_created",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Log Row
// ============================================================================

/// Audit row for one accepted failure event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookLog {
    pub id: WebhookLogId,
    pub user_id: Option<UserId>,
    pub source: String,
    pub event: String,
    /// Deployment the event refers to, used to join rows to deployment listings
    pub deployment_id: Option<DeploymentId>,
    /// Original event body; on failure `{ "error": ..., "original": ... }`
    pub payload: serde_json::Value,
    pub status: LogStatus,
    /// Agent session identifier, set on success only
    pub session_id: Option<String>,
    pub last_step: Option<WorkflowStep>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WebhookLog {
    /// Failure reason recorded for a failed row
    pub fn error_message(&self) -> Option<&str> {
        if self.status != LogStatus::Failed {
            return None;
        }
        self.payload.get("error").and_then(|e| e.as_str())
    }

    /// Record a completed checkpoint on a non-terminal row
    pub fn record_step(&mut self, step: WorkflowStep) -> Result<(), StorageError> {
        if self.status.is_terminal() {
            return Err(StorageError::AlreadyTerminal { id: self.id });
        }
        self.last_step = Some(step);
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Apply the single terminal transition
    pub fn apply_outcome(&mut self, outcome: LogOutcome) -> Result<(), StorageError> {
        if self.status.is_terminal() {
            return Err(StorageError::AlreadyTerminal { id: self.id });
        }

        match outcome {
            LogOutcome::Success { session_id } => {
                self.status = LogStatus::Success;
                self.session_id = Some(session_id);
            }
            LogOutcome::Failed { error } => {
                let original = std::mem::take(&mut self.payload);
                self.status = LogStatus::Failed;
                self.payload = serde_json::json!({
                    "error": error,
                    "original": original,
                });
            }
        }
        self.updated_at = Timestamp::now();
        Ok(())
    }
}

/// Fields supplied when an audit row is created
#[derive(Debug, Clone)]
pub struct NewWebhookLog {
    pub user_id: Option<UserId>,
    pub source: String,
    pub event: String,
    pub deployment_id: Option<DeploymentId>,
    pub payload: serde_json::Value,
}

impl NewWebhookLog {
    /// Materialize a `processing` row with a fresh identifier
    pub fn into_log(self) -> WebhookLog {
        let now = Timestamp::now();
        WebhookLog {
            id: WebhookLogId::new(),
            user_id: self.user_id,
            source: self.source,
            event: self.event,
            deployment_id: self.deployment_id,
            payload: self.payload,
            status: LogStatus::Processing,
            session_id: None,
            last_step: Some(WorkflowStep::Logged),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Result of [`WebhookLogStore::create_unless_active`]
#[derive(Debug, Clone, PartialEq)]
pub enum LogCreation {
    /// A new `processing` row was inserted
    Created(WebhookLog),
    /// The deployment already had a `processing` or `success` row; nothing
    /// was inserted
    Existing(WebhookLog),
}

/// Terminal outcome of a workflow run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    Success { session_id: String },
    Failed { error: String },
}

/// Filter for listing audit rows, newest first
#[derive(Debug, Clone)]
pub struct WebhookLogQuery {
    pub user_id: Option<UserId>,
    pub source: Option<String>,
    pub event: Option<String>,
    pub limit: usize,
}

impl WebhookLogQuery {
    /// Rows belonging to one user
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            source: None,
            event: None,
            limit: 50,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Check whether a row passes the filter (the limit is not considered)
    pub fn matches(&self, log: &WebhookLog) -> bool {
        if let Some(user_id) = &self.user_id {
            if log.user_id.as_ref() != Some(user_id) {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if &log.source != source {
                return false;
            }
        }
        if let Some(event) = &self.event {
            if &log.event != event {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Store Interface
// ============================================================================

/// Persistent store of audit rows
#[async_trait]
pub trait WebhookLogStore: Send + Sync {
    /// Create a `processing` row
    async fn create(&self, new_log: NewWebhookLog) -> Result<WebhookLog, StorageError>;

    /// Create a `processing` row unless the deployment already has a
    /// `processing` or `success` row
    ///
    /// The lookup and the insert happen as one operation, so concurrent calls
    /// for the same deployment create at most one row. Rows without a
    /// deployment identifier are always created.
    async fn create_unless_active(
        &self,
        new_log: NewWebhookLog,
    ) -> Result<LogCreation, StorageError>;

    /// Fetch a row by identifier
    async fn get(&self, id: &WebhookLogId) -> Result<Option<WebhookLog>, StorageError>;

    /// Record the last completed checkpoint of a `processing` row
    async fn record_step(&self, id: &WebhookLogId, step: WorkflowStep) -> Result<(), StorageError>;

    /// Write the terminal status; fails with [`StorageError::AlreadyTerminal`]
    /// if the row already left `processing`
    async fn complete(
        &self,
        id: &WebhookLogId,
        outcome: LogOutcome,
    ) -> Result<WebhookLog, StorageError>;

    /// List rows matching the query, newest first, at most `query.limit`
    async fn list_recent(&self, query: &WebhookLogQuery) -> Result<Vec<WebhookLog>, StorageError>;

    /// Find a `processing` or `success` row for a deployment
    async fn find_active_for_deployment(
        &self,
        deployment_id: &DeploymentId,
    ) -> Result<Option<WebhookLog>, StorageError>;

    /// List `processing` rows not updated since `cutoff`
    async fn list_stale_processing(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<WebhookLog>, StorageError>;

    /// Check that the store can serve requests
    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "webhook_log_tests.rs"]
mod tests;
