//! # Webhook Receiver
//!
//! Authenticates inbound deployment-event deliveries and hands accepted
//! failure events to the [`EventQueue`].
//!
//! Processing order for one delivery:
//!
//! 1. Reject when the signature header is absent
//! 2. Parse the raw body as JSON
//! 3. Ignore event types that are not tracked
//! 4. Find the first enabled integration row for the delivery's project
//! 5. Verify `sha1=HMAC-SHA1(secret, raw body)` against the header
//! 6. Publish a [`BuildFailedEvent`] and acknowledge
//!
//! Ignored deliveries are acknowledged so the platform does not retry them.
//! The signature can only be checked after the project lookup because the
//! secret is stored per project.

use crate::event_queue::{BuildFailedEvent, EventQueue, MessageId, QueueError};
use crate::integration_config::IntegrationConfigStore;
use crate::registrar::DEFAULT_TRACKED_EVENTS;
use crate::signature::verify_signature;
use crate::storage::StorageError;
use crate::{CapabilityKey, DeploymentId, ErrorCategory, ProjectId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Receiver settings derived from service configuration
#[derive(Debug, Clone)]
pub struct ReceiverSettings {
    /// Event types that trigger remediation
    pub tracked_events: Vec<String>,
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        Self {
            tracked_events: DEFAULT_TRACKED_EVENTS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Why an authenticated or unauthenticatable delivery was acknowledged
/// without dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The event type is not one of the tracked failure types
    UntrackedEventType(String),
    /// The body lacks a project or deployment identifier
    MissingIdentifiers,
    /// No user has auto-fix enabled for the project
    NoEnabledConfig,
    /// The enabled row has no signing secret recorded
    SecretNotConfigured,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UntrackedEventType(t) => write!(f, "untracked event type '{}'", t),
            Self::MissingIdentifiers => write!(f, "missing project or deployment id"),
            Self::NoEnabledConfig => write!(f, "no enabled integration for project"),
            Self::SecretNotConfigured => write!(f, "integration has no signing secret"),
        }
    }
}

/// Result of processing one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Dispatched {
        message_id: MessageId,
        project_id: ProjectId,
        deployment_id: DeploymentId,
    },
    Ignored(IgnoreReason),
}

/// Deliveries that must be rejected
#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error("Missing signature")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid payload: {message}")]
    MalformedPayload { message: String },

    #[error("Integration lookup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to dispatch event: {0}")]
    Dispatch(#[from] QueueError),
}

impl ReceiveError {
    /// Check if the sender could succeed by retrying the delivery
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            Self::Dispatch(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Get error category for monitoring
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::MissingSignature | Self::InvalidSignature => ErrorCategory::Security,
            _ if self.is_transient() => ErrorCategory::Transient,
            _ => ErrorCategory::Permanent,
        }
    }
}

/// Authenticates deliveries and dispatches failure events
pub struct WebhookReceiver {
    configs: Arc<dyn IntegrationConfigStore>,
    queue: Arc<dyn EventQueue>,
    settings: ReceiverSettings,
}

impl WebhookReceiver {
    pub fn new(
        configs: Arc<dyn IntegrationConfigStore>,
        queue: Arc<dyn EventQueue>,
        settings: ReceiverSettings,
    ) -> Self {
        Self {
            configs,
            queue,
            settings,
        }
    }

    /// Process one delivery given its raw body and signature header value
    #[instrument(skip(self, raw_body, signature), fields(body_len = raw_body.len()))]
    pub async fn receive(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<ReceiveOutcome, ReceiveError> {
        let signature = signature
            .filter(|s| !s.is_empty())
            .ok_or(ReceiveError::MissingSignature)?;

        let body: serde_json::Value =
            serde_json::from_slice(raw_body).map_err(|e| ReceiveError::MalformedPayload {
                message: e.to_string(),
            })?;

        let event_type = body
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        if !self.settings.tracked_events.iter().any(|e| e == &event_type) {
            debug!(event_type = %event_type, "Ignoring untracked event type");
            return Ok(ReceiveOutcome::Ignored(IgnoreReason::UntrackedEventType(
                event_type,
            )));
        }

        let Some((project_id, deployment_id)) = extract_identifiers(&body) else {
            warn!(event_type = %event_type, "Delivery lacks project or deployment id");
            return Ok(ReceiveOutcome::Ignored(IgnoreReason::MissingIdentifiers));
        };

        let key = CapabilityKey::for_vercel_project(&project_id);
        let Some(config) = self.configs.find_enabled_by_key(&key).await? else {
            info!(project_id = %project_id, "No enabled auto-fix integration for project");
            return Ok(ReceiveOutcome::Ignored(IgnoreReason::NoEnabledConfig));
        };

        let Some(secret) = config.signing_secret() else {
            warn!(project_id = %project_id, "Enabled integration has no signing secret");
            return Ok(ReceiveOutcome::Ignored(IgnoreReason::SecretNotConfigured));
        };

        if verify_signature(secret, raw_body, signature).is_err() {
            warn!(project_id = %project_id, "Webhook signature mismatch");
            return Err(ReceiveError::InvalidSignature);
        }

        let event = BuildFailedEvent {
            user_id: config.user_id,
            project_id: project_id.clone(),
            deployment_id: deployment_id.clone(),
            event_type,
            payload: body,
        };
        let message_id = self.queue.publish(event).await?;

        info!(
            project_id = %project_id,
            deployment_id = %deployment_id,
            message_id = %message_id,
            "Build failure dispatched"
        );
        Ok(ReceiveOutcome::Dispatched {
            message_id,
            project_id,
            deployment_id,
        })
    }
}

fn extract_identifiers(body: &serde_json::Value) -> Option<(ProjectId, DeploymentId)> {
    let payload = body.get("payload")?;
    let project = payload.get("project")?.get("id")?.as_str()?;
    let deployment = payload.get("deployment")?.get("id")?.as_str()?;

    Some((ProjectId::new(project).ok()?, DeploymentId::new(deployment).ok()?))
}

#[cfg(test)]
#[path = "receiver_tests.rs"]
mod tests;
