//! # Event Queue
//!
//! Durable hand-off between the webhook receiver and the workflow engine.
//!
//! The receiver publishes a [`BuildFailedEvent`] once a delivery is
//! authenticated and then acknowledges the sender immediately. Workers
//! receive events, run the remediation workflow and either complete or
//! dead-letter each message. Messages are never redelivered after a
//! workflow failure.

use crate::{DeploymentId, ErrorCategory, ProjectId, Timestamp, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Event Types
// ============================================================================

/// An authenticated deployment-failure event routed to its owning user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildFailedEvent {
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub deployment_id: DeploymentId,
    /// Event type tag from the delivery (e.g. `deployment.error`)
    pub event_type: String,
    /// Full delivery body as received
    pub payload: serde_json::Value,
}

impl BuildFailedEvent {
    /// Public deployment URL carried in the delivery, if any
    pub fn deployment_url(&self) -> Option<&str> {
        self.payload
            .get("payload")
            .and_then(|p| p.get("deployment"))
            .and_then(|d| d.get("url"))
            .and_then(|u| u.as_str())
            .filter(|u| !u.is_empty())
    }
}

/// Unique identifier for a published message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque token used to settle a received message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A message handed to a worker
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub message_id: MessageId,
    pub receipt: ReceiptHandle,
    pub event: BuildFailedEvent,
    pub enqueued_at: Timestamp,
    pub delivery_count: u32,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by queue implementations
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Message not found or already settled: {receipt}")]
    MessageNotFound { receipt: String },

    #[error("Queue is full ({capacity} messages pending)")]
    QueueFull { capacity: usize },

    #[error("Queue unavailable: {message}")]
    Unavailable { message: String },
}

impl QueueError {
    /// Check if error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::QueueFull { .. } | Self::Unavailable { .. })
    }

    /// Get error category for monitoring
    pub fn error_category(&self) -> ErrorCategory {
        if self.is_transient() {
            ErrorCategory::Transient
        } else {
            ErrorCategory::Permanent
        }
    }
}

// ============================================================================
// Queue Interface
// ============================================================================

/// Durable queue of failure events awaiting remediation
#[async_trait]
pub trait EventQueue: Send + Sync {
    /// Publish an event for asynchronous processing
    async fn publish(&self, event: BuildFailedEvent) -> Result<MessageId, QueueError>;

    /// Wait up to `timeout` for the next event
    async fn receive(&self, timeout: Duration) -> Result<Option<QueuedEvent>, QueueError>;

    /// Mark a received event as processed
    async fn complete(&self, receipt: &ReceiptHandle) -> Result<(), QueueError>;

    /// Move a received event to the dead-letter store
    async fn dead_letter(&self, receipt: &ReceiptHandle, reason: String) -> Result<(), QueueError>;
}
