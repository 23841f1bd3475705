//! # Storage Errors
//!
//! Error type shared by the integration-config and audit-log stores.

use crate::{ErrorCategory, WebhookLogId};

/// Errors raised by persistent stores
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Webhook log not found: {id}")]
    LogNotFound { id: WebhookLogId },

    #[error("Integration config not found: {key}")]
    ConfigNotFound { key: String },

    #[error("Webhook log {id} already reached a terminal status")]
    AlreadyTerminal { id: WebhookLogId },

    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },

    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl StorageError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Io { .. })
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

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}
