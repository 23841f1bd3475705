//! # Integration Configuration
//!
//! One row per (user, capability key). For Vercel auto-fix the key is
//! `vercel_project_{projectId}` and the opaque `config` blob holds the remote
//! webhook id and its signing secret.
//!
//! Rows are created by the registrar on enable and reset (never deleted) on
//! disable. The receiver reads them to route and authenticate deliveries.

use crate::storage::StorageError;
use crate::{CapabilityKey, Timestamp, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Per-user, per-capability enablement record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfig {
    pub user_id: UserId,
    pub key: CapabilityKey,
    pub enabled: bool,
    /// Opaque configuration blob; see [`AutofixSettings`] for the auto-fix shape
    pub config: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl IntegrationConfig {
    /// Decode the auto-fix settings stored in the config blob
    ///
    /// Returns `None` when the blob is empty or lacks a secret.
    pub fn autofix_settings(&self) -> Option<AutofixSettings> {
        AutofixSettings::from_value(&self.config)
    }

    /// Signing secret used to authenticate deliveries
    ///
    /// Only `secret` is required; rows without a `webhookId` still verify.
    pub fn signing_secret(&self) -> Option<&str> {
        self.config
            .get("secret")
            .and_then(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Auto-fix configuration written when a project webhook is registered
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutofixSettings {
    /// Identifier of the remote webhook, used to delete it on disable
    pub webhook_id: String,
    /// Signing secret returned by the platform at registration time
    pub secret: String,
}

impl AutofixSettings {
    /// Parse settings from a config blob, ignoring blobs without a secret
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let webhook_id = value.get("webhookId")?.as_str()?;
        let secret = value.get("secret")?.as_str()?;
        if secret.is_empty() {
            return None;
        }
        Some(Self {
            webhook_id: webhook_id.to_string(),
            secret: secret.to_string(),
        })
    }

    /// Encode settings as a config blob
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "webhookId": self.webhook_id,
            "secret": self.secret,
        })
    }
}

impl std::fmt::Debug for AutofixSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutofixSettings")
            .field("webhook_id", &self.webhook_id)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

/// Persistent store of integration configuration rows
#[async_trait]
pub trait IntegrationConfigStore: Send + Sync {
    /// Fetch the row for (user, key)
    async fn get(
        &self,
        user_id: &UserId,
        key: &CapabilityKey,
    ) -> Result<Option<IntegrationConfig>, StorageError>;

    /// Insert or replace the row for (user, key)
    ///
    /// At most one row exists per (user, key); a second upsert replaces the
    /// `enabled` flag and config blob of the first.
    async fn upsert(
        &self,
        user_id: &UserId,
        key: &CapabilityKey,
        enabled: bool,
        config: serde_json::Value,
    ) -> Result<IntegrationConfig, StorageError>;

    /// Update an existing row, failing with [`StorageError::ConfigNotFound`]
    /// when no row exists
    async fn update(
        &self,
        user_id: &UserId,
        key: &CapabilityKey,
        enabled: bool,
        config: serde_json::Value,
    ) -> Result<IntegrationConfig, StorageError>;

    /// Find the first enabled row with the given key, across all users
    async fn find_enabled_by_key(
        &self,
        key: &CapabilityKey,
    ) -> Result<Option<IntegrationConfig>, StorageError>;

    /// List a user's rows whose key starts with `key_prefix`
    async fn list_for_user(
        &self,
        user_id: &UserId,
        key_prefix: &str,
    ) -> Result<Vec<IntegrationConfig>, StorageError>;
}

#[cfg(test)]
#[path = "integration_config_tests.rs"]
mod tests;
