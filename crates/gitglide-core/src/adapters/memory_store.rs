//! # In-Memory Store
//!
//! Thread-safe implementation of [`IntegrationConfigStore`] and
//! [`WebhookLogStore`] for testing and development. The same state type backs
//! the file-backed store, which adds snapshot persistence on every write.

use crate::integration_config::{IntegrationConfig, IntegrationConfigStore};
use crate::storage::StorageError;
use crate::webhook_log::{
    LogCreation, LogOutcome, LogStatus, NewWebhookLog, WebhookLog, WebhookLogQuery,
    WebhookLogStore, WorkflowStep,
};
use crate::{CapabilityKey, DeploymentId, Timestamp, UserId, WebhookLogId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

// ============================================================================
// Shared State
// ============================================================================

/// Rows held by the in-memory and file-backed stores
///
/// Logs are kept in creation order so "newest first" is a reverse scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
    #[serde(default)]
    configs: Vec<IntegrationConfig>,
    #[serde(default)]
    logs: Vec<WebhookLog>,
}

impl StoreState {
    fn config_position(&self, user_id: &UserId, key: &CapabilityKey) -> Option<usize> {
        self.configs
            .iter()
            .position(|c| &c.user_id == user_id && &c.key == key)
    }

    fn log_mut(&mut self, id: &WebhookLogId) -> Result<&mut WebhookLog, StorageError> {
        self.logs
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or(StorageError::LogNotFound { id: *id })
    }

    pub(crate) fn get_config(
        &self,
        user_id: &UserId,
        key: &CapabilityKey,
    ) -> Option<IntegrationConfig> {
        self.config_position(user_id, key)
            .map(|i| self.configs[i].clone())
    }

    pub(crate) fn upsert_config(
        &mut self,
        user_id: &UserId,
        key: &CapabilityKey,
        enabled: bool,
        config: serde_json::Value,
    ) -> IntegrationConfig {
        let now = Timestamp::now();
        match self.config_position(user_id, key) {
            Some(i) => {
                let row = &mut self.configs[i];
                row.enabled = enabled;
                row.config = config;
                row.updated_at = now;
                row.clone()
            }
            None => {
                let row = IntegrationConfig {
                    user_id: user_id.clone(),
                    key: key.clone(),
                    enabled,
                    config,
                    created_at: now,
                    updated_at: now,
                };
                self.configs.push(row.clone());
                row
            }
        }
    }

    pub(crate) fn update_config(
        &mut self,
        user_id: &UserId,
        key: &CapabilityKey,
        enabled: bool,
        config: serde_json::Value,
    ) -> Result<IntegrationConfig, StorageError> {
        if self.config_position(user_id, key).is_none() {
            return Err(StorageError::ConfigNotFound {
                key: key.to_string(),
            });
        }
        Ok(self.upsert_config(user_id, key, enabled, config))
    }

    pub(crate) fn find_enabled_config(&self, key: &CapabilityKey) -> Option<IntegrationConfig> {
        self.configs
            .iter()
            .find(|c| &c.key == key && c.enabled)
            .cloned()
    }

    pub(crate) fn list_configs(&self, user_id: &UserId, key_prefix: &str) -> Vec<IntegrationConfig> {
        self.configs
            .iter()
            .filter(|c| &c.user_id == user_id && c.key.as_str().starts_with(key_prefix))
            .cloned()
            .collect()
    }

    pub(crate) fn insert_log(&mut self, new_log: NewWebhookLog) -> WebhookLog {
        let log = new_log.into_log();
        self.logs.push(log.clone());
        log
    }

    pub(crate) fn insert_log_unless_active(&mut self, new_log: NewWebhookLog) -> LogCreation {
        let existing = new_log
            .deployment_id
            .as_ref()
            .and_then(|deployment_id| self.find_active_log(deployment_id));
        match existing {
            Some(existing) => LogCreation::Existing(existing),
            None => LogCreation::Created(self.insert_log(new_log)),
        }
    }

    pub(crate) fn get_log(&self, id: &WebhookLogId) -> Option<WebhookLog> {
        self.logs.iter().find(|l| &l.id == id).cloned()
    }

    pub(crate) fn record_step(
        &mut self,
        id: &WebhookLogId,
        step: WorkflowStep,
    ) -> Result<(), StorageError> {
        self.log_mut(id)?.record_step(step)
    }

    pub(crate) fn complete_log(
        &mut self,
        id: &WebhookLogId,
        outcome: LogOutcome,
    ) -> Result<WebhookLog, StorageError> {
        let log = self.log_mut(id)?;
        log.apply_outcome(outcome)?;
        Ok(log.clone())
    }

    pub(crate) fn list_logs(&self, query: &WebhookLogQuery) -> Vec<WebhookLog> {
        self.logs
            .iter()
            .rev()
            .filter(|l| query.matches(l))
            .take(query.limit)
            .cloned()
            .collect()
    }

    pub(crate) fn find_active_log(&self, deployment_id: &DeploymentId) -> Option<WebhookLog> {
        self.logs
            .iter()
            .rev()
            .find(|l| {
                l.deployment_id.as_ref() == Some(deployment_id) && l.status != LogStatus::Failed
            })
            .cloned()
    }

    pub(crate) fn stale_logs(&self, cutoff: Timestamp) -> Vec<WebhookLog> {
        self.logs
            .iter()
            .filter(|l| l.status == LogStatus::Processing && l.updated_at < cutoff)
            .cloned()
            .collect()
    }
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// In-memory implementation of both stores
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of audit rows held
    pub async fn log_count(&self) -> usize {
        self.state.read().await.logs.len()
    }

    /// Number of integration config rows held
    pub async fn config_count(&self) -> usize {
        self.state.read().await.configs.len()
    }
}

#[async_trait]
impl IntegrationConfigStore for InMemoryStore {
    async fn get(
        &self,
        user_id: &UserId,
        key: &CapabilityKey,
    ) -> Result<Option<IntegrationConfig>, StorageError> {
        Ok(self.state.read().await.get_config(user_id, key))
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        key: &CapabilityKey,
        enabled: bool,
        config: serde_json::Value,
    ) -> Result<IntegrationConfig, StorageError> {
        Ok(self
            .state
            .write()
            .await
            .upsert_config(user_id, key, enabled, config))
    }

    async fn update(
        &self,
        user_id: &UserId,
        key: &CapabilityKey,
        enabled: bool,
        config: serde_json::Value,
    ) -> Result<IntegrationConfig, StorageError> {
        self.state
            .write()
            .await
            .update_config(user_id, key, enabled, config)
    }

    async fn find_enabled_by_key(
        &self,
        key: &CapabilityKey,
    ) -> Result<Option<IntegrationConfig>, StorageError> {
        Ok(self.state.read().await.find_enabled_config(key))
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        key_prefix: &str,
    ) -> Result<Vec<IntegrationConfig>, StorageError> {
        Ok(self.state.read().await.list_configs(user_id, key_prefix))
    }
}

#[async_trait]
impl WebhookLogStore for InMemoryStore {
    async fn create(&self, new_log: NewWebhookLog) -> Result<WebhookLog, StorageError> {
        Ok(self.state.write().await.insert_log(new_log))
    }

    async fn create_unless_active(
        &self,
        new_log: NewWebhookLog,
    ) -> Result<LogCreation, StorageError> {
        Ok(self.state.write().await.insert_log_unless_active(new_log))
    }

    async fn get(&self, id: &WebhookLogId) -> Result<Option<WebhookLog>, StorageError> {
        Ok(self.state.read().await.get_log(id))
    }

    async fn record_step(&self, id: &WebhookLogId, step: WorkflowStep) -> Result<(), StorageError> {
        self.state.write().await.record_step(id, step)
    }

    async fn complete(
        &self,
        id: &WebhookLogId,
        outcome: LogOutcome,
    ) -> Result<WebhookLog, StorageError> {
        self.state.write().await.complete_log(id, outcome)
    }

    async fn list_recent(&self, query: &WebhookLogQuery) -> Result<Vec<WebhookLog>, StorageError> {
        Ok(self.state.read().await.list_logs(query))
    }

    async fn find_active_for_deployment(
        &self,
        deployment_id: &DeploymentId,
    ) -> Result<Option<WebhookLog>, StorageError> {
        Ok(self.state.read().await.find_active_log(deployment_id))
    }

    async fn list_stale_processing(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<WebhookLog>, StorageError> {
        Ok(self.state.read().await.stale_logs(cutoff))
    }
}

#[cfg(test)]
#[path = "memory_store_tests.rs"]
mod tests;
