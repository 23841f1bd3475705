//! # File-Backed Store
//!
//! Keeps integration configs and audit rows in memory and persists a JSON
//! snapshot to `<data_dir>/gitglide-store.json` after every write. Writes go
//! to a temporary file first and are then renamed over the snapshot.

use super::memory_store::StoreState;
use crate::integration_config::{IntegrationConfig, IntegrationConfigStore};
use crate::storage::StorageError;
use crate::webhook_log::{
    LogCreation, LogOutcome, NewWebhookLog, WebhookLog, WebhookLogQuery, WebhookLogStore,
    WorkflowStep,
};
use crate::{CapabilityKey, DeploymentId, Timestamp, UserId, WebhookLogId};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Snapshot file name within the data directory
pub const SNAPSHOT_FILE_NAME: &str = "gitglide-store.json";

/// Store persisting its state as a JSON snapshot
///
/// # Examples
///
/// ```no_run
/// use gitglide_core::adapters::FileBackedStore;
/// use std::path::PathBuf;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FileBackedStore::open(PathBuf::from("./data")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FileBackedStore {
    snapshot_path: PathBuf,
    state: Arc<RwLock<StoreState>>,
}

impl FileBackedStore {
    /// Open the store, loading an existing snapshot when present
    ///
    /// # Errors
    ///
    /// Returns error if the data directory cannot be created or the snapshot
    /// cannot be read or parsed.
    #[instrument]
    pub async fn open(data_dir: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&data_dir).await?;
        let snapshot_path = data_dir.join(SNAPSHOT_FILE_NAME);

        let state = if fs::try_exists(&snapshot_path).await? {
            let bytes = fs::read(&snapshot_path).await?;
            serde_json::from_slice::<StoreState>(&bytes)?
        } else {
            StoreState::default()
        };

        info!(path = %snapshot_path.display(), "File-backed store opened");
        Ok(Self {
            snapshot_path,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Location of the snapshot file
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    async fn persist(&self, state: &StoreState) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(state)?;

        let temp_path = self.snapshot_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.snapshot_path).await?;
        debug!(bytes = json.len(), "Store snapshot written");
        Ok(())
    }

    /// Apply a mutation under the write lock and persist the result
    ///
    /// The in-memory state is rolled back if the snapshot cannot be written.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut state = self.state.write().await;
        let previous = state.clone();

        let result = f(&mut state)?;
        if let Err(e) = self.persist(&state).await {
            *state = previous;
            return Err(e);
        }
        Ok(result)
    }
}

#[async_trait]
impl IntegrationConfigStore for FileBackedStore {
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
        self.mutate(|s| Ok(s.upsert_config(user_id, key, enabled, config)))
            .await
    }

    async fn update(
        &self,
        user_id: &UserId,
        key: &CapabilityKey,
        enabled: bool,
        config: serde_json::Value,
    ) -> Result<IntegrationConfig, StorageError> {
        self.mutate(|s| s.update_config(user_id, key, enabled, config))
            .await
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
impl WebhookLogStore for FileBackedStore {
    async fn create(&self, new_log: NewWebhookLog) -> Result<WebhookLog, StorageError> {
        self.mutate(|s| Ok(s.insert_log(new_log))).await
    }

    async fn create_unless_active(
        &self,
        new_log: NewWebhookLog,
    ) -> Result<LogCreation, StorageError> {
        self.mutate(|s| Ok(s.insert_log_unless_active(new_log)))
            .await
    }

    async fn get(&self, id: &WebhookLogId) -> Result<Option<WebhookLog>, StorageError> {
        Ok(self.state.read().await.get_log(id))
    }

    async fn record_step(&self, id: &WebhookLogId, step: WorkflowStep) -> Result<(), StorageError> {
        self.mutate(|s| s.record_step(id, step)).await
    }

    async fn complete(
        &self,
        id: &WebhookLogId,
        outcome: LogOutcome,
    ) -> Result<WebhookLog, StorageError> {
        self.mutate(|s| s.complete_log(id, outcome)).await
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

    async fn health_check(&self) -> Result<(), StorageError> {
        let parent = self
            .snapshot_path
            .parent()
            .ok_or_else(|| StorageError::Unavailable {
                message: "snapshot path has no parent directory".to_string(),
            })?;
        let metadata = fs::metadata(parent).await?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(StorageError::Unavailable {
                message: format!("{} is not a directory", parent.display()),
            })
        }
    }
}

#[cfg(test)]
#[path = "file_store_tests.rs"]
mod tests;
