//! Storage, queue and upstream wiring for the service binary.

use anyhow::Context;
use gitglide_api::{Backends, ServiceConfig};
use gitglide_core::adapters::{
    FileBackedEventQueue, FileBackedStore, InMemoryCredentialVault, InMemoryEventQueue,
    InMemoryStore,
};
use gitglide_core::upstream::{JulesClient, VercelClient};
use gitglide_core::{EventQueue, IntegrationConfigStore, WebhookLogStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Build the backends described by `config`
///
/// Integration configs and audit rows share one store. The store and the
/// event queue are JSON snapshots under `storage.data_dir` when set and
/// process memory otherwise. Provider credentials are always held in memory.
pub async fn build_backends(config: &ServiceConfig) -> anyhow::Result<Backends> {
    let upstream = config.upstream_config();
    let platform = VercelClient::new(&upstream).context("failed to build Vercel client")?;
    let agent = JulesClient::new(&upstream).context("failed to build Jules client")?;

    let (configs, logs, queue): (
        Arc<dyn IntegrationConfigStore>,
        Arc<dyn WebhookLogStore>,
        Arc<dyn EventQueue>,
    ) = match &config.storage.data_dir {
        Some(data_dir) => {
            let store = FileBackedStore::open(data_dir.clone())
                .await
                .with_context(|| format!("failed to open store in {}", data_dir.display()))?;
            let queue = FileBackedEventQueue::open(data_dir.clone())
                .await
                .with_context(|| format!("failed to open queue in {}", data_dir.display()))?;
            info!(data_dir = %data_dir.display(), "Using file-backed store and queue");
            warn!(
                "Provider credentials are held in memory; enabled projects fail remediation \
                 until users re-enter their keys after a restart"
            );
            (Arc::new(store.clone()), Arc::new(store), Arc::new(queue))
        }
        None => {
            warn!(
                "No storage.data_dir configured; integration state and queued events \
                 will not survive restarts"
            );
            let store = InMemoryStore::new();
            (
                Arc::new(store.clone()),
                Arc::new(store),
                Arc::new(InMemoryEventQueue::new()),
            )
        }
    };

    Ok(Backends {
        vault: Arc::new(InMemoryCredentialVault::new()),
        configs,
        logs,
        queue,
        platform: Arc::new(platform),
        agent: Arc::new(agent),
    })
}

#[cfg(test)]
#[path = "backends_tests.rs"]
mod tests;
