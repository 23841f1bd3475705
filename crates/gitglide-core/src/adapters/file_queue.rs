//! # File-Backed Event Queue
//!
//! [`EventQueue`] that persists its messages as a JSON snapshot at
//! `<data_dir>/gitglide-queue.json`. A publish returns only after the
//! snapshot holding the new message has been written, so an acknowledged
//! delivery survives a restart.
//!
//! Messages that were in flight when the process stopped are pending again
//! after [`FileBackedEventQueue::open`].

use super::memory_queue::{
    receive_within, DeadLetteredEvent, QueueSnapshot, QueueState, DEFAULT_QUEUE_CAPACITY,
};
use crate::event_queue::{
    BuildFailedEvent, EventQueue, MessageId, QueueError, QueuedEvent, ReceiptHandle,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, instrument, warn};

/// Snapshot file name within the data directory
pub const QUEUE_FILE_NAME: &str = "gitglide-queue.json";

fn unavailable(context: &str, e: impl std::fmt::Display) -> QueueError {
    QueueError::Unavailable {
        message: format!("{}: {}", context, e),
    }
}

/// Queue persisting pending and dead-lettered messages to disk
#[derive(Clone)]
pub struct FileBackedEventQueue {
    snapshot_path: PathBuf,
    state: Arc<Mutex<QueueState>>,
    available: Arc<Notify>,
    capacity: usize,
}

impl FileBackedEventQueue {
    /// Open the queue, restoring messages from an existing snapshot
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Unavailable`] if the data directory cannot be
    /// created or the snapshot cannot be read or parsed.
    #[instrument]
    pub async fn open(data_dir: PathBuf) -> Result<Self, QueueError> {
        fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| unavailable("failed to create queue directory", e))?;
        let snapshot_path = data_dir.join(QUEUE_FILE_NAME);

        let exists = fs::try_exists(&snapshot_path)
            .await
            .map_err(|e| unavailable("failed to inspect queue snapshot", e))?;
        let snapshot = if exists {
            let bytes = fs::read(&snapshot_path)
                .await
                .map_err(|e| unavailable("failed to read queue snapshot", e))?;
            serde_json::from_slice::<QueueSnapshot>(&bytes)
                .map_err(|e| unavailable("failed to parse queue snapshot", e))?
        } else {
            QueueSnapshot::default()
        };

        let restored = snapshot.pending_len();
        if restored > 0 {
            warn!(pending = restored, "Restored unprocessed events from previous run");
        }
        info!(path = %snapshot_path.display(), "File-backed queue opened");

        Ok(Self {
            snapshot_path,
            state: Arc::new(Mutex::new(QueueState::from_snapshot(snapshot))),
            available: Arc::new(Notify::new()),
            capacity: DEFAULT_QUEUE_CAPACITY,
        })
    }

    /// Bound the number of pending messages
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Location of the snapshot file
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Number of messages waiting to be received
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending_len()
    }

    /// Snapshot of dead-lettered messages
    pub async fn dead_letters(&self) -> Vec<DeadLetteredEvent> {
        self.state.lock().await.dead_letters()
    }

    async fn persist(&self, state: &QueueState) -> Result<(), QueueError> {
        let json = serde_json::to_vec_pretty(&state.snapshot())
            .map_err(|e| unavailable("failed to encode queue snapshot", e))?;

        let temp_path = self.snapshot_path.with_extension("tmp");
        let write = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&json).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &self.snapshot_path).await
        };
        write
            .await
            .map_err(|e| unavailable("failed to write queue snapshot", e))?;

        debug!(bytes = json.len(), "Queue snapshot written");
        Ok(())
    }

    /// Apply a mutation under the lock and persist the result
    ///
    /// The in-memory state is rolled back if the snapshot cannot be written.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut QueueState) -> Result<T, QueueError>,
    ) -> Result<T, QueueError> {
        let mut state = self.state.lock().await;
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
impl EventQueue for FileBackedEventQueue {
    async fn publish(&self, event: BuildFailedEvent) -> Result<MessageId, QueueError> {
        let capacity = self.capacity;
        let message_id = self.mutate(|s| s.push(capacity, event)).await?;

        self.available.notify_one();
        debug!(message_id = %message_id, "Event published");
        Ok(message_id)
    }

    async fn receive(&self, timeout: Duration) -> Result<Option<QueuedEvent>, QueueError> {
        Ok(receive_within(&self.available, timeout, || async {
            self.state.lock().await.take()
        })
        .await)
    }

    async fn complete(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        self.mutate(|s| s.complete(receipt)).await
    }

    async fn dead_letter(&self, receipt: &ReceiptHandle, reason: String) -> Result<(), QueueError> {
        self.mutate(|s| s.dead_letter(receipt, reason)).await
    }
}

#[cfg(test)]
#[path = "file_queue_tests.rs"]
mod tests;
