//! # In-Memory Event Queue
//!
//! Process-local [`EventQueue`] used by tests and development. FIFO
//! delivery, one in-flight copy per message, and a dead-letter list that can
//! be inspected for operations and assertions. The same state type backs the
//! file-backed queue.

use crate::event_queue::{
    BuildFailedEvent, EventQueue, MessageId, QueueError, QueuedEvent, ReceiptHandle,
};
use crate::Timestamp;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

/// Default bound on pending messages
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredEvent {
    message_id: MessageId,
    event: BuildFailedEvent,
    enqueued_at: Timestamp,
    delivery_count: u32,
}

/// Event that was dead-lettered, with the recorded reason
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetteredEvent {
    pub message_id: MessageId,
    pub event: BuildFailedEvent,
    pub reason: String,
    pub dead_lettered_at: Timestamp,
}

// ============================================================================
// Shared State
// ============================================================================

/// Persisted form of the queue
///
/// Messages that were in flight when the snapshot was taken are stored ahead
/// of the pending ones and become pending again on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueueSnapshot {
    #[serde(default)]
    pending: Vec<StoredEvent>,
    #[serde(default)]
    dead_letter: Vec<DeadLetteredEvent>,
}

impl QueueSnapshot {
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Messages held by the in-memory and file-backed queues
#[derive(Debug, Clone, Default)]
pub(crate) struct QueueState {
    pending: VecDeque<StoredEvent>,
    in_flight: HashMap<ReceiptHandle, StoredEvent>,
    dead_letter: Vec<DeadLetteredEvent>,
}

impl QueueState {
    pub(crate) fn from_snapshot(snapshot: QueueSnapshot) -> Self {
        Self {
            pending: snapshot.pending.into(),
            in_flight: HashMap::new(),
            dead_letter: snapshot.dead_letter,
        }
    }

    pub(crate) fn snapshot(&self) -> QueueSnapshot {
        let mut in_flight: Vec<StoredEvent> = self.in_flight.values().cloned().collect();
        in_flight.sort_by_key(|stored| stored.enqueued_at);

        QueueSnapshot {
            pending: in_flight
                .into_iter()
                .chain(self.pending.iter().cloned())
                .collect(),
            dead_letter: self.dead_letter.clone(),
        }
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn dead_letters(&self) -> Vec<DeadLetteredEvent> {
        self.dead_letter.clone()
    }

    pub(crate) fn push(
        &mut self,
        capacity: usize,
        event: BuildFailedEvent,
    ) -> Result<MessageId, QueueError> {
        if self.pending.len() >= capacity {
            warn!(capacity, "Event queue is full");
            return Err(QueueError::QueueFull { capacity });
        }

        let message_id = MessageId::new();
        self.pending.push_back(StoredEvent {
            message_id: message_id.clone(),
            event,
            enqueued_at: Timestamp::now(),
            delivery_count: 0,
        });
        Ok(message_id)
    }

    pub(crate) fn take(&mut self) -> Option<QueuedEvent> {
        let mut stored = self.pending.pop_front()?;
        stored.delivery_count += 1;

        let receipt = ReceiptHandle::new(uuid::Uuid::new_v4().to_string());
        let queued = QueuedEvent {
            message_id: stored.message_id.clone(),
            receipt: receipt.clone(),
            event: stored.event.clone(),
            enqueued_at: stored.enqueued_at,
            delivery_count: stored.delivery_count,
        };
        self.in_flight.insert(receipt, stored);
        Some(queued)
    }

    pub(crate) fn complete(&mut self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        self.in_flight
            .remove(receipt)
            .map(|_| ())
            .ok_or_else(|| QueueError::MessageNotFound {
                receipt: receipt.as_str().to_string(),
            })
    }

    pub(crate) fn dead_letter(
        &mut self,
        receipt: &ReceiptHandle,
        reason: String,
    ) -> Result<(), QueueError> {
        let stored = self
            .in_flight
            .remove(receipt)
            .ok_or_else(|| QueueError::MessageNotFound {
                receipt: receipt.as_str().to_string(),
            })?;

        self.dead_letter.push(DeadLetteredEvent {
            message_id: stored.message_id,
            event: stored.event,
            reason,
            dead_lettered_at: Timestamp::now(),
        });
        Ok(())
    }
}

/// Wait up to `timeout` for `try_take` to yield a message, waking on `available`
pub(crate) async fn receive_within<F, Fut>(
    available: &Notify,
    timeout: Duration,
    mut try_take: F,
) -> Option<QueuedEvent>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<QueuedEvent>>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if let Some(queued) = try_take().await {
            return Some(queued);
        }

        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return None;
        }

        if tokio::time::timeout(remaining, available.notified())
            .await
            .is_err()
        {
            // One last look in case a publish raced the timeout
            return try_take().await;
        }
    }
}

// ============================================================================
// In-Memory Queue
// ============================================================================

/// Thread-safe in-memory queue
#[derive(Clone)]
pub struct InMemoryEventQueue {
    state: Arc<Mutex<QueueState>>,
    available: Arc<Notify>,
    capacity: usize,
}

impl InMemoryEventQueue {
    /// Create an empty queue with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create an empty queue bounded to `capacity` pending messages
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            available: Arc::new(Notify::new()),
            capacity,
        }
    }

    /// Number of messages waiting to be received
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending_len()
    }

    /// Number of messages received but not yet settled
    pub async fn in_flight_count(&self) -> usize {
        self.state.lock().await.in_flight_len()
    }

    /// Snapshot of dead-lettered messages
    pub async fn dead_letters(&self) -> Vec<DeadLetteredEvent> {
        self.state.lock().await.dead_letters()
    }
}

impl Default for InMemoryEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventQueue for InMemoryEventQueue {
    async fn publish(&self, event: BuildFailedEvent) -> Result<MessageId, QueueError> {
        let message_id = self.state.lock().await.push(self.capacity, event)?;

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
        self.state.lock().await.complete(receipt)
    }

    async fn dead_letter(&self, receipt: &ReceiptHandle, reason: String) -> Result<(), QueueError> {
        self.state.lock().await.dead_letter(receipt, reason)
    }
}

#[cfg(test)]
#[path = "memory_queue_tests.rs"]
mod tests;
