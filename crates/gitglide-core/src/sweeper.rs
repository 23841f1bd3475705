//! # Stale Log Sweeper
//!
//! A run that crashes between creating its log row and writing the terminal
//! status leaves the row at `processing`. The sweeper marks such rows
//! `failed` once they have not been touched for the configured staleness
//! window. Rows are never requeued.

use crate::storage::StorageError;
use crate::webhook_log::{LogOutcome, WebhookLogStore};
use crate::Timestamp;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Marks abandoned `processing` rows as failed
pub struct StaleLogSweeper {
    logs: Arc<dyn WebhookLogStore>,
    stale_after: Duration,
}

impl StaleLogSweeper {
    pub fn new(logs: Arc<dyn WebhookLogStore>, stale_after: Duration) -> Self {
        Self { logs, stale_after }
    }

    /// Fail every stale row once; returns the number of rows marked
    #[instrument(skip(self), fields(stale_after_secs = self.stale_after.as_secs()))]
    pub async fn sweep_once(&self) -> Result<usize, StorageError> {
        let cutoff = Timestamp::now().subtract_duration(self.stale_after);
        let stale = self.logs.list_stale_processing(cutoff).await?;

        let mut marked = 0;
        for log in stale {
            let step = log
                .last_step
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let outcome = LogOutcome::Failed {
                error: format!(
                    "Workflow abandoned after step '{}'; no status update within {}s",
                    step,
                    self.stale_after.as_secs()
                ),
            };

            match self.logs.complete(&log.id, outcome).await {
                Ok(_) => {
                    warn!(log_id = %log.id, last_step = %step, "Marked stale workflow as failed");
                    marked += 1;
                }
                // The run finished between the listing and this write
                Err(StorageError::AlreadyTerminal { .. }) => {
                    debug!(log_id = %log.id, "Row completed concurrently");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(marked)
    }

    /// Sweep on a fixed interval until `shutdown` flips to `true`
    pub async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "Stale log sweeper started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "Stale log sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Stale log sweeper stopped");
    }
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
