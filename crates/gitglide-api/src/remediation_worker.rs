//! # Remediation Worker
//!
//! Consumes failure events from the [`EventQueue`] and runs the remediation
//! workflow for each, with a bounded number of runs in flight.
//!
//! Messages are settled exactly once: completed after a successful or
//! skipped run, dead-lettered with the error text after a failed one. There
//! is no automatic redelivery; the failed audit row is the operator's record.

use crate::metrics::ServiceMetrics;
use gitglide_core::{EventQueue, QueueError, QueuedEvent, RemediationWorkflow, WorkflowOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// How a received event was settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The workflow finished and the message was completed
    Completed(WorkflowOutcome),
    /// The workflow failed and the message was dead-lettered
    DeadLettered { error: String },
}

/// Queue consumer driving the remediation workflow
#[derive(Clone)]
pub struct RemediationWorker {
    queue: Arc<dyn EventQueue>,
    workflow: Arc<RemediationWorkflow>,
    metrics: Arc<ServiceMetrics>,
    slots: Arc<Semaphore>,
    poll_timeout: Duration,
}

impl RemediationWorker {
    pub fn new(
        queue: Arc<dyn EventQueue>,
        workflow: Arc<RemediationWorkflow>,
        metrics: Arc<ServiceMetrics>,
        concurrency: usize,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            workflow,
            metrics,
            slots: Arc::new(Semaphore::new(concurrency.max(1))),
            poll_timeout,
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Receive one event and process it inline
    ///
    /// Returns `Ok(None)` when no event arrived within the poll timeout.
    pub async fn process_next(&self) -> Result<Option<WorkerOutcome>, QueueError> {
        match self.queue.receive(self.poll_timeout).await? {
            Some(queued) => Ok(Some(self.process_event(queued).await)),
            None => Ok(None),
        }
    }

    /// Run the workflow for one received event and settle its message
    #[instrument(
        skip(self, queued),
        fields(
            message_id = %queued.message_id,
            deployment_id = %queued.event.deployment_id,
            delivery_count = queued.delivery_count,
        )
    )]
    pub async fn process_event(&self, queued: QueuedEvent) -> WorkerOutcome {
        self.metrics.workflows_in_flight.inc();
        let timer = self.metrics.workflow_duration_seconds.start_timer();
        let result = self.workflow.run(&queued.event).await;
        timer.observe_duration();
        self.metrics.workflows_in_flight.dec();

        match result {
            Ok(outcome) => {
                let label = match &outcome {
                    WorkflowOutcome::SessionCreated { session_id, log_id } => {
                        info!(log_id = %log_id, session_id = %session_id, "Remediation session created");
                        "success"
                    }
                    WorkflowOutcome::SkippedDuplicate { existing_log_id } => {
                        info!(existing_log_id = %existing_log_id, "Duplicate delivery skipped");
                        "skipped"
                    }
                };
                self.metrics
                    .workflow_runs_total
                    .with_label_values(&[label])
                    .inc();

                if let Err(e) = self.queue.complete(&queued.receipt).await {
                    warn!(error = %e, "Failed to complete queue message");
                }
                WorkerOutcome::Completed(outcome)
            }
            Err(e) => {
                self.metrics
                    .workflow_runs_total
                    .with_label_values(&["failed"])
                    .inc();
                self.metrics
                    .record_error(e.error_category(), e.is_transient());
                error!(
                    error = %e,
                    transient = e.is_transient(),
                    "Remediation workflow failed"
                );

                let reason = e.to_string();
                match self.queue.dead_letter(&queued.receipt, reason.clone()).await {
                    Ok(()) => self.metrics.dead_lettered_events_total.inc(),
                    Err(dl) => warn!(error = %dl, "Failed to dead-letter queue message"),
                }
                WorkerOutcome::DeadLettered { error: reason }
            }
        }
    }

    /// Consume the queue until `shutdown` flips to `true`, then wait for
    /// in-flight runs to finish
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            concurrency = self.slots.available_permits(),
            "Remediation worker started"
        );
        let mut tasks = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = tokio::select! {
                permit = self.slots.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let received = tokio::select! {
                received = self.queue.receive(self.poll_timeout) => received,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            match received {
                Ok(Some(queued)) => {
                    let worker = self.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        worker.process_event(queued).await;
                    });
                }
                Ok(None) => debug!("No events within poll timeout"),
                Err(e) => {
                    error!(error = %e, "Failed to receive from event queue");
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_timeout) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
            }

            // Reap finished runs so the set does not grow unbounded
            while tasks.try_join_next().is_some() {}
        }

        info!(in_flight = tasks.len(), "Remediation worker draining");
        while tasks.join_next().await.is_some() {}
        info!("Remediation worker stopped");
    }
}

#[cfg(test)]
#[path = "remediation_worker_tests.rs"]
mod tests;
