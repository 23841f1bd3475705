//! Prometheus metrics for the API service and remediation worker.
//!
//! Each [`ServiceMetrics`] owns its own [`Registry`], so several instances
//! (one per test router, for example) never collide on metric names.

use gitglide_core::ErrorCategory;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Service metrics for observability
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    // HTTP request metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: Histogram,

    // Webhook delivery metrics
    pub webhook_deliveries_total: IntCounterVec,
    pub signature_validation_failures: IntCounter,

    // Auto-fix toggle metrics
    pub autofix_toggles_total: IntCounterVec,

    // Remediation workflow metrics
    pub workflow_runs_total: IntCounterVec,
    pub workflow_duration_seconds: Histogram,
    pub workflows_in_flight: IntGauge,
    pub dead_lettered_events_total: IntCounter,

    // Error metrics
    pub error_rate_by_category: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new_custom(Some("gitglide".to_string()), None)?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "status"],
        )?;
        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request processing time",
            )
            .buckets(vec![0.001, 0.01, 0.1, 1.0, 10.0]),
        )?;
        let webhook_deliveries_total = IntCounterVec::new(
            Opts::new(
                "webhook_deliveries_total",
                "Inbound webhook deliveries by outcome",
            ),
            &["outcome"],
        )?;
        let signature_validation_failures = IntCounter::new(
            "signature_validation_failures",
            "Deliveries rejected for a missing or invalid signature",
        )?;
        let autofix_toggles_total = IntCounterVec::new(
            Opts::new("autofix_toggles_total", "Auto-fix toggle commands by result"),
            &["result"],
        )?;
        let workflow_runs_total = IntCounterVec::new(
            Opts::new("workflow_runs_total", "Remediation workflow runs by outcome"),
            &["outcome"],
        )?;
        let workflow_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "workflow_duration_seconds",
                "Remediation workflow run time distribution",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        )?;
        let workflows_in_flight =
            IntGauge::new("workflows_in_flight", "Remediation workflows currently running")?;
        let dead_lettered_events_total = IntCounter::new(
            "dead_lettered_events_total",
            "Failure events moved to the dead-letter store",
        )?;
        let error_rate_by_category = IntCounterVec::new(
            Opts::new(
                "error_rate_by_category",
                "Errors grouped by category and transience",
            ),
            &["category", "transient"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(webhook_deliveries_total.clone()))?;
        registry.register(Box::new(signature_validation_failures.clone()))?;
        registry.register(Box::new(autofix_toggles_total.clone()))?;
        registry.register(Box::new(workflow_runs_total.clone()))?;
        registry.register(Box::new(workflow_duration_seconds.clone()))?;
        registry.register(Box::new(workflows_in_flight.clone()))?;
        registry.register(Box::new(dead_lettered_events_total.clone()))?;
        registry.register(Box::new(error_rate_by_category.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Arc::new(Self {
            registry,
            http_requests_total,
            http_request_duration,
            webhook_deliveries_total,
            signature_validation_failures,
            autofix_toggles_total,
            workflow_runs_total,
            workflow_duration_seconds,
            workflows_in_flight,
            dead_lettered_events_total,
            error_rate_by_category,
        }))
    }

    /// Count an error under its category
    pub fn record_error(&self, category: ErrorCategory, transient: bool) {
        let category = match category {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Security => "security",
            ErrorCategory::Configuration => "configuration",
        };
        self.error_rate_by_category
            .with_label_values(&[category, if transient { "true" } else { "false" }])
            .inc();
    }

    /// Encode every registered metric in the Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
