//! Tests for [`ServiceMetrics`].

use super::*;

#[test]
fn test_instances_do_not_share_registries() {
    let first = ServiceMetrics::new().unwrap();
    let second = ServiceMetrics::new().unwrap();

    first.signature_validation_failures.inc();

    assert_eq!(first.signature_validation_failures.get(), 1);
    assert_eq!(second.signature_validation_failures.get(), 0);
}

#[test]
fn test_render_includes_namespaced_counters() {
    let metrics = ServiceMetrics::new().unwrap();
    metrics
        .webhook_deliveries_total
        .with_label_values(&["dispatched"])
        .inc();
    metrics.record_error(ErrorCategory::Security, false);

    let text = metrics.render().unwrap();
    assert!(text.contains("gitglide_webhook_deliveries_total{outcome=\"dispatched\"} 1"));
    assert!(text.contains("gitglide_error_rate_by_category{category=\"security\",transient=\"false\"} 1"));
}
