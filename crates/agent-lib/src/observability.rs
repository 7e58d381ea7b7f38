//! Observability infrastructure for the monitoring agent
//!
//! Provides:
//! - Prometheus metrics (cycle latency, alert and dispatch counters, last observed values)
//! - Structured JSON logging of agent events with tracing

use crate::alert::{Alert, Severity};
use crate::models::Status;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for cycle latency (in seconds)
const CYCLE_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    cycle_duration_seconds: Histogram,
    cycles_total: IntCounter,
    cycle_failures_total: IntCounter,
    alerts_raised_total: IntCounterVec,
    alerts_suppressed_total: IntCounter,
    dispatch_failures_total: IntCounterVec,
    skipped_sources_total: IntCounter,
    metric_value: GaugeVec,
    overall_status: IntGauge,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            cycle_duration_seconds: register_histogram!(
                "sre_agent_cycle_duration_seconds",
                "Time spent running one collect-classify-alert-summarize cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            cycles_total: register_int_counter!(
                "sre_agent_cycles_total",
                "Total number of monitoring cycles started"
            )
            .expect("Failed to register cycles_total"),

            cycle_failures_total: register_int_counter!(
                "sre_agent_cycle_failures_total",
                "Total number of monitoring cycles that failed"
            )
            .expect("Failed to register cycle_failures_total"),

            alerts_raised_total: register_int_counter_vec!(
                "sre_agent_alerts_raised_total",
                "Total number of alerts raised by severity",
                &["severity"]
            )
            .expect("Failed to register alerts_raised_total"),

            alerts_suppressed_total: register_int_counter!(
                "sre_agent_alerts_suppressed_total",
                "Total number of breaches suppressed by an active incident"
            )
            .expect("Failed to register alerts_suppressed_total"),

            dispatch_failures_total: register_int_counter_vec!(
                "sre_agent_dispatch_failures_total",
                "Total number of failed alert deliveries by channel",
                &["channel"]
            )
            .expect("Failed to register dispatch_failures_total"),

            skipped_sources_total: register_int_counter!(
                "sre_agent_skipped_sources_total",
                "Total number of metric sources skipped during collection"
            )
            .expect("Failed to register skipped_sources_total"),

            metric_value: register_gauge_vec!(
                "sre_agent_metric_value_percent",
                "Last observed usage per metric source",
                &["metric", "identifier"]
            )
            .expect("Failed to register metric_value"),

            overall_status: register_int_gauge!(
                "sre_agent_overall_status",
                "Overall status of the last cycle (0 healthy, 1 warning, 2 critical)"
            )
            .expect("Failed to register overall_status"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new)
    }

    pub fn observe_cycle_duration(&self, duration_secs: f64) {
        self.inner().cycle_duration_seconds.observe(duration_secs);
    }

    pub fn inc_cycles(&self) {
        self.inner().cycles_total.inc();
    }

    pub fn inc_cycle_failures(&self) {
        self.inner().cycle_failures_total.inc();
    }

    pub fn inc_alerts_raised(&self, severity: Severity) {
        self.inner()
            .alerts_raised_total
            .with_label_values(&[severity.as_str()])
            .inc();
    }

    pub fn add_alerts_suppressed(&self, count: usize) {
        self.inner().alerts_suppressed_total.inc_by(count as u64);
    }

    pub fn inc_dispatch_failures(&self, channel: &str) {
        self.inner()
            .dispatch_failures_total
            .with_label_values(&[channel])
            .inc();
    }

    pub fn add_skipped_sources(&self, count: usize) {
        self.inner().skipped_sources_total.inc_by(count as u64);
    }

    pub fn set_metric_value(&self, metric: &str, identifier: &str, value: f64) {
        self.inner()
            .metric_value
            .with_label_values(&[metric, identifier])
            .set(value);
    }

    pub fn set_overall_status(&self, status: Status) {
        self.inner().overall_status.set(status.as_gauge());
    }
}

/// Structured logger for agent events
///
/// Emits consistently named events so JSON log pipelines can key on `event`.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, mode: &str, interval_secs: u64) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            mode = %mode,
            interval_secs = interval_secs,
            "SRE agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "SRE agent shutting down"
        );
    }

    pub fn log_cycle(
        &self,
        cycle: u64,
        overall_status: Status,
        alerts: usize,
        suppressed: usize,
        elapsed_ms: u128,
    ) {
        info!(
            event = "cycle_completed",
            node = %self.node_name,
            cycle = cycle,
            overall_status = %overall_status,
            alerts = alerts,
            suppressed = suppressed,
            elapsed_ms = elapsed_ms as u64,
            "Check completed - Overall Status: {}",
            overall_status
        );
        if alerts > 0 {
            warn!(
                event = "cycle_alerts",
                node = %self.node_name,
                cycle = cycle,
                alerts = alerts,
                "Generated {} alert(s)",
                alerts
            );
        }
    }

    pub fn log_cycle_failure(&self, cycle: u64, error: &dyn std::error::Error) {
        error!(
            event = "cycle_failed",
            node = %self.node_name,
            cycle = cycle,
            error = %error,
            "Error during monitoring check"
        );
    }

    pub fn log_alert_raised(&self, alert: &Alert) {
        info!(
            event = "alert_raised",
            node = %self.node_name,
            alert_id = alert.id,
            severity = %alert.severity,
            metric = %alert.source_metric.metric_kind,
            identifier = %alert.source_metric.identifier,
            value = alert.source_metric.value,
            threshold = alert.source_metric.threshold,
            "Alert raised"
        );
    }

    pub fn log_skipped(&self, source: &str, reason: &str) {
        warn!(
            event = "source_skipped",
            node = %self.node_name,
            source = %source,
            reason = %reason,
            "Metric source skipped"
        );
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_metrics_handles_share_registry() {
        let metrics = AgentMetrics::new();
        let other = metrics.clone();

        metrics.observe_cycle_duration(0.5);
        metrics.inc_cycles();
        metrics.inc_alerts_raised(Severity::High);
        other.inc_dispatch_failures("webhook");
        other.set_metric_value("disk", "/", 42.0);
        other.set_overall_status(Status::Warning);

        let families = prometheus::gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"sre_agent_cycles_total"));
        assert!(names.contains(&"sre_agent_overall_status"));
        assert!(names.contains(&"sre_agent_alerts_raised_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-node");
        assert_eq!(logger.node_name(), "test-node");
    }
}
