//! Alert creation, deduplication and history
//!
//! This module provides:
//! - The alert record and its severity
//! - Message generation per metric kind
//! - Keyed incident deduplication
//! - An append-only alert history owning every raised alert

mod history;
mod incident;
mod manager;

pub use history::AlertHistory;
pub use incident::{IncidentKey, IncidentRegistry};
pub use manager::{AlertBatch, AlertManager, AlertSettings};

use crate::models::{MetricKind, MetricSample, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert urgency, distinct from the metric tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    /// Severity derived from a metric tier
    pub fn from_status(status: Status) -> Self {
        match status {
            Status::Critical => Severity::High,
            Status::Warning | Status::Healthy => Severity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert raised for a breaching sample
///
/// Only [`AlertManager`] creates alerts; they are never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub severity: Severity,
    pub source_metric: MetricSample,
    pub message: String,
}

impl Alert {
    /// Key identifying the condition this alert was raised for
    pub fn incident_key(&self) -> IncidentKey {
        IncidentKey::for_sample(&self.source_metric)
    }

    /// One-line human readable rendering used by notification channels
    pub fn render(&self) -> String {
        format!(
            "ALERT [{}]: {}",
            self.severity.as_str().to_uppercase(),
            self.message
        )
    }
}

/// Render the alert message for a sample
pub fn generate_message(sample: &MetricSample) -> String {
    let value = sample.value;
    let threshold = sample.threshold;
    let status = sample.status;

    match sample.metric_kind {
        MetricKind::Cpu => {
            format!("CPU usage is {status}: {value}% (threshold: {threshold}%)")
        }
        MetricKind::Memory => {
            format!("Memory usage is {status}: {value}% (threshold: {threshold}%)")
        }
        MetricKind::Disk => format!(
            "Disk usage on {} is {status}: {value}% (threshold: {threshold}%)",
            sample.identifier
        ),
        other => format!("Metric {} is {status}: {value}", other),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::sample;
    use super::*;

    #[test]
    fn test_cpu_message() {
        let s = sample(MetricKind::Cpu, "cpu", 95.0, 80.0, Status::Critical);
        assert_eq!(
            generate_message(&s),
            "CPU usage is critical: 95% (threshold: 80%)"
        );
    }

    #[test]
    fn test_memory_message() {
        let s = sample(MetricKind::Memory, "memory", 72.5, 85.0, Status::Warning);
        assert_eq!(
            generate_message(&s),
            "Memory usage is warning: 72.5% (threshold: 85%)"
        );
    }

    #[test]
    fn test_disk_message_includes_mountpoint() {
        let s = sample(MetricKind::Disk, "/var/lib", 91.2, 90.0, Status::Critical);
        let message = generate_message(&s);
        assert!(message.starts_with("Disk usage on /var/lib is critical"));
        assert!(message.contains("91.2%"));
    }

    #[test]
    fn test_unrecognized_kind_uses_generic_message() {
        let s = sample(MetricKind::Service, "nginx", 0.0, 1.0, Status::Warning);
        assert_eq!(generate_message(&s), "Metric service is warning: 0");
    }

    #[test]
    fn test_severity_from_status() {
        assert_eq!(Severity::from_status(Status::Critical), Severity::High);
        assert_eq!(Severity::from_status(Status::Warning), Severity::Medium);
    }
}
