//! Point-in-time summaries of one monitoring cycle
//!
//! A summary is rebuilt every cycle from that cycle's snapshot and the
//! alerts raised during it, never from the full alert history. Metric
//! categories with no samples are left out rather than given a
//! placeholder status.

use crate::alert::{Alert, Severity};
use crate::classify::reduce;
use crate::models::{ServiceState, SkippedSource, Status, SystemSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of alerts kept in `recent`
pub const RECENT_ALERTS_LIMIT: usize = 5;

/// Usage of a single threshold-based metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub usage: f64,
    pub status: Status,
    pub threshold: f64,
}

/// Usage of one mounted filesystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskEntry {
    pub mountpoint: String,
    pub usage: f64,
    pub status: Status,
    pub threshold: f64,
}

/// Presence of one watched service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    pub state: ServiceState,
    pub process_count: usize,
}

/// Per-category breakdown, absent categories are omitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<MetricEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MetricEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<Vec<DiskEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<ServiceEntry>>,
}

/// Alert totals for the cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertTotals {
    pub count: usize,
    pub high_severity: usize,
    pub medium_severity: usize,
    pub recent: Vec<Alert>,
}

/// Snapshot summary rendered for operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub timestamp: DateTime<Utc>,
    pub overall_status: Status,
    pub metrics_summary: MetricsSummary,
    /// Present only when the cycle raised alerts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<AlertTotals>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_sources: Vec<SkippedSource>,
}

/// Builds summaries from a snapshot and the alerts of the same cycle
#[derive(Debug, Clone)]
pub struct SummaryBuilder {
    recent_limit: usize,
}

impl Default for SummaryBuilder {
    fn default() -> Self {
        Self {
            recent_limit: RECENT_ALERTS_LIMIT,
        }
    }
}

impl SummaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a different number of recent alerts
    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit;
        self
    }

    pub fn build(&self, snapshot: &SystemSnapshot, alerts: &[Alert]) -> Summary {
        let overall_status = reduce(snapshot.samples().map(|s| s.status));

        let entry = |s: &crate::models::MetricSample| MetricEntry {
            usage: s.value,
            status: s.status,
            threshold: s.threshold,
        };

        let disk = (!snapshot.disk.is_empty()).then(|| {
            snapshot
                .disk
                .iter()
                .map(|d| DiskEntry {
                    mountpoint: d.identifier.clone(),
                    usage: d.value,
                    status: d.status,
                    threshold: d.threshold,
                })
                .collect()
        });

        let services = (!snapshot.services.is_empty()).then(|| {
            snapshot
                .services
                .iter()
                .map(|s| ServiceEntry {
                    name: s.name.clone(),
                    state: s.state,
                    process_count: s.process_count,
                })
                .collect()
        });

        Summary {
            timestamp: Utc::now(),
            overall_status,
            metrics_summary: MetricsSummary {
                cpu: snapshot.cpu.as_ref().map(entry),
                memory: snapshot.memory.as_ref().map(entry),
                disk,
                services,
            },
            alerts: self.alert_totals(alerts),
            skipped_sources: snapshot.skipped.clone(),
        }
    }

    fn alert_totals(&self, alerts: &[Alert]) -> Option<AlertTotals> {
        if alerts.is_empty() {
            return None;
        }

        let count_of =
            |severity: Severity| alerts.iter().filter(|a| a.severity == severity).count();
        let skip = alerts.len().saturating_sub(self.recent_limit);

        Some(AlertTotals {
            count: alerts.len(),
            high_severity: count_of(Severity::High),
            medium_severity: count_of(Severity::Medium),
            recent: alerts[skip..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertManager;
    use crate::classify::Thresholds;
    use crate::models::{MetricKind, Reading, ServiceCheck};

    fn snapshot(cpu: Option<f64>, memory: Option<f64>, disks: &[(&str, f64)]) -> SystemSnapshot {
        let thresholds = Thresholds::default();
        SystemSnapshot {
            cpu: cpu.and_then(|v| thresholds.sample(Reading::new(MetricKind::Cpu, "cpu", v))),
            memory: memory
                .and_then(|v| thresholds.sample(Reading::new(MetricKind::Memory, "memory", v))),
            disk: disks
                .iter()
                .filter_map(|(m, v)| thresholds.sample(Reading::new(MetricKind::Disk, *m, *v)))
                .collect(),
            ..SystemSnapshot::empty()
        }
    }

    #[test]
    fn test_overall_status_from_disks() {
        let snap = snapshot(None, None, &[("/", 10.0), ("/data", 75.0), ("/boot", 30.0)]);
        let mut manager = AlertManager::default();
        let alerts = manager.process_snapshot(&snap).raised;

        let summary = SummaryBuilder::new().build(&snap, &alerts);

        assert_eq!(summary.overall_status, Status::Warning);
        assert_eq!(summary.alerts.as_ref().unwrap().count, 1);
        assert_eq!(summary.alerts.as_ref().unwrap().medium_severity, 1);
    }

    #[test]
    fn test_healthy_memory_leaves_status_unaffected() {
        let snap = snapshot(Some(20.0), Some(60.0), &[("/", 10.0)]);
        let summary = SummaryBuilder::new().build(&snap, &[]);

        assert_eq!(summary.overall_status, Status::Healthy);
        assert!(summary.alerts.is_none());
    }

    #[test]
    fn test_critical_dominates() {
        let snap = snapshot(Some(95.0), Some(70.0), &[("/", 75.0)]);
        let summary = SummaryBuilder::new().build(&snap, &[]);
        assert_eq!(summary.overall_status, Status::Critical);
    }

    #[test]
    fn test_absent_categories_are_omitted() {
        let snap = snapshot(Some(20.0), None, &[]);
        let summary = SummaryBuilder::new().build(&snap, &[]);

        assert!(summary.metrics_summary.cpu.is_some());
        assert!(summary.metrics_summary.memory.is_none());
        assert!(summary.metrics_summary.disk.is_none());
        assert!(summary.metrics_summary.services.is_none());

        let json = serde_json::to_value(&summary).unwrap();
        let metrics = json["metrics_summary"].as_object().unwrap();
        assert!(metrics.contains_key("cpu"));
        assert!(!metrics.contains_key("disk"));
        assert!(!metrics.contains_key("memory"));
        assert!(json.get("alerts").is_none());
    }

    #[test]
    fn test_empty_snapshot_is_healthy() {
        let summary = SummaryBuilder::new().build(&SystemSnapshot::empty(), &[]);
        assert_eq!(summary.overall_status, Status::Healthy);
        assert_eq!(summary.metrics_summary, MetricsSummary::default());
    }

    #[test]
    fn test_recent_alerts_truncated_to_last_five() {
        let snap = snapshot(
            None,
            None,
            &[
                ("/a", 95.0),
                ("/b", 95.0),
                ("/c", 75.0),
                ("/d", 95.0),
                ("/e", 75.0),
                ("/f", 95.0),
                ("/g", 75.0),
            ],
        );
        let mut manager = AlertManager::default();
        let alerts = manager.process_snapshot(&snap).raised;

        let summary = SummaryBuilder::new().build(&snap, &alerts);
        let totals = summary.alerts.unwrap();

        assert_eq!(totals.count, 7);
        assert_eq!(totals.high_severity, 4);
        assert_eq!(totals.medium_severity, 3);
        assert_eq!(totals.recent.len(), 5);
        assert_eq!(totals.recent[0].source_metric.identifier, "/c");
        assert_eq!(totals.recent[4].source_metric.identifier, "/g");
    }

    #[test]
    fn test_services_reported_but_not_reduced() {
        let mut snap = snapshot(Some(10.0), None, &[]);
        snap.services.push(ServiceCheck::new("nginx", Vec::new()));

        let summary = SummaryBuilder::new().build(&snap, &[]);
        let services = summary.metrics_summary.services.unwrap();

        assert_eq!(services[0].state, ServiceState::Stopped);
        assert_eq!(summary.overall_status, Status::Healthy);
    }
}
