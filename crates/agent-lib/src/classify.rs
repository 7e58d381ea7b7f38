//! Threshold classification and status reduction
//!
//! A value at or above its threshold is critical, a value at or above
//! 80% of the threshold is a warning, anything below is healthy.

use crate::models::{MetricKind, MetricSample, Reading, Status, Unit};
use serde::{Deserialize, Serialize};

/// Fraction of the threshold at which a metric enters the warning tier
pub const WARNING_RATIO: f64 = 0.8;

/// Classify a raw value against its threshold
pub fn classify(value: f64, threshold: f64) -> Status {
    if value >= threshold {
        Status::Critical
    } else if value >= threshold * WARNING_RATIO {
        Status::Warning
    } else {
        Status::Healthy
    }
}

/// Reduce per-metric statuses to one overall status
///
/// Critical dominates warning, warning dominates healthy. Empty input is healthy.
pub fn reduce<I>(statuses: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    statuses.into_iter().max().unwrap_or(Status::Healthy)
}

/// Configured thresholds, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu: 80.0,
            memory: 85.0,
            disk: 90.0,
        }
    }
}

impl Thresholds {
    /// Threshold for a metric kind, `None` for presence-checked kinds
    pub fn for_kind(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Cpu => Some(self.cpu),
            MetricKind::Memory => Some(self.memory),
            MetricKind::Disk => Some(self.disk),
            MetricKind::Service => None,
        }
    }

    /// Turn a collector reading into a classified sample
    ///
    /// Returns `None` for service readings, which are not threshold-based.
    pub fn sample(&self, reading: Reading) -> Option<MetricSample> {
        let threshold = self.for_kind(reading.kind)?;
        Some(MetricSample {
            metric_kind: reading.kind,
            identifier: reading.identifier,
            value: reading.value,
            unit: Unit::Percent,
            threshold,
            status: classify(reading.value, threshold),
            details: reading.details,
            collected_at: reading.collected_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_tiers() {
        assert_eq!(classify(95.0, 80.0), Status::Critical);
        assert_eq!(classify(80.0, 80.0), Status::Critical);
        assert_eq!(classify(64.0, 80.0), Status::Warning);
        assert_eq!(classify(79.9, 80.0), Status::Warning);
        assert_eq!(classify(63.9, 80.0), Status::Healthy);
        assert_eq!(classify(0.0, 80.0), Status::Healthy);
    }

    #[test]
    fn test_classify_zero_threshold_is_always_critical() {
        assert_eq!(classify(0.0, 0.0), Status::Critical);
        assert_eq!(classify(0.1, 0.0), Status::Critical);
        assert_eq!(classify(100.0, 0.0), Status::Critical);
    }

    #[test]
    fn test_classify_across_range() {
        let threshold = 85.0;
        for i in 0..=1000 {
            let value = i as f64 / 10.0;
            let expected = if value >= threshold {
                Status::Critical
            } else if value >= threshold * 0.8 {
                Status::Warning
            } else {
                Status::Healthy
            };
            assert_eq!(classify(value, threshold), expected, "value {}", value);
        }
    }

    #[test]
    fn test_classify_memory_near_threshold() {
        // 68 is the warning floor for an 85 threshold
        assert_eq!(classify(60.0, 85.0), Status::Healthy);
        assert_eq!(classify(67.9, 85.0), Status::Healthy);
        assert_eq!(classify(68.0, 85.0), Status::Warning);
        assert_eq!(classify(70.0, 85.0), Status::Warning);
    }

    #[test]
    fn test_reduce() {
        assert_eq!(reduce([]), Status::Healthy);
        assert_eq!(reduce([Status::Healthy, Status::Warning]), Status::Warning);
        assert_eq!(
            reduce([Status::Warning, Status::Critical, Status::Healthy]),
            Status::Critical
        );
        assert_eq!(
            reduce([Status::Critical, Status::Warning, Status::Warning]),
            Status::Critical
        );
        assert_eq!(reduce(vec![Status::Healthy; 4]), Status::Healthy);
    }

    #[test]
    fn test_thresholds_sample() {
        let thresholds = Thresholds::default();

        let cpu = thresholds
            .sample(Reading::new(MetricKind::Cpu, "cpu", 95.0))
            .unwrap();
        assert_eq!(cpu.threshold, 80.0);
        assert_eq!(cpu.status, Status::Critical);
        assert_eq!(cpu.unit, Unit::Percent);

        let memory = thresholds
            .sample(Reading::new(MetricKind::Memory, "memory", 60.0))
            .unwrap();
        assert_eq!(memory.status, Status::Healthy);

        let disk = thresholds
            .sample(Reading::new(MetricKind::Disk, "/var", 75.0))
            .unwrap();
        assert_eq!(disk.identifier, "/var");
        assert_eq!(disk.status, Status::Warning);
    }

    #[test]
    fn test_service_readings_are_not_classified() {
        let thresholds = Thresholds::default();
        assert!(thresholds
            .sample(Reading::new(MetricKind::Service, "nginx", 1.0))
            .is_none());
    }
}
