//! Metrics collection from the host
//!
//! Collectors return raw readings wrapped in [`Probe`] so an unreadable
//! source (permission errors, pseudo filesystems, missing counters) is
//! skipped instead of failing the cycle. Skips are filtered out before
//! any reading reaches the classifier.

mod host;

pub use host::{host_name, process_matches, HostCollector};

use crate::classify::Thresholds;
use crate::error::CollectionError;
use crate::models::{Reading, ServiceCheck, SkippedSource, SystemSnapshot};
use chrono::Utc;
use tracing::debug;

pub use async_trait::async_trait;

/// Outcome of reading one metric source
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    Ok(T),
    Skip { source: String, reason: String },
}

impl<T> Probe<T> {
    pub fn skip(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Probe::Skip {
            source: source.into(),
            reason: reason.into(),
        }
    }

    pub fn into_result(self) -> Result<T, SkippedSource> {
        match self {
            Probe::Ok(value) => Ok(value),
            Probe::Skip { source, reason } => Err(SkippedSource { source, reason }),
        }
    }
}

/// Raw, unclassified host readings from one collection pass
#[derive(Debug, Clone)]
pub struct RawSystem {
    pub cpu: Probe<Reading>,
    pub memory: Probe<Reading>,
    pub disk: Vec<Probe<Reading>>,
}

impl RawSystem {
    /// Drop skipped sources and classify the remaining readings
    pub fn classify(self, thresholds: &Thresholds, services: Vec<ServiceCheck>) -> SystemSnapshot {
        let mut skipped = Vec::new();

        let mut keep = |probe: Probe<Reading>| match probe.into_result() {
            Ok(reading) => thresholds.sample(reading),
            Err(skip) => {
                debug!(source = %skip.source, reason = %skip.reason, "Skipping metric source");
                skipped.push(skip);
                None
            }
        };

        let cpu = keep(self.cpu);
        let memory = keep(self.memory);
        let disk = self.disk.into_iter().filter_map(&mut keep).collect();

        SystemSnapshot {
            cpu,
            memory,
            disk,
            services,
            skipped,
            collected_at: Utc::now(),
        }
    }
}

/// Trait for host metrics collection implementations
#[async_trait]
pub trait Collector: Send + Sync {
    /// Read CPU, memory and every mounted disk
    async fn collect_system(&self) -> Result<RawSystem, CollectionError>;

    /// Check whether each watched service has a running process
    async fn collect_services(
        &self,
        names: &[String],
    ) -> Result<Vec<ServiceCheck>, CollectionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricKind, Status};

    fn raw(cpu: Probe<Reading>, disk: Vec<Probe<Reading>>) -> RawSystem {
        RawSystem {
            cpu,
            memory: Probe::Ok(Reading::new(MetricKind::Memory, "memory", 40.0)),
            disk,
        }
    }

    #[test]
    fn test_skipped_sources_are_filtered_before_classification() {
        let system = raw(
            Probe::Ok(Reading::new(MetricKind::Cpu, "cpu", 90.0)),
            vec![
                Probe::Ok(Reading::new(MetricKind::Disk, "/", 50.0)),
                Probe::skip("disk:/mnt/secret", "permission denied"),
                Probe::Ok(Reading::new(MetricKind::Disk, "/data", 95.0)),
            ],
        );

        let snapshot = system.classify(&Thresholds::default(), Vec::new());

        assert_eq!(snapshot.cpu.as_ref().unwrap().status, Status::Critical);
        assert_eq!(snapshot.disk.len(), 2);
        assert_eq!(snapshot.disk[1].identifier, "/data");
        assert_eq!(snapshot.disk[1].status, Status::Critical);
        assert_eq!(snapshot.skipped.len(), 1);
        assert_eq!(snapshot.skipped[0].source, "disk:/mnt/secret");
    }

    #[test]
    fn test_skipped_cpu_leaves_category_absent() {
        let system = raw(Probe::skip("cpu", "no cpus reported"), vec![]);

        let snapshot = system.classify(&Thresholds::default(), Vec::new());

        assert!(snapshot.cpu.is_none());
        assert!(snapshot.memory.is_some());
        assert!(snapshot.disk.is_empty());
        assert_eq!(snapshot.samples().count(), 1);
    }

    #[test]
    fn test_probe_into_result() {
        let ok: Probe<u8> = Probe::Ok(3);
        assert_eq!(ok.into_result().unwrap(), 3);

        let skip: Probe<u8> = Probe::skip("disk:/boot", "zero capacity");
        let err = skip.into_result().unwrap_err();
        assert_eq!(err.reason, "zero capacity");
    }
}
