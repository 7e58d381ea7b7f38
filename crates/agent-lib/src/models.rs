//! Core data models for the monitoring agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of resource a sample measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Memory,
    Disk,
    Service,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Cpu => write!(f, "cpu"),
            MetricKind::Memory => write!(f, "memory"),
            MetricKind::Disk => write!(f, "disk"),
            MetricKind::Service => write!(f, "service"),
        }
    }
}

/// Unit of a sample value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Percent,
    Count,
}

/// Health tier of a classified sample
///
/// Variants are ordered by severity so the worst status is the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Warning,
    Critical,
}

impl Status {
    /// Returns true for tiers that warrant an alert
    pub fn is_breach(&self) -> bool {
        matches!(self, Status::Warning | Status::Critical)
    }

    /// Numeric encoding used by the status gauge
    pub fn as_gauge(&self) -> i64 {
        match self {
            Status::Healthy => 0,
            Status::Warning => 1,
            Status::Critical => 2,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Healthy => write!(f, "healthy"),
            Status::Warning => write!(f, "warning"),
            Status::Critical => write!(f, "critical"),
        }
    }
}

/// Presence state of a watched service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Running,
    Stopped,
}

impl ServiceState {
    /// Running if at least one matching process was found
    pub fn from_process_count(count: usize) -> Self {
        if count > 0 {
            ServiceState::Running
        } else {
            ServiceState::Stopped
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Running => write!(f, "running"),
            ServiceState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Source-specific extras observed alongside a reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricDetails {
    Cpu {
        core_count: usize,
    },
    Memory {
        total_bytes: u64,
        available_bytes: u64,
        used_bytes: u64,
    },
    Disk {
        device: String,
        fstype: String,
        total_bytes: u64,
        used_bytes: u64,
        free_bytes: u64,
    },
    None,
}

/// Unclassified measurement as produced by a collector
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub kind: MetricKind,
    /// Mountpoint for disks, the metric name otherwise
    pub identifier: String,
    pub value: f64,
    pub details: MetricDetails,
    pub collected_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(kind: MetricKind, identifier: impl Into<String>, value: f64) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            value,
            details: MetricDetails::None,
            collected_at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: MetricDetails) -> Self {
        self.details = details;
        self
    }
}

/// Classified measurement, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric_kind: MetricKind,
    pub identifier: String,
    pub value: f64,
    pub unit: Unit,
    pub threshold: f64,
    pub status: Status,
    pub details: MetricDetails,
    pub collected_at: DateTime<Utc>,
}

/// A process matched by a service check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub status: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

/// Result of checking one watched service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCheck {
    pub name: String,
    pub state: ServiceState,
    pub process_count: usize,
    pub processes: Vec<ProcessInfo>,
    pub collected_at: DateTime<Utc>,
}

impl ServiceCheck {
    pub fn new(name: impl Into<String>, processes: Vec<ProcessInfo>) -> Self {
        Self {
            name: name.into(),
            state: ServiceState::from_process_count(processes.len()),
            process_count: processes.len(),
            processes,
            collected_at: Utc::now(),
        }
    }
}

/// A metric source that could not be read this cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSource {
    pub source: String,
    pub reason: String,
}

/// Everything collected and classified in one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub cpu: Option<MetricSample>,
    pub memory: Option<MetricSample>,
    pub disk: Vec<MetricSample>,
    pub services: Vec<ServiceCheck>,
    pub skipped: Vec<SkippedSource>,
    pub collected_at: DateTime<Utc>,
}

impl SystemSnapshot {
    /// Snapshot with no sources, used when collection fails outright
    pub fn empty() -> Self {
        Self {
            cpu: None,
            memory: None,
            disk: Vec::new(),
            services: Vec::new(),
            skipped: Vec::new(),
            collected_at: Utc::now(),
        }
    }

    /// Threshold-classified samples in cpu, memory, disk order
    pub fn samples(&self) -> impl Iterator<Item = &MetricSample> {
        self.cpu
            .iter()
            .chain(self.memory.iter())
            .chain(self.disk.iter())
    }
}
