//! Host collector backed by sysinfo

use super::{async_trait, Collector, Probe, RawSystem};
use crate::error::CollectionError;
use crate::models::{MetricDetails, MetricKind, ProcessInfo, Reading, ServiceCheck};
use std::time::Duration;
use sysinfo::{Disks, System};
use tracing::debug;

/// Default upper bound for one collection pass
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Collector reading CPU, memory, disks and processes from the local host
#[derive(Debug, Clone)]
pub struct HostCollector {
    timeout: Duration,
}

impl Default for HostCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCollector {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set the upper bound for a single collection call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a blocking sysinfo read on the blocking pool, bounded by the timeout
    async fn blocking<T, F>(&self, f: F) -> Result<T, CollectionError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        match tokio::time::timeout(self.timeout, tokio::task::spawn_blocking(f)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CollectionError::Task(e.to_string())),
            Err(_) => Err(CollectionError::Timeout(self.timeout.as_secs())),
        }
    }
}

#[async_trait]
impl Collector for HostCollector {
    async fn collect_system(&self) -> Result<RawSystem, CollectionError> {
        self.blocking(read_system).await
    }

    async fn collect_services(
        &self,
        names: &[String],
    ) -> Result<Vec<ServiceCheck>, CollectionError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let names = names.to_vec();
        self.blocking(move || read_services(&names)).await
    }
}

fn read_system() -> RawSystem {
    let mut sys = System::new();
    RawSystem {
        cpu: read_cpu(&mut sys),
        memory: read_memory(&mut sys),
        disk: read_disks(),
    }
}

fn read_cpu(sys: &mut System) -> Probe<Reading> {
    // Usage is a delta between two refreshes
    sys.refresh_cpu();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();

    let core_count = sys.cpus().len();
    if core_count == 0 {
        return Probe::skip("cpu", "no cpus reported");
    }

    let usage = sys.global_cpu_info().cpu_usage() as f64;
    Probe::Ok(
        Reading::new(MetricKind::Cpu, "cpu", usage).with_details(MetricDetails::Cpu { core_count }),
    )
}

fn read_memory(sys: &mut System) -> Probe<Reading> {
    sys.refresh_memory();

    let total = sys.total_memory();
    if total == 0 {
        return Probe::skip("memory", "total memory reported as zero");
    }
    let available = sys.available_memory();
    let used = sys.used_memory();
    let percent = percent_of(total.saturating_sub(available), total);

    Probe::Ok(
        Reading::new(MetricKind::Memory, "memory", percent).with_details(MetricDetails::Memory {
            total_bytes: total,
            available_bytes: available,
            used_bytes: used,
        }),
    )
}

fn read_disks() -> Vec<Probe<Reading>> {
    let disks = Disks::new_with_refreshed_list();

    disks
        .list()
        .iter()
        .map(|disk| {
            let mountpoint = disk.mount_point().display().to_string();
            let total = disk.total_space();
            if total == 0 {
                return Probe::skip(format!("disk:{}", mountpoint), "zero capacity");
            }
            let free = disk.available_space();
            let used = total.saturating_sub(free);

            Probe::Ok(
                Reading::new(MetricKind::Disk, mountpoint, percent_of(used, total)).with_details(
                    MetricDetails::Disk {
                        device: disk.name().to_string_lossy().into_owned(),
                        fstype: disk.file_system().to_string_lossy().into_owned(),
                        total_bytes: total,
                        used_bytes: used,
                        free_bytes: free,
                    },
                ),
            )
        })
        .collect()
}

fn read_services(names: &[String]) -> Vec<ServiceCheck> {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_processes();
    let total_memory = sys.total_memory();

    names
        .iter()
        .map(|name| {
            let processes: Vec<ProcessInfo> = sys
                .processes()
                .iter()
                .filter(|(_, process)| process_matches(name, process.name()))
                .map(|(pid, process)| ProcessInfo {
                    pid: pid.as_u32(),
                    name: process.name().to_string(),
                    status: process.status().to_string(),
                    cpu_percent: process.cpu_usage(),
                    memory_percent: percent_of(process.memory(), total_memory) as f32,
                })
                .collect();

            debug!(service = %name, matches = processes.len(), "Checked service");
            ServiceCheck::new(name.clone(), processes)
        })
        .collect()
}

/// Name of the local host, if the OS reports one
pub fn host_name() -> Option<String> {
    System::host_name()
}

/// Case-insensitive substring match of a watched name against a process name
pub fn process_matches(watched: &str, process_name: &str) -> bool {
    process_name
        .to_lowercase()
        .contains(&watched.to_lowercase())
}

fn percent_of(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}
