//! Monitoring loop
//!
//! Runs the collect → classify → alert → summarize pipeline once or on a
//! fixed interval. A failed cycle is logged and the loop carries on after
//! the normal sleep; only a stop request ends it, and stop is observed at
//! cycle boundaries.

use crate::alert::{Alert, AlertManager};
use crate::classify::Thresholds;
use crate::collector::Collector;
use crate::dispatch::{DispatchReport, Dispatcher};
use crate::error::CycleError;
use crate::health::{components, HealthRegistry};
use crate::models::{SkippedSource, SystemSnapshot};
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::summary::{Summary, SummaryBuilder};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use tracing::{debug, info};

/// Default pause between cycles
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Cloneable handle used to stop a running loop
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StopHandle {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Request the loop to stop at the next cycle boundary
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        // notify_one stores a permit if the loop is not sleeping yet
        self.notify.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn stopped(&self) {
        self.notify.notified().await;
    }
}

/// Everything one cycle produced
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub snapshot: SystemSnapshot,
    pub alerts: Vec<Alert>,
    /// Breaches not alerted because their incident was already active
    pub suppressed: usize,
    pub dispatch: Vec<DispatchReport>,
    pub summary: Summary,
    pub elapsed: Duration,
    /// Set when the cycle failed and the report is a degraded placeholder
    pub error: Option<String>,
}

impl CycleReport {
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Periodic monitoring orchestrator
///
/// Owns the [`AlertManager`], so alert history and incident keys have a
/// single writer across cycles.
pub struct MonitorLoop {
    /// Source of host readings and service checks
    collector: Arc<dyn Collector>,
    /// Per-kind thresholds used to classify readings
    thresholds: Thresholds,
    /// Process names checked every cycle
    services: Vec<String>,
    /// Dedup keys and alert history
    alerts: AlertManager,
    /// Notification channels
    dispatcher: Dispatcher,
    /// Builds the per-cycle summary
    summaries: SummaryBuilder,
    /// Pause between cycles
    interval: Duration,
    /// Health registry for liveness/readiness
    health: HealthRegistry,
    /// Prometheus metrics
    metrics: AgentMetrics,
    /// Structured event logger
    logger: StructuredLogger,
    /// Receives each cycle's summary, if set
    summary_tx: Option<watch::Sender<Option<Summary>>>,
    /// Shared stop flag
    stop: StopHandle,
    /// Number of cycles started so far
    cycle: u64,
}

impl MonitorLoop {
    pub fn new(
        collector: Arc<dyn Collector>,
        thresholds: Thresholds,
        alerts: AlertManager,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            collector,
            thresholds,
            services: Vec::new(),
            alerts,
            dispatcher,
            summaries: SummaryBuilder::new(),
            interval: DEFAULT_INTERVAL,
            health: HealthRegistry::new(),
            metrics: AgentMetrics::new(),
            logger: StructuredLogger::new("localhost"),
            summary_tx: None,
            stop: StopHandle::new(),
            cycle: 0,
        }
    }

    /// Set the pause between cycles
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Watch these process names every cycle
    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.services = services;
        self
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_summary_builder(mut self, summaries: SummaryBuilder) -> Self {
        self.summaries = summaries;
        self
    }

    /// Publish every cycle's summary on `tx`
    pub fn with_summary_sender(mut self, tx: watch::Sender<Option<Summary>>) -> Self {
        self.summary_tx = Some(tx);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    /// Run a single cycle or loop until stopped
    ///
    /// Returns the cycle report in single-cycle mode and `None` once a
    /// continuous run has been stopped.
    pub async fn start(&mut self, continuous: bool) -> Option<CycleReport> {
        if continuous {
            self.run().await;
            None
        } else {
            Some(self.run_once().await)
        }
    }

    /// Run one cycle, turning a failure into a degraded report
    pub async fn run_once(&mut self) -> CycleReport {
        let start = Instant::now();
        match self.guarded_cycle().await {
            Ok(report) => report,
            Err(e) => {
                self.record_failure(&e).await;
                self.degraded_report(&e, start.elapsed())
            }
        }
    }

    /// Loop until the stop handle fires
    pub async fn run(&mut self) {
        info!(
            interval_secs = self.interval.as_secs(),
            services = self.services.len(),
            "Starting monitoring loop"
        );

        while self.stop.is_running() {
            if let Err(e) = self.guarded_cycle().await {
                self.record_failure(&e).await;
            }

            if !self.stop.is_running() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.stop.stopped() => {
                    debug!("Stop requested while sleeping");
                }
            }
        }

        info!(cycles = self.cycle, "Monitoring loop stopped");
    }

    /// Run one collect → classify → alert → summarize pass
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        self.cycle += 1;
        let cycle = self.cycle;
        let start = Instant::now();
        self.metrics.inc_cycles();

        let snapshot = self.collect().await?;

        for sample in snapshot.samples() {
            self.metrics.set_metric_value(
                &sample.metric_kind.to_string(),
                &sample.identifier,
                sample.value,
            );
        }

        let batch = self.alerts.process_snapshot(&snapshot);
        self.metrics.add_alerts_suppressed(batch.suppressed);

        let mut dispatch = Vec::with_capacity(batch.raised.len());
        let mut failed_deliveries = 0;
        for alert in &batch.raised {
            self.logger.log_alert_raised(alert);
            self.metrics.inc_alerts_raised(alert.severity);

            let report = self.dispatcher.send(alert).await;
            for failure in report.failures() {
                self.metrics.inc_dispatch_failures(failure.channel);
                failed_deliveries += 1;
            }
            dispatch.push(report);
        }

        if failed_deliveries > 0 {
            self.health
                .set_degraded(
                    components::DISPATCHER,
                    format!("{} delivery failure(s) in cycle {}", failed_deliveries, cycle),
                )
                .await;
        } else {
            self.health.set_healthy(components::DISPATCHER).await;
        }

        let summary = self.summaries.build(&snapshot, &batch.raised);
        self.publish(&summary);

        let elapsed = start.elapsed();
        self.metrics.observe_cycle_duration(elapsed.as_secs_f64());
        self.metrics.set_overall_status(summary.overall_status);
        self.logger.log_cycle(
            cycle,
            summary.overall_status,
            batch.raised.len(),
            batch.suppressed,
            elapsed.as_millis(),
        );

        self.health.set_healthy(components::MONITOR).await;
        self.health.set_ready(true).await;

        Ok(CycleReport {
            cycle,
            snapshot,
            alerts: batch.raised,
            suppressed: batch.suppressed,
            dispatch,
            summary,
            elapsed,
            error: None,
        })
    }

    /// Run a cycle with panics turned into [`CycleError::Panicked`]
    async fn guarded_cycle(&mut self) -> Result<CycleReport, CycleError> {
        match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(CycleError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    async fn collect(&self) -> Result<SystemSnapshot, CycleError> {
        let raw = self.collector.collect_system().await?;

        let mut service_skip = None;
        let services = if self.services.is_empty() {
            Vec::new()
        } else {
            match self.collector.collect_services(&self.services).await {
                Ok(checks) => checks,
                Err(e) => {
                    service_skip = Some(SkippedSource {
                        source: "services".to_string(),
                        reason: e.to_string(),
                    });
                    Vec::new()
                }
            }
        };

        let mut snapshot = raw.classify(&self.thresholds, services);
        snapshot.skipped.extend(service_skip);

        for skip in &snapshot.skipped {
            self.logger.log_skipped(&skip.source, &skip.reason);
        }
        self.metrics.add_skipped_sources(snapshot.skipped.len());

        if snapshot.skipped.is_empty() {
            self.health.set_healthy(components::COLLECTOR).await;
        } else {
            self.health
                .set_degraded(
                    components::COLLECTOR,
                    format!("{} source(s) skipped", snapshot.skipped.len()),
                )
                .await;
        }

        Ok(snapshot)
    }

    fn publish(&self, summary: &Summary) {
        if let Some(tx) = &self.summary_tx {
            tx.send_replace(Some(summary.clone()));
        }
    }

    async fn record_failure(&self, error: &CycleError) {
        self.metrics.inc_cycle_failures();
        self.logger.log_cycle_failure(self.cycle, error);

        let component = match error {
            CycleError::Collection(_) => components::COLLECTOR,
            CycleError::Panicked(_) => components::MONITOR,
        };
        self.health.set_unhealthy(component, error.to_string()).await;
    }

    fn degraded_report(&self, error: &CycleError, elapsed: Duration) -> CycleReport {
        let mut snapshot = SystemSnapshot::empty();
        snapshot.skipped.push(SkippedSource {
            source: "system".to_string(),
            reason: error.to_string(),
        });
        let summary = self.summaries.build(&snapshot, &[]);

        CycleReport {
            cycle: self.cycle,
            snapshot,
            alerts: Vec::new(),
            suppressed: 0,
            dispatch: Vec::new(),
            summary,
            elapsed,
            error: Some(error.to_string()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
