//! Alert factory and per-cycle alert processing

use super::{generate_message, Alert, AlertHistory, IncidentKey, IncidentRegistry, Severity};
use crate::models::{MetricSample, Status, SystemSnapshot};
use chrono::Utc;
use std::time::Duration;
use tracing::debug;

/// Alerting behaviour read from configuration at startup
#[derive(Debug, Clone)]
pub struct AlertSettings {
    /// Global switch, no alert is raised when false
    pub enabled: bool,
    /// Maximum alerts kept in history
    pub history_limit: Option<usize>,
    /// Expiry for active incident keys
    pub dedup_ttl: Option<Duration>,
    /// Close a source's incidents when it classifies healthy again
    pub resolve_on_recovery: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            history_limit: None,
            dedup_ttl: None,
            resolve_on_recovery: false,
        }
    }
}

/// Alerts produced while processing one snapshot
#[derive(Debug, Clone, Default)]
pub struct AlertBatch {
    pub raised: Vec<Alert>,
    pub suppressed: usize,
}

/// Creates alerts from breaching samples and owns the alert history
///
/// Owned by the monitor loop and mutated through `&mut self`, so history
/// appends and incident-key updates have a single writer.
#[derive(Debug)]
pub struct AlertManager {
    settings: AlertSettings,
    history: AlertHistory,
    incidents: IncidentRegistry,
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(AlertSettings::default())
    }
}

impl AlertManager {
    pub fn new(settings: AlertSettings) -> Self {
        let history = match settings.history_limit {
            Some(limit) => AlertHistory::new().with_limit(limit),
            None => AlertHistory::new(),
        };
        let incidents = match settings.dedup_ttl {
            Some(ttl) => IncidentRegistry::new().with_ttl(ttl),
            None => IncidentRegistry::new(),
        };

        Self {
            settings,
            history,
            incidents,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// True when alerting is enabled and the sample is in a breaching tier
    pub fn should_alert(&self, sample: &MetricSample) -> bool {
        self.settings.enabled && sample.status.is_breach()
    }

    /// Create an alert for `sample` and append it to the history
    ///
    /// Severity is high for critical samples and medium otherwise unless
    /// overridden. This does not consult the incident registry.
    pub fn create_alert(&mut self, sample: &MetricSample, severity: Option<Severity>) -> Alert {
        let alert = Alert {
            id: 0,
            created_at: Utc::now(),
            severity: severity.unwrap_or_else(|| Severity::from_status(sample.status)),
            source_metric: sample.clone(),
            message: generate_message(sample),
        };
        self.history.append(alert)
    }

    /// Raise an alert for `sample` unless its incident is already active
    pub fn raise(&mut self, sample: &MetricSample) -> Option<Alert> {
        if !self.should_alert(sample) {
            if self.settings.resolve_on_recovery && sample.status == Status::Healthy {
                let closed = self
                    .incidents
                    .resolve_source(sample.metric_kind, &sample.identifier);
                if closed > 0 {
                    debug!(
                        metric = %sample.metric_kind,
                        identifier = %sample.identifier,
                        closed,
                        "Resolved incidents on recovery"
                    );
                }
            }
            return None;
        }

        let key = IncidentKey::for_sample(sample);
        if !self.incidents.open(key.clone()) {
            debug!(incident = %key, "Suppressing alert for active incident");
            return None;
        }

        Some(self.create_alert(sample, None))
    }

    /// Raise alerts for every classified sample in cpu, memory, disk order
    pub fn process_snapshot(&mut self, snapshot: &SystemSnapshot) -> AlertBatch {
        let mut batch = AlertBatch::default();

        for sample in snapshot.samples() {
            let breaching = self.should_alert(sample);
            match self.raise(sample) {
                Some(alert) => batch.raised.push(alert),
                None if breaching => batch.suppressed += 1,
                None => {}
            }
        }

        batch
    }

    /// Close an active incident so the next breach alerts again
    pub fn resolve(&mut self, key: &IncidentKey) -> bool {
        self.incidents.resolve(key)
    }

    pub fn history(&self) -> &AlertHistory {
        &self.history
    }

    pub fn incidents(&self) -> &IncidentRegistry {
        &self.incidents
    }
}
