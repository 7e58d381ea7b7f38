//! Keyed incident deduplication
//!
//! An incident stays active from the first alert for its key until it is
//! resolved or, when a TTL is configured, until the TTL elapses. Without
//! either, keys accumulate for the lifetime of the process.

use crate::models::{MetricKind, MetricSample, Status};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Stable identity of an alert-triggering condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncidentKey {
    pub kind: MetricKind,
    pub identifier: String,
    pub status: Status,
}

impl IncidentKey {
    pub fn for_sample(sample: &MetricSample) -> Self {
        Self {
            kind: sample.metric_kind,
            identifier: sample.identifier.clone(),
            status: sample.status,
        }
    }
}

impl std::fmt::Display for IncidentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.identifier, self.status)
    }
}

/// Set of active incident keys
#[derive(Debug, Default)]
pub struct IncidentRegistry {
    /// Active keys and when they were opened
    active: HashMap<IncidentKey, Instant>,
    /// Expiry for active keys, never when `None`
    ttl: Option<Duration>,
}

impl IncidentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire active keys after `ttl`
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Check whether an incident is currently open for `key`
    pub fn is_active(&self, key: &IncidentKey) -> bool {
        match (self.active.get(key), self.ttl) {
            (Some(opened), Some(ttl)) => opened.elapsed() < ttl,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Open an incident for `key`
    ///
    /// Returns `false` without touching the registry when the key is already active.
    pub fn open(&mut self, key: IncidentKey) -> bool {
        self.evict_expired();
        if self.active.contains_key(&key) {
            return false;
        }
        self.active.insert(key, Instant::now());
        true
    }

    /// Close the incident for `key`, returning whether it was open
    pub fn resolve(&mut self, key: &IncidentKey) -> bool {
        self.active.remove(key).is_some()
    }

    /// Close every incident for one metric source regardless of tier
    pub fn resolve_source(&mut self, kind: MetricKind, identifier: &str) -> usize {
        let before = self.active.len();
        self.active
            .retain(|key, _| !(key.kind == kind && key.identifier == identifier));
        before - self.active.len()
    }

    /// Drop keys whose TTL has elapsed
    pub fn evict_expired(&mut self) {
        if let Some(ttl) = self.ttl {
            self.active.retain(|_, opened| opened.elapsed() < ttl);
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
