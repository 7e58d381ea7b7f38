//! Ordered, append-only alert log with id assignment

use super::Alert;
use std::collections::VecDeque;

/// Alert history for one agent process
///
/// Appending is the only place ids are assigned. Ids come from a counter
/// rather than the log length, so a bounded history never reuses an id.
#[derive(Debug)]
pub struct AlertHistory {
    alerts: VecDeque<Alert>,
    next_id: u64,
    /// Maximum retained alerts, unbounded when `None`
    limit: Option<usize>,
}

impl Default for AlertHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertHistory {
    pub fn new() -> Self {
        Self {
            alerts: VecDeque::new(),
            next_id: 1,
            limit: None,
        }
    }

    /// Retain at most `limit` alerts, evicting the oldest first
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit.max(1));
        self
    }

    /// Assign the next id to `alert` and append it
    pub fn append(&mut self, mut alert: Alert) -> Alert {
        alert.id = self.next_id;
        self.next_id += 1;

        if let Some(limit) = self.limit {
            while self.alerts.len() >= limit {
                self.alerts.pop_front();
            }
        }

        self.alerts.push_back(alert.clone());
        alert
    }

    /// The last `limit` alerts in append order, or all of them
    pub fn recent(&self, limit: Option<usize>) -> Vec<Alert> {
        let skip = match limit {
            Some(n) => self.alerts.len().saturating_sub(n),
            None => 0,
        };
        self.alerts.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Id the next appended alert will receive
    pub fn next_id(&self) -> u64 {
        self.next_id
    }
}
