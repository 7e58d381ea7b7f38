//! Alert dispatch to notification channels
//!
//! Every configured channel is attempted independently for each alert.
//! A failing channel is logged and recorded in the [`DispatchReport`] but
//! never stops the remaining channels or the monitoring cycle. Delivery is
//! best effort and at most once: no retries, no queueing.

mod email;
mod webhook;

pub use email::{EmailChannel, EmailConfig};
pub use webhook::WebhookChannel;

use crate::alert::{Alert, Severity};
use crate::error::DispatchError;
use serde::Serialize;
use tracing::{error, warn};

/// Notification channel kinds accepted in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Log,
    Webhook,
    Email,
}

impl std::str::FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "log" => Ok(ChannelKind::Log),
            "webhook" | "slack" => Ok(ChannelKind::Webhook),
            "email" => Ok(ChannelKind::Email),
            other => Err(format!("unknown alert method '{}'", other)),
        }
    }
}

/// A configured notification channel
#[derive(Debug, Clone)]
pub enum Channel {
    /// Structured log record, always available
    Log,
    Webhook(WebhookChannel),
    Email(EmailChannel),
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Log => "log",
            Channel::Webhook(_) => "webhook",
            Channel::Email(_) => "email",
        }
    }

    /// Deliver one alert through this channel
    pub async fn deliver(&self, alert: &Alert) -> Result<(), DispatchError> {
        match self {
            Channel::Log => {
                log_alert(alert);
                Ok(())
            }
            Channel::Webhook(webhook) => webhook.send(&alert.render()).await,
            Channel::Email(email) => {
                let subject = format!(
                    "[SRE Agent] {} alert: {}",
                    alert.severity.as_str().to_uppercase(),
                    alert.source_metric.metric_kind
                );
                email.send(&subject, &email_body(alert)).await
            }
        }
    }
}

fn log_alert(alert: &Alert) {
    let metric = alert.source_metric.metric_kind;
    let identifier = &alert.source_metric.identifier;
    match alert.severity {
        Severity::High => error!(
            event = "alert",
            alert_id = alert.id,
            severity = %alert.severity,
            metric = %metric,
            identifier = %identifier,
            "{}",
            alert.render()
        ),
        Severity::Medium => warn!(
            event = "alert",
            alert_id = alert.id,
            severity = %alert.severity,
            metric = %metric,
            identifier = %identifier,
            "{}",
            alert.render()
        ),
    }
}

fn email_body(alert: &Alert) -> String {
    let sample = &alert.source_metric;
    format!(
        concat!(
            "{}\n\nAlert ID: {}\nSeverity: {}\nMetric: {} ({})\n",
            "Value: {:.2}\nThreshold: {}\nStatus: {}\nTime: {}\n",
        ),
        alert.message,
        alert.id,
        alert.severity,
        sample.metric_kind,
        sample.identifier,
        sample.value,
        sample.threshold,
        sample.status,
        alert.created_at.to_rfc3339(),
    )
}

/// Result of delivering one alert through one channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelOutcome {
    pub channel: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-channel outcomes for one alert
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &ChannelOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }

    pub fn all_delivered(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Sends alerts through every configured channel
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    channels: Vec<Channel>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    /// Dispatcher with only the log channel
    pub fn log_only() -> Self {
        Self::new(vec![Channel::Log])
    }

    pub fn add_channel(&mut self, channel: Channel) {
        self.channels.push(channel);
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(Channel::name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Send an alert through every channel, never failing as a whole
    pub async fn send(&self, alert: &Alert) -> DispatchReport {
        let mut report = DispatchReport::default();

        for channel in &self.channels {
            let error = match channel.deliver(alert).await {
                Ok(()) => None,
                Err(e) => {
                    error!(
                        event = "dispatch_failed",
                        channel = channel.name(),
                        alert_id = alert.id,
                        error = %e,
                        "Failed to send alert"
                    );
                    Some(e.to_string())
                }
            };
            report.outcomes.push(ChannelOutcome {
                channel: channel.name(),
                error,
            });
        }

        report
    }
}
