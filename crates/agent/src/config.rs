//! Agent configuration
//!
//! Layered as built-in defaults, then an optional YAML file, then `SRE_`
//! environment variables (`SRE_MONITORING__CPU_THRESHOLD=75`). A bad value
//! never aborts startup: it is logged and replaced by its default.

use agent_lib::alert::AlertSettings;
use agent_lib::classify::Thresholds;
use agent_lib::dispatch::{
    Channel, ChannelKind, Dispatcher, EmailChannel, EmailConfig, WebhookChannel,
};
use agent_lib::report::ReportWriter;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// File read when neither `-c` nor `SRE_CONFIG_FILE` is given
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Log file written next to stdout unless `logging.file` is empty
pub const DEFAULT_LOG_FILE: &str = "sre_agent.log";

/// Monitoring cadence and thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringConfig {
    pub interval_seconds: u64,
    pub cpu_threshold: f64,
    pub memory_threshold: f64,
    pub disk_threshold: f64,
    pub collect_timeout_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            cpu_threshold: 80.0,
            memory_threshold: 85.0,
            disk_threshold: 90.0,
            collect_timeout_secs: 30,
        }
    }
}

/// Alerting and notification settings
#[derive(Debug, Clone, PartialEq)]
pub struct AlertsConfig {
    pub enabled: bool,
    pub methods: Vec<String>,
    pub webhook_url: String,
    pub timeout_secs: u64,
    pub history_limit: Option<usize>,
    pub dedup_ttl_secs: Option<u64>,
    pub resolve_on_recovery: bool,
    pub email: Option<EmailConfig>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            methods: vec!["log".to_string()],
            webhook_url: String::new(),
            timeout_secs: 5,
            history_limit: None,
            dedup_ttl_secs: None,
            resolve_on_recovery: false,
            email: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8001,
        }
    }
}

/// A watched service, either a bare name or a `{name: ...}` map
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ServiceEntry {
    Name(String),
    Named { name: String },
}

impl ServiceEntry {
    fn into_name(self) -> String {
        match self {
            ServiceEntry::Name(name) | ServiceEntry::Named { name } => name,
        }
    }
}

/// Agent configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub monitoring: MonitoringConfig,
    pub alerts: AlertsConfig,
    pub log_level: String,
    /// Second log sink, `None` logs to stdout only
    pub log_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub services: Vec<String>,
    pub api: ApiConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            monitoring: MonitoringConfig::default(),
            alerts: AlertsConfig::default(),
            log_level: "info".to_string(),
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            output_dir: PathBuf::from("."),
            services: Vec::new(),
            api: ApiConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the config file and the process environment
    ///
    /// `path` wins over `SRE_CONFIG_FILE`, which wins over `config.yaml`.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("SRE_CONFIG_FILE").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = Self::from_sources(Some(&path), None);
        config.apply_webhook_fallback(std::env::var("SLACK_WEBHOOK").ok());
        config
    }

    /// Load from an optional file and an environment map
    ///
    /// `env` replaces the process environment when given.
    pub fn from_sources(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Self {
        let environment = || {
            Environment::with_prefix("SRE")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("alerts.methods")
                .try_parsing(true)
                .source(env.clone())
        };

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Yaml)
                    .required(false),
            );
        }

        let source = match builder.add_source(environment()).build() {
            Ok(source) => source,
            Err(e) => {
                warn!(
                    path = ?path,
                    error = %e,
                    "Could not load config file, using defaults and environment"
                );
                Config::builder()
                    .add_source(environment())
                    .build()
                    .unwrap_or_default()
            }
        };

        Self::from_config(&source)
    }

    fn from_config(source: &Config) -> Self {
        let defaults = Self::default();
        let m = &defaults.monitoring;
        let a = &defaults.alerts;

        let monitoring = MonitoringConfig {
            interval_seconds: positive(
                "monitoring.interval_seconds",
                get_or(source, "monitoring.interval_seconds", m.interval_seconds),
                m.interval_seconds,
            ),
            cpu_threshold: percent(source, "monitoring.cpu_threshold", m.cpu_threshold),
            memory_threshold: percent(source, "monitoring.memory_threshold", m.memory_threshold),
            disk_threshold: percent(source, "monitoring.disk_threshold", m.disk_threshold),
            collect_timeout_secs: positive(
                "monitoring.collect_timeout_secs",
                get_or(source, "monitoring.collect_timeout_secs", m.collect_timeout_secs),
                m.collect_timeout_secs,
            ),
        };

        let alerts = AlertsConfig {
            enabled: get_or(source, "alerts.enabled", a.enabled),
            methods: get_or(source, "alerts.methods", a.methods.clone()),
            webhook_url: get_or(source, "alerts.webhook_url", a.webhook_url.clone()),
            timeout_secs: positive(
                "alerts.timeout_secs",
                get_or(source, "alerts.timeout_secs", a.timeout_secs),
                a.timeout_secs,
            ),
            history_limit: get_or(source, "alerts.history_limit", None),
            dedup_ttl_secs: get_or(source, "alerts.dedup_ttl_secs", None),
            resolve_on_recovery: get_or(
                source,
                "alerts.resolve_on_recovery",
                a.resolve_on_recovery,
            ),
            email: get_or(source, "alerts.email", None),
        };

        let services = get_or::<Vec<ServiceEntry>>(source, "services", Vec::new())
            .into_iter()
            .map(ServiceEntry::into_name)
            .collect();

        Self {
            monitoring,
            alerts,
            log_level: get_or(source, "logging.level", defaults.log_level.clone())
                .to_lowercase(),
            log_file: Some(get_or(
                source,
                "logging.file",
                DEFAULT_LOG_FILE.to_string(),
            ))
            .filter(|file| !file.is_empty())
            .map(PathBuf::from),
            output_dir: get_or(source, "reporting.output_dir", defaults.output_dir.clone()),
            services,
            api: ApiConfig {
                enabled: get_or(source, "api.enabled", defaults.api.enabled),
                port: get_or(source, "api.port", defaults.api.port),
            },
        }
    }

    /// Use `fallback` as the webhook URL when none is configured
    pub fn apply_webhook_fallback(&mut self, fallback: Option<String>) {
        if self.alerts.webhook_url.is_empty() {
            if let Some(url) = fallback.filter(|u| !u.is_empty()) {
                self.alerts.webhook_url = url;
            }
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.monitoring.interval_seconds)
    }

    pub fn collect_timeout(&self) -> Duration {
        Duration::from_secs(self.monitoring.collect_timeout_secs)
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            cpu: self.monitoring.cpu_threshold,
            memory: self.monitoring.memory_threshold,
            disk: self.monitoring.disk_threshold,
        }
    }

    pub fn alert_settings(&self) -> AlertSettings {
        AlertSettings {
            enabled: self.alerts.enabled,
            history_limit: self.alerts.history_limit,
            dedup_ttl: self.alerts.dedup_ttl_secs.map(Duration::from_secs),
            resolve_on_recovery: self.alerts.resolve_on_recovery,
        }
    }

    pub fn report_writer(&self) -> ReportWriter {
        ReportWriter::new(&self.output_dir)
    }

    /// Build the dispatcher from `alerts.methods`
    ///
    /// Unknown methods and channels missing their settings are skipped
    /// with a warning.
    pub fn dispatcher(&self) -> Dispatcher {
        let timeout = Duration::from_secs(self.alerts.timeout_secs);
        let mut dispatcher = Dispatcher::default();

        for method in &self.alerts.methods {
            let kind = match method.parse::<ChannelKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    warn!(method = %method, error = %e, "Ignoring alert method");
                    continue;
                }
            };

            match kind {
                ChannelKind::Log => dispatcher.add_channel(Channel::Log),
                ChannelKind::Webhook if self.alerts.webhook_url.is_empty() => {
                    warn!(method = %method, "Webhook alert method enabled without a URL, skipping");
                }
                ChannelKind::Webhook => dispatcher.add_channel(Channel::Webhook(
                    WebhookChannel::new(self.alerts.webhook_url.clone(), timeout),
                )),
                ChannelKind::Email => match &self.alerts.email {
                    Some(email) => dispatcher
                        .add_channel(Channel::Email(EmailChannel::new(email.clone(), timeout))),
                    None => warn!(
                        "Email alert method enabled without alerts.email settings, skipping"
                    ),
                },
            }
        }

        dispatcher
    }
}

/// Read `key`, falling back to `default` when missing or malformed
fn get_or<T: DeserializeOwned>(source: &Config, key: &str, default: T) -> T {
    match source.get::<T>(key) {
        Ok(value) => value,
        Err(ConfigError::NotFound(_)) => default,
        Err(e) => {
            warn!(key = %key, error = %e, "Invalid config value, using default");
            default
        }
    }
}

fn percent(source: &Config, key: &str, default: f64) -> f64 {
    let value = get_or(source, key, default);
    if (0.0..=100.0).contains(&value) {
        value
    } else {
        warn!(key = %key, value, default, "Threshold outside [0, 100], using default");
        default
    }
}

fn positive(key: &str, value: u64, default: u64) -> u64 {
    if value == 0 {
        warn!(key = %key, default, "Value must be positive, using default");
        default
    } else {
        value
    }
}
