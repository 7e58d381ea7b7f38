//! SRE Agent - periodic host health monitoring
//!
//! Samples CPU, memory, disk and watched processes, classifies them against
//! configured thresholds, raises deduplicated alerts and renders reports.

use agent_lib::{
    alert::AlertManager,
    collector::{host_name, HostCollector},
    health::{components, HealthRegistry},
    monitor::MonitorLoop,
    observability::{AgentMetrics, StructuredLogger},
};
use anyhow::Result;
use clap::Parser;
use sre_agent::{api, config::AgentConfig, single};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Periodic host health-monitoring agent
#[derive(Parser, Debug)]
#[command(name = "sre-agent", version, about)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single check, print the report and save it as JSON
    #[arg(short, long)]
    once: bool,

    /// Run a single check, print the report and save it as text and JSON
    #[arg(short, long)]
    report: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config warnings go to stdout until the configured sinks exist
    let bootstrap = tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter("info"))
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || {
        AgentConfig::load(cli.config.as_deref())
    });

    // Held until exit so buffered file logs are flushed
    let (file_sink, _log_guard, file_error) = match config.log_file.as_deref() {
        Some(path) => match file_writer(path) {
            Ok((writer, guard)) => (Some(writer), Some(guard), None),
            Err(e) => (None, None, Some(e)),
        },
        None => (None, None, None),
    };

    // JSON logs to stdout and the log file; RUST_LOG wins over logging.level
    tracing_subscriber::registry()
        .with(env_filter(&config.log_level))
        .with(fmt::layer().json())
        .with(file_sink.map(|writer| fmt::layer().json().with_ansi(false).with_writer(writer)))
        .init();

    if let Some(e) = file_error {
        warn!(
            file = ?config.log_file,
            error = %e,
            "Could not open log file, logging to stdout only"
        );
    }

    let node_name = host_name().unwrap_or_else(|| "localhost".to_string());
    let continuous = !(cli.once || cli.report);

    let health_registry = HealthRegistry::new();
    health_registry.register(components::COLLECTOR).await;
    health_registry.register(components::DISPATCHER).await;
    health_registry.register(components::MONITOR).await;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&node_name);
    logger.log_startup(
        AGENT_VERSION,
        if continuous { "continuous" } else { "once" },
        config.monitoring.interval_seconds,
    );

    let dispatcher = config.dispatcher();
    info!(
        channels = ?dispatcher.channel_names(),
        services = ?config.services,
        "Agent configured"
    );

    let (summary_tx, summary_rx) = watch::channel(None);
    let collector = Arc::new(HostCollector::new().with_timeout(config.collect_timeout()));
    let mut monitor = MonitorLoop::new(
        collector,
        config.thresholds(),
        AlertManager::new(config.alert_settings()),
        dispatcher,
    )
    .with_interval(config.interval())
    .with_services(config.services.clone())
    .with_health(health_registry.clone())
    .with_logger(logger.clone())
    .with_summary_sender(summary_tx);

    if !continuous {
        let Some(report) = monitor.start(false).await else {
            return Ok(());
        };
        single::emit_reports(
            &mut std::io::stdout().lock(),
            &report.summary,
            &config.report_writer(),
            cli.report,
        )?;

        logger.log_shutdown("single check completed");
        return Ok(());
    }

    if config.api.enabled {
        let app_state = Arc::new(api::AppState::new(
            health_registry.clone(),
            metrics.clone(),
            summary_rx,
        ));
        let port = config.api.port;
        tokio::spawn(async move {
            if let Err(e) = api::serve(port, app_state).await {
                error!(error = %e, "API server stopped");
            }
        });
    }

    let stop = monitor.stop_handle();
    let signal_logger = logger.clone();
    tokio::spawn(async move {
        let reason = shutdown_signal().await;
        signal_logger.log_shutdown(reason);
        stop.stop();
    });

    monitor.start(true).await;
    info!("SRE agent stopped");

    Ok(())
}

/// `RUST_LOG` if set, otherwise `default`
fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Non-blocking appender for the log file, appending across restarts
fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard), InitError> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| sre_agent::config::DEFAULT_LOG_FILE.to_string());

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir)?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT received",
        _ = terminate => "SIGTERM received",
    }
}
