//! Integration tests for the agent API endpoints

use agent_lib::{
    alert::AlertManager,
    classify::Thresholds,
    collector::{async_trait, Collector, Probe, RawSystem},
    dispatch::Dispatcher,
    error::CollectionError,
    health::{components, HealthRegistry},
    models::{MetricKind, Reading, ServiceCheck},
    monitor::MonitorLoop,
    observability::AgentMetrics,
    summary::Summary,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use sre_agent::api::{create_router, AppState};
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceExt;

struct FixedCollector;

#[async_trait]
impl Collector for FixedCollector {
    async fn collect_system(&self) -> Result<RawSystem, CollectionError> {
        Ok(RawSystem {
            cpu: Probe::Ok(Reading::new(MetricKind::Cpu, "cpu", 91.0)),
            memory: Probe::Ok(Reading::new(MetricKind::Memory, "memory", 40.0)),
            disk: vec![Probe::Ok(Reading::new(MetricKind::Disk, "/", 20.0))],
        })
    }

    async fn collect_services(
        &self,
        _names: &[String],
    ) -> Result<Vec<ServiceCheck>, CollectionError> {
        Ok(Vec::new())
    }
}

async fn setup_test_app() -> (Router, Arc<AppState>, watch::Sender<Option<Summary>>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::COLLECTOR).await;
    health_registry.register(components::DISPATCHER).await;
    health_registry.register(components::MONITOR).await;

    let metrics = AgentMetrics::new();
    let (summary_tx, summary_rx) = watch::channel(None);
    let state = Arc::new(AppState::new(health_registry, metrics, summary_rx));
    let router = create_router(state.clone());

    (router, state, summary_tx)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_health_returns_ok() {
    let (app, _state, _tx) = setup_test_app().await;

    let (status, body) = get(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state, _tx) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["collector"].is_object());
    assert!(health["components"]["dispatcher"].is_object());
    assert!(health["components"]["monitor"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state, _tx) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::COLLECTOR, "1 source(s) skipped")
        .await;

    let (status, body) = get(app, "/healthz").await;

    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state, _tx) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::COLLECTOR, "collection timed out after 30s")
        .await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_before_first_cycle() {
    let (app, _state, _tx) = setup_test_app().await;

    let (status, body) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state, _tx) = setup_test_app().await;

    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .set_unhealthy(components::MONITOR, "Failed")
        .await;

    let (status, _body) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_summary_returns_404_before_first_cycle() {
    let (app, _state, _tx) = setup_test_app().await;

    let (status, _body) = get(app, "/summary").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cycle_publishes_summary_and_readiness() {
    let (app, state, summary_tx) = setup_test_app().await;

    let mut monitor = MonitorLoop::new(
        Arc::new(FixedCollector),
        Thresholds::default(),
        AlertManager::default(),
        Dispatcher::log_only(),
    )
    .with_health(state.health_registry.clone())
    .with_summary_sender(summary_tx);
    monitor.run_cycle().await.unwrap();

    let (status, body) = get(app.clone(), "/summary").await;
    assert_eq!(status, StatusCode::OK);
    let summary: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(summary["overall_status"], "critical");
    assert_eq!(summary["metrics_summary"]["cpu"]["usage"], 91.0);
    assert_eq!(summary["alerts"]["count"], 1);
    assert_eq!(summary["alerts"]["high_severity"], 1);

    let (status, _body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state, _tx) = setup_test_app().await;

    state.metrics.observe_cycle_duration(0.25);
    state.metrics.inc_cycles();
    state.metrics.set_metric_value("cpu", "cpu", 42.0);
    state.metrics.set_overall_status(agent_lib::Status::Warning);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("sre_agent_cycles_total"));
    assert!(metrics_text.contains("sre_agent_cycle_duration_seconds_bucket"));
    assert!(metrics_text.contains("sre_agent_cycle_duration_seconds_count"));
    assert!(metrics_text.contains("sre_agent_metric_value_percent"));
    assert!(metrics_text.contains("sre_agent_overall_status"));
}
