//! Agent library for host health monitoring
//!
//! This crate provides the core functionality for:
//! - Host metrics collection (CPU, memory, disks, watched processes)
//! - Threshold classification and overall status reduction
//! - Deduplicated alerting and dispatch to notification channels
//! - Cycle summaries and reports
//! - Health checks and observability

pub mod alert;
pub mod classify;
pub mod collector;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod report;
pub mod summary;

pub use alert::{Alert, AlertManager, AlertSettings, Severity};
pub use classify::{classify, reduce, Thresholds};
pub use dispatch::{Channel, ChannelKind, DispatchReport, Dispatcher};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use monitor::{CycleReport, MonitorLoop, StopHandle};
pub use observability::{AgentMetrics, StructuredLogger};
pub use summary::{Summary, SummaryBuilder};
