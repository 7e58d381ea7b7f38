//! Error types for the monitoring pipeline
//!
//! None of these are fatal to the agent process. Collection and dispatch
//! errors are absorbed inside a cycle, cycle errors are absorbed by the loop.

use thiserror::Error;

/// Host readings could not be collected at all
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("collection timed out after {0}s")]
    Timeout(u64),

    #[error("collector task failed: {0}")]
    Task(String),
}

/// A notification channel failed to deliver an alert
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("email delivery failed: {0}")]
    Email(String),

    #[error("{channel} delivery timed out after {secs}s")]
    Timeout { channel: &'static str, secs: u64 },

    #[error("channel misconfigured: {0}")]
    Config(String),
}

/// A report could not be rendered or written
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write report {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A monitoring cycle failed as a whole
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("collection failed: {0}")]
    Collection(#[from] CollectionError),

    #[error("cycle panicked: {0}")]
    Panicked(String),
}
