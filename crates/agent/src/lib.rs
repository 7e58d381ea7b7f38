//! Configuration and HTTP surface of the SRE agent binary

pub mod api;
pub mod config;
pub mod single;
