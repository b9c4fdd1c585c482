//! Peerwatch - DNS-based cluster membership discovery.
//!
//! This library periodically resolves a configured discovery name, maps the
//! answers onto cluster node addresses, and reports the current membership
//! to a pluggable sink. Poll timing follows an exponential backoff schedule
//! capped at the configured reload interval.

pub mod app;
pub mod backoff;
pub mod cli;
pub mod config;
pub mod core;
pub mod discovery;
pub mod dns;
pub mod internal_metrics;
pub mod outputs;
pub mod task_manager;
pub mod tracker;
pub mod utils;

// Re-export core types for convenience
pub use crate::core::*;
