//! # Internal Metrics Module
//!
//! This module provides the infrastructure for collecting and exposing the
//! discovery metrics.
//!
//! ## Components:
//!
//! - **`MetricsBuilder`**: The entry point for initializing the metrics
//!   system. It sets up the Prometheus recorder and constructs the
//!   `DiscoveryMetrics` handle plus the optional scrape server.
//!
//! - **`DiscoveryMetrics`**: The handle the rest of the application records
//!   through. Every write lands twice: in the `metrics` facade for the
//!   Prometheus endpoint, and in plain atomics so the poller's single-writer
//!   counters can be read concurrently by the heartbeat task and by tests.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) An `axum`-based web
//!   server that exposes the `/metrics` endpoint for Prometheus to scrape.

use crate::config::MetricsConfig;
use crate::internal_metrics::server::MetricsServer;
use metrics::{Counter, Gauge, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::error;

pub const QUERY_SUCCESS_TOTAL: &str = "peerwatch_discovery_query_success_total";
pub const QUERY_FAILED_TOTAL: &str = "peerwatch_discovery_query_failed_total";
pub const RESOLVED_ADDRESSES: &str = "peerwatch_discovery_resolved_addresses";

/// The public API for the discovery metrics.
pub struct DiscoveryMetrics {
    query_success: AtomicU64,
    query_failed: AtomicU64,
    resolved_addresses: AtomicU64,
    success_counter: Counter,
    failure_counter: Counter,
    address_gauge: Gauge,
}

impl std::fmt::Debug for DiscoveryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryMetrics").finish_non_exhaustive()
    }
}

impl DiscoveryMetrics {
    /// Creates a new `DiscoveryMetrics` instance and registers descriptions
    /// for all supported metrics with the global recorder.
    ///
    /// Without an installed recorder the facade handles are no-ops; the
    /// atomic mirrors work either way.
    pub fn new() -> Self {
        metrics::describe_counter!(
            QUERY_SUCCESS_TOTAL,
            Unit::Count,
            "Total number of discovery cycles whose DNS resolution succeeded."
        );
        metrics::describe_counter!(
            QUERY_FAILED_TOTAL,
            Unit::Count,
            "Total number of discovery cycles whose DNS resolution failed."
        );
        metrics::describe_gauge!(
            RESOLVED_ADDRESSES,
            Unit::Count,
            "Number of peer addresses in the most recent successful resolution."
        );

        Self {
            query_success: AtomicU64::new(0),
            query_failed: AtomicU64::new(0),
            resolved_addresses: AtomicU64::new(0),
            success_counter: metrics::counter!(QUERY_SUCCESS_TOTAL),
            failure_counter: metrics::counter!(QUERY_FAILED_TOTAL),
            address_gauge: metrics::gauge!(RESOLVED_ADDRESSES),
        }
    }

    /// Records a successful resolution of `resolved` peer addresses.
    pub fn record_success(&self, resolved: u64) {
        self.query_success.fetch_add(1, Ordering::Relaxed);
        self.resolved_addresses.store(resolved, Ordering::Relaxed);
        self.success_counter.increment(1);
        self.address_gauge.set(resolved as f64);
    }

    /// Records a failed resolution attempt and clears the address gauge.
    pub fn record_failure(&self) {
        self.query_failed.fetch_add(1, Ordering::Relaxed);
        self.resolved_addresses.store(0, Ordering::Relaxed);
        self.failure_counter.increment(1);
        self.address_gauge.set(0.0);
    }

    pub fn query_success_count(&self) -> u64 {
        self.query_success.load(Ordering::Relaxed)
    }

    pub fn query_failed_count(&self) -> u64 {
        self.query_failed.load(Ordering::Relaxed)
    }

    pub fn resolved_address_count(&self) -> u64 {
        self.resolved_addresses.load(Ordering::Relaxed)
    }

    /// Creates a `DiscoveryMetrics` instance suitable for testing.
    ///
    /// The `metrics` crate's default recorder is a no-op, so tests observe
    /// the atomic mirrors instead of a metrics backend.
    pub fn new_for_test() -> Self {
        Self::new()
    }
}

impl Default for DiscoveryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the metrics system.
///
/// Responsible for initializing the Prometheus recorder, binding the scrape
/// endpoint, and creating the `DiscoveryMetrics` handle.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Initializes the metrics system and returns a `DiscoveryMetrics`
    /// handle and, when the endpoint is enabled, the scrape server with its
    /// bound address.
    ///
    /// Failures to bind or to install the recorder degrade to facade-less
    /// metrics with an error log; they never abort startup.
    pub fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (DiscoveryMetrics, Option<(MetricsServer, SocketAddr)>) {
        if !self.config.enabled {
            return (DiscoveryMetrics::new(), None);
        }

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        // Bind the listener before installing the recorder so a bad listen
        // address cannot leave a recorder installed with no server.
        let listener = match std::net::TcpListener::bind(&self.config.listen_address) {
            Ok(listener) => listener,
            Err(e) => {
                error!(
                    "Failed to bind metrics server to {}: {}",
                    self.config.listen_address, e
                );
                return (DiscoveryMetrics::new(), None);
            }
        };

        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Failed to get local address for metrics server: {}", e);
                return (DiscoveryMetrics::new(), None);
            }
        };

        // The listener must be non-blocking to be used with Tokio.
        if let Err(e) = listener.set_nonblocking(true) {
            error!("Failed to prepare metrics listener: {}", e);
            return (DiscoveryMetrics::new(), None);
        }
        let listener = match TcpListener::from_std(listener) {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to prepare metrics listener: {}", e);
                return (DiscoveryMetrics::new(), None);
            }
        };

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (DiscoveryMetrics::new(), None);
        }

        // Handles must be created after the recorder is installed so they
        // bind to the Prometheus registry.
        let metrics = DiscoveryMetrics::new();
        let server = MetricsServer::new(listener, handle, shutdown_rx);

        (metrics, Some((server, addr)))
    }
}

pub mod server;
