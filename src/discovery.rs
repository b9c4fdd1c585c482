//! The cluster discovery engine.
//!
//! `DnsDiscovery` owns the poll lifecycle: it resolves the configured
//! discovery name, maps the answers onto cluster node addresses, tracks
//! membership changes between cycles, and decides how long to wait before
//! the next poll using the exponential backoff schedule.

use crate::backoff::BackoffSchedule;
use crate::config::DiscoveryConfig;
use crate::core::{AddressResolver, ClusterNodeAddress, DiscoveryCycle};
use crate::dns::ResolveError;
use crate::internal_metrics::DiscoveryMetrics;
use crate::tracker;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Mutable state carried across poll cycles.
#[derive(Debug)]
struct PollState {
    own_address: Option<ClusterNodeAddress>,
    last_known_hosts: Option<BTreeSet<String>>,
    schedule: BackoffSchedule,
    current_interval: Duration,
    cycles: u64,
}

/// Periodic DNS-backed cluster membership discovery.
pub struct DnsDiscovery {
    config: DiscoveryConfig,
    resolver: Arc<dyn AddressResolver>,
    metrics: Arc<DiscoveryMetrics>,
    state: PollState,
}

impl DnsDiscovery {
    /// Creates a new discovery engine from a resolved configuration.
    pub fn new(
        config: DiscoveryConfig,
        resolver: Arc<dyn AddressResolver>,
        metrics: Arc<DiscoveryMetrics>,
    ) -> Self {
        let schedule =
            BackoffSchedule::new(config.backoff_floor_secs(), config.reload_interval_secs);
        let current_interval = Duration::from_secs(config.reload_interval_secs);
        Self {
            config,
            resolver,
            metrics,
            state: PollState {
                own_address: None,
                last_known_hosts: None,
                schedule,
                current_interval,
                cycles: 0,
            },
        }
    }

    /// Runs the first poll cycle for this node.
    ///
    /// The node's own cluster address is remembered so later reloads can
    /// reuse its port when mapping resolved IPs onto peer addresses.
    pub async fn init(&mut self, own_address: ClusterNodeAddress) -> DiscoveryCycle {
        info!(node = %own_address, "Initializing cluster discovery");
        self.state.own_address = Some(own_address.clone());
        self.run_cycle(own_address).await
    }

    /// Runs one reload cycle.
    ///
    /// A reload before `init` is tolerated: it skips the DNS query and asks
    /// to be called again after the configured reload interval.
    pub async fn reload(&mut self) -> DiscoveryCycle {
        match self.state.own_address.clone() {
            Some(own) => self.run_cycle(own).await,
            None => {
                warn!("Reload requested before initialization, skipping DNS query");
                DiscoveryCycle {
                    nodes: None,
                    next_interval: Duration::from_secs(self.config.reload_interval_secs),
                }
            }
        }
    }

    /// Consumes the engine and logs a final summary of its activity.
    pub fn destroy(self) {
        info!(
            cycles = self.state.cycles,
            successes = self.metrics.query_success_count(),
            failures = self.metrics.query_failed_count(),
            last_interval_secs = self.state.current_interval.as_secs(),
            "Cluster discovery stopped"
        );
    }

    /// The most recent successfully resolved peer hosts, if any.
    pub fn last_known_hosts(&self) -> Option<&BTreeSet<String>> {
        self.state.last_known_hosts.as_ref()
    }

    async fn run_cycle(&mut self, own: ClusterNodeAddress) -> DiscoveryCycle {
        self.state.cycles += 1;

        let attempt = match self.config.name.as_deref() {
            Some(name) => {
                debug!(name, "Querying DNS for cluster peers");
                self.resolver.resolve_all(name).await
            }
            None => Err(ResolveError::NotConfigured),
        };

        let (nodes, next_interval) = match attempt {
            Ok(addresses) => {
                let nodes: Vec<ClusterNodeAddress> = addresses
                    .iter()
                    .map(|ip| ClusterNodeAddress::new(ip.to_string(), own.port))
                    .collect();
                let hosts: BTreeSet<String> = nodes.iter().map(|n| n.host.clone()).collect();
                self.accept_hosts(hosts);
                self.metrics.record_success(nodes.len() as u64);
                (Some(nodes), self.state.schedule.next_interval())
            }
            Err(ResolveError::NotConfigured) => {
                // Not an error: the deployment simply has no discovery name
                // yet. The schedule is left untouched so a later reload (for
                // example after a config change) starts from a fresh curve.
                warn!("No discovery name configured, skipping DNS query");
                return DiscoveryCycle {
                    nodes: None,
                    next_interval: Duration::from_secs(self.config.reload_interval_secs),
                };
            }
            Err(err) => {
                warn!(reason = %err, "Cluster discovery query failed");
                self.metrics.record_failure();
                (None, self.state.schedule.next_interval())
            }
        };

        self.state.current_interval = next_interval;
        debug!(secs = next_interval.as_secs(), "Next discovery poll scheduled");
        DiscoveryCycle {
            nodes,
            next_interval,
        }
    }

    /// Folds a successful resolution into the tracked membership.
    ///
    /// The first successful cycle only seeds the snapshot. Afterwards every
    /// change is logged, and (when enabled) resets the backoff schedule so
    /// a shifting cluster is observed at the floor interval again.
    fn accept_hosts(&mut self, current: BTreeSet<String>) {
        match self.state.last_known_hosts.take() {
            Some(previous) => {
                let diff = tracker::diff(&previous, &current);
                if diff.is_change() {
                    info!(added = ?diff.added, removed = ?diff.removed, "Cluster topology changed");
                    if self.config.reset_on_topology_change {
                        self.state.schedule.reset();
                    }
                } else {
                    debug!("Topology unchanged");
                }
            }
            None => {
                info!(hosts = ?current, "Initial peer set discovered");
            }
        }
        self.state.last_known_hosts = Some(current);
    }
}
