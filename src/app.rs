//! The main application logic, decoupled from the entry point.

use crate::{
    config::{Config, DiscoveryConfig},
    core::{AddressResolver, ClusterNodeAddress, NodeSink},
    discovery::DnsDiscovery,
    dns::HickoryAddressResolver,
    internal_metrics::{DiscoveryMetrics, MetricsBuilder},
    outputs::StdoutNodeSink,
    task_manager::TaskManager,
    utils::heartbeat::run_heartbeat,
};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// A handle to the running application, containing all its task handles.
pub struct App {
    task_manager: TaskManager,
    metrics_addr: Option<SocketAddr>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// Waits for the shutdown signal and then gracefully shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        shutdown_rx.changed().await.ok();
        info!("Shutdown signal received in run function. Waiting for tasks to complete...");

        self.task_manager.shutdown().await;

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// This pattern allows for a clean separation of concerns between constructing
/// the application's components and running the application. It also provides
/// a convenient way to override components for testing purposes.
pub struct AppBuilder {
    config: Config,
    resolver_override: Option<Arc<dyn AddressResolver>>,
    sink_override: Option<Arc<dyn NodeSink>>,
    metrics_override: Option<Arc<DiscoveryMetrics>>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            resolver_override: None,
            sink_override: None,
            metrics_override: None,
        }
    }

    /// Overrides the DNS resolver for testing.
    pub fn resolver_override(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.resolver_override = Some(resolver);
        self
    }

    /// Overrides the node sink for testing.
    pub fn sink_override(mut self, sink: Arc<dyn NodeSink>) -> Self {
        self.sink_override = Some(sink);
        self
    }

    /// Overrides the metrics system for testing.
    pub fn metrics_override(mut self, metrics: Arc<DiscoveryMetrics>) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    /// Builds and initializes all application components, returning a runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // =========================================================================
        // 1. Initialize Metrics
        // =========================================================================
        let (metrics, metrics_server_info) = match self.metrics_override {
            Some(m) => (m, None),
            None => {
                let (metrics, server_info) = MetricsBuilder::new(config.metrics.clone())
                    .build(task_manager.get_shutdown_rx());
                (Arc::new(metrics), server_info)
            }
        };

        let metrics_addr = if let Some((server, addr)) = metrics_server_info {
            task_manager.spawn("MetricsServer", server.run());
            Some(addr)
        } else {
            None
        };

        // =========================================================================
        // 2. Resolve the Discovery Configuration
        // =========================================================================
        let discovery_config = DiscoveryConfig::resolve(&config.discovery)?;
        info!(
            reload_interval_secs = discovery_config.reload_interval_secs,
            resolution_timeout_secs = discovery_config.resolution_timeout_secs,
            backoff_floor_secs = discovery_config.backoff_floor_secs(),
            reset_on_topology_change = discovery_config.reset_on_topology_change,
            "Discovery configuration resolved"
        );
        match &discovery_config.name {
            Some(name) => info!(name, "Discovering cluster peers via DNS"),
            None => warn!(
                "No discovery name configured. The poller will stay idle until one is provided."
            ),
        }

        // =========================================================================
        // 3. Instantiate the DNS Resolver
        // =========================================================================
        let resolver = match self.resolver_override {
            Some(resolver) => {
                debug!("Using injected address resolver");
                resolver
            }
            None => {
                let (resolver, nameservers) =
                    HickoryAddressResolver::from_config(&discovery_config)?;
                info!(nameservers = ?nameservers, "DNS resolver initialized");
                Arc::new(resolver) as Arc<dyn AddressResolver>
            }
        };

        // =========================================================================
        // 4. Setup the Node Sink
        // =========================================================================
        let sink = match self.sink_override {
            Some(sink) => sink,
            None => {
                debug!("Initializing StdoutNodeSink");
                Arc::new(StdoutNodeSink::new()) as Arc<dyn NodeSink>
            }
        };

        // =========================================================================
        // 5. Spawn the Discovery Poller
        // =========================================================================
        let own_address = ClusterNodeAddress::new(config.node.host.clone(), config.node.port);
        let discovery = DnsDiscovery::new(discovery_config, resolver, metrics.clone());

        let poller_shutdown_rx = task_manager.get_shutdown_rx();
        task_manager.spawn(
            "DiscoveryPoller",
            run_poller(discovery, own_address, sink, poller_shutdown_rx),
        );

        let hb_metrics = metrics.clone();
        let hb_shutdown_rx = task_manager.get_shutdown_rx();
        task_manager.spawn("DiscoveryPoller-heartbeat", async move {
            run_heartbeat("DiscoveryPoller", hb_metrics, hb_shutdown_rx).await
        });

        info!("Peerwatch initialized successfully. Polling for cluster peers...");

        Ok(App {
            task_manager,
            metrics_addr,
        })
    }
}

/// Drives the discovery engine until shutdown.
///
/// Every cycle that produced a membership list is forwarded to the sink, then
/// the poller sleeps for the interval the engine asked for before reloading.
async fn run_poller(
    mut discovery: DnsDiscovery,
    own_address: ClusterNodeAddress,
    sink: Arc<dyn NodeSink>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut cycle = discovery.init(own_address).await;
    loop {
        if let Some(nodes) = &cycle.nodes {
            if let Err(e) = sink.provide_current_nodes(nodes).await {
                error!("Failed to publish current nodes: {}", e);
            }
        }

        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                info!("Discovery poller received shutdown signal.");
                break;
            }
            _ = sleep(cycle.next_interval) => {}
        }

        cycle = discovery.reload().await;
    }
    discovery.destroy();
}
