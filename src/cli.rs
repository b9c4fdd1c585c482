//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `peerwatch.toml` file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// A periodic DNS-based cluster membership discovery daemon.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// DNS name to query for peer addresses.
    #[arg(long, value_name = "NAME")]
    pub discovery_name: Option<String>,

    /// DNS server to use instead of the system resolver, `host` or `host:port`.
    #[arg(long, value_name = "ADDR")]
    pub dns_server: Option<String>,

    /// Reload interval (and backoff ceiling) in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub reload_interval: Option<u64>,

    /// The local node's own cluster port, attached to every reported peer.
    #[arg(long, value_name = "PORT")]
    pub own_port: Option<u16>,

    /// Logging level (trace, debug, info, warn, error).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Serve Prometheus metrics on this address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_listen: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        let mut discovery = Dict::new();
        if let Some(name) = &self.discovery_name {
            discovery.insert("name".into(), Value::from(name.clone()));
        }
        if let Some(server) = &self.dns_server {
            discovery.insert("dns_server_address".into(), Value::from(server.clone()));
        }
        if let Some(secs) = self.reload_interval {
            discovery.insert("reload_interval_secs".into(), Value::from(secs));
        }
        if !discovery.is_empty() {
            dict.insert("discovery".into(), Value::from(discovery));
        }

        if let Some(port) = self.own_port {
            let mut node = Dict::new();
            node.insert("port".into(), Value::from(port));
            dict.insert("node".into(), Value::from(node));
        }

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        // Naming a listen address implies enabling the endpoint.
        if let Some(addr) = &self.metrics_listen {
            let mut metrics = Dict::new();
            metrics.insert("enabled".into(), Value::from(true));
            metrics.insert("listen_address".into(), Value::from(addr.clone()));
            dict.insert("metrics".into(), Value::from(metrics));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
