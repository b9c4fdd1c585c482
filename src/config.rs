//! Configuration management for Peerwatch
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to load configuration from a `peerwatch.toml` file and merge it
//! with environment variables and command-line arguments.
//!
//! The `[discovery]` keys get a second, per-field resolution pass
//! (`DiscoveryConfig::resolve`): a dedicated environment variable overrides
//! the file value, which overrides the hard default. Blank values count as
//! absent, unparsable values are fatal, and non-positive intervals fall back
//! to the defaults so the engine never runs with a zero or negative timer.

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::cli::Cli;

/// Default resolution timeout, applied when no source provides one.
pub const DEFAULT_RESOLUTION_TIMEOUT_SECS: u64 = 30;
/// Default reload interval and backoff ceiling.
pub const DEFAULT_RELOAD_INTERVAL_SECS: u64 = 30;
/// Standard DNS port, used when an address override names no usable port.
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Config file merged when no `--config-file` is given.
pub const DEFAULT_CONFIG_FILE: &str = "peerwatch.toml";

pub const ENV_DNS_SERVER_ADDRESS: &str = "PEERWATCH_DNS_SERVER_ADDRESS";
pub const ENV_DISCOVERY_NAME: &str = "PEERWATCH_DISCOVERY_NAME";
pub const ENV_RESOLUTION_TIMEOUT: &str = "PEERWATCH_RESOLUTION_TIMEOUT";
pub const ENV_RELOAD_INTERVAL: &str = "PEERWATCH_RELOAD_INTERVAL";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// The local node's own cluster address.
    pub node: NodeConfig,
    /// Discovery settings as read from the file layer.
    pub discovery: DiscoveryFileConfig,
    /// Prometheus endpoint settings.
    pub metrics: MetricsConfig,
}

/// The local node's own listening address, announced alongside every
/// discovered peer.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
}

/// Prometheus endpoint settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to expose the `/metrics` endpoint.
    pub enabled: bool,
    /// Address the metrics server binds to.
    pub listen_address: String,
}

/// The `[discovery]` file section, before the per-field override pass.
///
/// Numeric fields are signed so that non-positive file values reach
/// `DiscoveryConfig::resolve`, which warns and falls back to the default
/// instead of rejecting the file outright.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DiscoveryFileConfig {
    /// DNS server override, `host` or `host:port`.
    pub dns_server_address: Option<String>,
    /// DNS name to query for peer addresses. Absent means discovery is
    /// not configured and every cycle is a no-op.
    pub name: Option<String>,
    /// Budget for a single resolution attempt, in seconds.
    pub resolution_timeout_secs: i64,
    /// Reload interval and backoff ceiling, in seconds.
    pub reload_interval_secs: i64,
    /// Backoff floor, in seconds. Absent disables backoff and every cycle
    /// runs at `reload_interval_secs`.
    pub initial_interval_secs: Option<i64>,
    /// Restart backoff growth when the discovered host set changes.
    pub reset_on_topology_change: bool,
}

/// DNS server override address after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsServerAddress {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for DnsServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Discovery settings after the env > file > default pass.
///
/// Immutable once resolved; a session holds exactly one of these. Both
/// interval fields are guaranteed positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub dns_server_address: Option<DnsServerAddress>,
    pub name: Option<String>,
    pub resolution_timeout_secs: u64,
    pub reload_interval_secs: u64,
    pub initial_interval_secs: Option<u64>,
    pub reset_on_topology_change: bool,
}

/// A discovery setting that is present but cannot be used.
///
/// Absent values never produce this error; they silently default.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl Config {
    /// Loads the application configuration by layering sources: defaults,
    /// the TOML file, `PEERWATCH_`-prefixed environment variables, and CLI
    /// arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));

        let figment = match &cli.config_file {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found at specified path: {}", path.display());
                }
                figment.merge(Toml::file(path))
            }
            // The default file is optional; figment skips it when missing.
            None => figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
        };

        let config: Config = figment
            .merge(Env::prefixed("PEERWATCH_"))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            node: NodeConfig::default(),
            discovery: DiscoveryFileConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7946,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: "127.0.0.1:9598".to_string(),
        }
    }
}

impl Default for DiscoveryFileConfig {
    fn default() -> Self {
        Self {
            dns_server_address: None,
            name: None,
            resolution_timeout_secs: DEFAULT_RESOLUTION_TIMEOUT_SECS as i64,
            reload_interval_secs: DEFAULT_RELOAD_INTERVAL_SECS as i64,
            initial_interval_secs: None,
            reset_on_topology_change: false,
        }
    }
}

impl DiscoveryConfig {
    /// Resolves the discovery settings against the process environment.
    pub fn resolve(file: &DiscoveryFileConfig) -> Result<Self, ConfigError> {
        Self::resolve_from(file, &process_env())
    }

    /// Resolves the discovery settings against an explicit environment
    /// snapshot. Pure: identical inputs yield an identical configuration.
    pub fn resolve_from(
        file: &DiscoveryFileConfig,
        env: &BTreeMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let name = pick_string(
            env.get(ENV_DISCOVERY_NAME).map(String::as_str),
            file.name.as_deref(),
        );

        let dns_server_address = pick_string(
            env.get(ENV_DNS_SERVER_ADDRESS).map(String::as_str),
            file.dns_server_address.as_deref(),
        )
        .map(|addr| parse_server_address(&addr));

        let resolution_timeout_secs = pick_positive_secs(
            ENV_RESOLUTION_TIMEOUT,
            env.get(ENV_RESOLUTION_TIMEOUT).map(String::as_str),
            Some(file.resolution_timeout_secs),
            DEFAULT_RESOLUTION_TIMEOUT_SECS,
        )?;

        let reload_interval_secs = pick_positive_secs(
            ENV_RELOAD_INTERVAL,
            env.get(ENV_RELOAD_INTERVAL).map(String::as_str),
            Some(file.reload_interval_secs),
            DEFAULT_RELOAD_INTERVAL_SECS,
        )?;

        // The floor has no environment variable and no fallback default:
        // leaving it unset is the documented way to disable backoff.
        let initial_interval_secs = match file.initial_interval_secs {
            Some(secs) if secs > 0 => Some(secs as u64),
            Some(secs) => {
                warn!(
                    value = secs,
                    "Ignoring non-positive discovery.initial_interval_secs"
                );
                None
            }
            None => None,
        };

        Ok(Self {
            dns_server_address,
            name,
            resolution_timeout_secs,
            reload_interval_secs,
            initial_interval_secs,
            reset_on_topology_change: file.reset_on_topology_change,
        })
    }

    /// The backoff floor: the configured initial interval, or the reload
    /// interval itself when none is set (which disables backoff).
    pub fn backoff_floor_secs(&self) -> u64 {
        self.initial_interval_secs
            .unwrap_or(self.reload_interval_secs)
    }
}

/// Splits a `host:port` override on the first colon.
///
/// A bare host gets the standard DNS port. An unparsable port segment is
/// a warning, not an error, and also falls back to the standard port.
pub fn parse_server_address(address: &str) -> DnsServerAddress {
    match address.split_once(':') {
        None => DnsServerAddress {
            host: address.to_string(),
            port: DEFAULT_DNS_PORT,
        },
        Some((host, port_str)) => {
            let port = match port_str.parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    warn!(
                        address,
                        port = port_str,
                        "Unparsable port in DNS server address, using port {}",
                        DEFAULT_DNS_PORT
                    );
                    DEFAULT_DNS_PORT
                }
            };
            DnsServerAddress {
                host: host.to_string(),
                port,
            }
        }
    }
}

/// Snapshot of the `PEERWATCH_`-prefixed process environment.
fn process_env() -> BTreeMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with("PEERWATCH_"))
        .collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Precedence for string settings: non-blank env, then non-blank file.
fn pick_string(env_value: Option<&str>, file_value: Option<&str>) -> Option<String> {
    non_blank(env_value)
        .or(non_blank(file_value))
        .map(str::to_string)
}

/// Precedence for second-valued settings: non-blank env, then file, then
/// the default. An unparsable present value is fatal; a parseable but
/// non-positive value falls back to the default with a warning.
fn pick_positive_secs(
    env_key: &str,
    env_value: Option<&str>,
    file_value: Option<i64>,
    default: u64,
) -> Result<u64, ConfigError> {
    let chosen = match non_blank(env_value) {
        Some(raw) => {
            let parsed: i64 = raw
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                    key: env_key.to_string(),
                    value: raw.to_string(),
                    reason: e.to_string(),
                })?;
            Some(parsed)
        }
        None => file_value,
    };

    match chosen {
        Some(secs) if secs > 0 => Ok(secs as u64),
        Some(secs) => {
            warn!(
                key = env_key,
                value = secs,
                "Ignoring non-positive interval, using default of {}s",
                default
            );
            Ok(default)
        }
        None => Ok(default),
    }
}
