//! Core domain types and service traits for Peerwatch
//!
//! This module defines the fundamental data structures and trait contracts
//! that govern component interactions throughout the application.

use crate::dns::ResolveError;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// The address of one cluster member as reported to the membership layer.
///
/// The port is always the local node's own listening port. DNS only ever
/// contributes the host part; resolved records carry no port we trust.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterNodeAddress {
    pub host: String,
    pub port: u16,
}

impl ClusterNodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ClusterNodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The result of one discovery cycle.
///
/// `nodes` is `Some` only when a resolution attempt succeeded; it then holds
/// the full current peer list (replacement semantics), which may be empty.
/// `None` means "no update this cycle" and the caller must keep whatever
/// membership it already has. `next_interval` is always present and tells
/// the driver when to schedule the next reload.
#[derive(Debug, Clone)]
pub struct DiscoveryCycle {
    pub nodes: Option<Vec<ClusterNodeAddress>>,
    pub next_interval: Duration,
}

/// Capability to resolve a DNS name to all of its IP addresses.
///
/// Implementations enforce their own timeout budget and drop anything that
/// is not a syntactically valid IP address.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve_all(&self, name: &str) -> Result<Vec<IpAddr>, ResolveError>;
}

/// Consumer of discovered node lists.
///
/// Called once per successful cycle with the complete current peer set.
#[async_trait]
pub trait NodeSink: Send + Sync {
    async fn provide_current_nodes(&self, nodes: &[ClusterNodeAddress]) -> Result<()>;
}
