//! Node sinks that receive the discovered cluster membership.
//!
//! The discovery poller pushes every successful resolution result into a
//! [`NodeSink`]. The default sink prints one JSON document per cycle to
//! stdout so operators (or a supervising process) can consume membership
//! updates line by line.

use crate::core::{ClusterNodeAddress, NodeSink};
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// One membership report, serialized as a single JSON line.
#[derive(Debug, Serialize)]
struct NodeReport<'a> {
    event: &'static str,
    count: usize,
    nodes: &'a [ClusterNodeAddress],
}

/// Writes the current membership to stdout as newline-delimited JSON.
#[derive(Debug, Default)]
pub struct StdoutNodeSink;

impl StdoutNodeSink {
    pub fn new() -> Self {
        Self
    }

    fn render(nodes: &[ClusterNodeAddress]) -> Result<String> {
        let report = NodeReport {
            event: "membership",
            count: nodes.len(),
            nodes,
        };
        Ok(serde_json::to_string(&report)?)
    }
}

#[async_trait]
impl NodeSink for StdoutNodeSink {
    async fn provide_current_nodes(&self, nodes: &[ClusterNodeAddress]) -> Result<()> {
        let line = Self::render(nodes)?;
        println!("{line}");
        Ok(())
    }
}
