//! Topology change tracking.
//!
//! Compares the host set from the latest resolution against the previously
//! reported one. The diff feeds logging and the optional backoff reset; it
//! never decides whether a result is propagated. Identical or shrinking
//! results still go out in full.

use std::collections::BTreeSet;

/// Hosts that appeared or disappeared between two consecutive observations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopologyDiff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl TopologyDiff {
    /// Returns `true` if the two observed host sets differ at all.
    pub fn is_change(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Computes which hosts were added to and removed from `previous`.
pub fn diff(previous: &BTreeSet<String>, current: &BTreeSet<String>) -> TopologyDiff {
    TopologyDiff {
        added: current.difference(previous).cloned().collect(),
        removed: previous.difference(current).cloned().collect(),
    }
}
