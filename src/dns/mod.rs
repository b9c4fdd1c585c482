pub mod resolver;
#[cfg(feature = "test-utils")]
pub mod test_utils;

use thiserror::Error;

pub use crate::core::AddressResolver;
pub use resolver::HickoryAddressResolver;

/// Why a discovery cycle produced no node list.
///
/// None of these cross the engine's boundary: the orchestrator absorbs them
/// into logs and counters. `NotConfigured` is not counted as a failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No discovery name is configured, so no query was issued.
    #[error("no discovery name configured")]
    NotConfigured,

    /// The resolve call exceeded its time budget.
    #[error("DNS resolution timed out")]
    Timeout,

    /// The resolver reported a failure (NXDOMAIN, network unreachable, ...).
    #[error("DNS query failed: {0}")]
    Query(String),
}
