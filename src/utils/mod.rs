//! Small shared utilities.
pub mod heartbeat;
