//! Offline inspection of routing decisions.
//!
//! Builds a locator from a node list given on the command line and reports:
//! - the primary node and failover sequence for a key
//! - how a batch of keys distributes over the nodes
//! - which replica a pick policy selects
//! - the stats a locator publishes to its registry

pub mod commands;
pub mod config;

pub use commands::{Command, CommandResult};
pub use config::CliConfig;
