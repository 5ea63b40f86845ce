//! Error types for the core library.

use thiserror::Error;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, querying or mutating a locator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Invalid configuration or malformed membership input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The locator or group variant does not support this operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
    /// The ring is empty, so no node can serve the key.
    #[error("No node available")]
    NoNode,
    /// A replica group was resolved but currently has no master.
    #[error("Replica group {group} has no master")]
    NoMaster {
        /// Name of the group that was resolved.
        group: String,
    },
    /// Internal bookkeeping went out of sync.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// True for lookup misses, which callers treat as transient unavailability.
    pub fn is_lookup_miss(&self) -> bool {
        matches!(self, Error::NoNode | Error::NoMaster { .. })
    }
}
