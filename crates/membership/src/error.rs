//! Error types for membership plumbing.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MembershipError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MembershipError {
    /// The locator rejected the change.
    #[error("Locator error: {0}")]
    Locator(#[from] corelib::Error),
    /// The apply loop has stopped and no longer accepts changes.
    #[error("Membership apply loop closed")]
    Closed,
    /// The membership source failed.
    #[error("Membership source error: {0}")]
    Source(String),
}
