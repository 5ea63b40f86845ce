//! Node locators: key to node routing.
//!
//! All variants share the [`NodeLocator`] contract. They differ in what they
//! can do:
//!
//! | variant                 | ring        | live update |
//! |-------------------------|-------------|-------------|
//! | [`ArrayModNodeLocator`] | none        | no          |
//! | [`KetamaNodeLocator`]   | Ketama      | yes         |
//! | [`KetamaSnapshot`]      | Ketama copy | no          |
//!
//! Variants without live update fail fast with [`Error::Unsupported`].

pub mod array_mod;
pub mod builder;
pub mod ketama;
pub mod sequence;
pub mod snapshot;

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::node::Node;

pub use array_mod::{ArrayModNodeLocator, ArrayModSequence};
pub use builder::LocatorBuilder;
pub use ketama::KetamaNodeLocator;
pub use sequence::{KetamaSequence, PointLookup};
pub use snapshot::KetamaSnapshot;

/// Routing contract shared by all locators.
pub trait NodeLocator<N: Node + ?Sized>: Send + Sync {
    /// Failover iterator returned by [`sequence`](Self::sequence).
    type Sequence<'a>: Iterator<Item = Arc<N>>
    where
        Self: 'a;

    /// Read-only copy returned by [`snapshot`](Self::snapshot).
    type Snapshot: NodeLocator<N>;

    /// Node that must handle `key`.
    fn primary(&self, key: &str) -> Result<Arc<N>>;

    /// Finite sequence of fallback nodes for `key`, restarted on every call.
    fn sequence(&self, key: &str) -> Self::Sequence<'_>;

    /// Every node currently tracked.
    fn all_nodes(&self) -> Vec<Arc<N>>;

    /// A copy that is isolated from later updates.
    fn snapshot(&self) -> Self::Snapshot;

    /// Apply a membership change: detach first, then attach.
    fn update(&self, attach: Vec<Arc<N>>, detach: Vec<Arc<N>>) -> Result<()>;

    /// Apply a membership change to the nodes of a running migration.
    fn update_alter(&self, _attach: Vec<Arc<N>>, _detach: Vec<Arc<N>>) -> Result<()> {
        Err(Error::Unsupported("update_alter"))
    }
}
