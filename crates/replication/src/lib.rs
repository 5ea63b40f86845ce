//! Replica groups on a Ketama ring.
//!
//! Nodes carrying a `group^M|S^host:port` address are collected into replica
//! groups of one master and its slaves. The ring hashes group names; a pick
//! policy then chooses a node inside the resolved group.

pub mod group;
pub mod locator;
pub mod pick;
pub mod role;
pub mod snapshot;

pub use group::{group_of, Access, ReplicaGroup};
pub use locator::{GroupName, PolicyLookup, ReplicaKetamaNodeLocator};
pub use pick::ReplicaPick;
pub use role::RoleChange;
pub use snapshot::{ReplicaLocatorSnapshot, SnapshotLookup};
