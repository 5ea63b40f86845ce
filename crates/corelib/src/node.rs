//! Node abstractions for the routing layer.
//!
//! A node is a connection endpoint owned by the connection layer. The locator
//! only holds shared handles to nodes: it reads their name and liveness, and
//! requests shutdown when a node leaves the ring.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Separator used in replica addresses (`group^M^host:port`).
const REPLICA_SEPARATOR: char = '^';

/// A cache server connection as seen by the locator.
pub trait Node: Send + Sync + fmt::Debug + 'static {
    /// Stable, unique name of the node (usually `host:port`).
    fn name(&self) -> &str;

    /// Whether the connection is currently usable.
    fn is_active(&self) -> bool;

    /// Ask the connection layer to shut this node down.
    ///
    /// Must not block: the locator may call it right after a membership
    /// change has been applied.
    fn shutdown(&self);

    /// Replica metadata, present only for nodes that belong to a replica group.
    fn replica(&self) -> Option<&ReplicaAddress> {
        None
    }
}

/// Replica metadata attached to a node address.
///
/// The group name is immutable. The master flag is atomically settable so a
/// role change can update the node's metadata in step with its group.
#[derive(Debug)]
pub struct ReplicaAddress {
    group: String,
    endpoint: String,
    master: AtomicBool,
}

impl ReplicaAddress {
    /// Construct replica metadata, validating the group and endpoint.
    pub fn new(group: impl Into<String>, endpoint: impl Into<String>, master: bool) -> Result<Self> {
        let group = group.into();
        let endpoint = endpoint.into();
        if group.is_empty() || group.contains(REPLICA_SEPARATOR) {
            return Err(Error::InvalidArgument(format!(
                "invalid replica group name {:?}",
                group
            )));
        }
        if endpoint.is_empty() || endpoint.contains(REPLICA_SEPARATOR) {
            return Err(Error::InvalidArgument(format!(
                "invalid replica endpoint {:?}",
                endpoint
            )));
        }
        Ok(Self {
            group,
            endpoint,
            master: AtomicBool::new(master),
        })
    }

    /// Parse `group^M^host:port` (master) or `group^S^host:port` (slave).
    pub fn parse(address: &str) -> Result<Self> {
        let mut parts = address.splitn(3, REPLICA_SEPARATOR);
        let (group, role, endpoint) = match (parts.next(), parts.next(), parts.next()) {
            (Some(g), Some(r), Some(e)) => (g, r, e),
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "replica address {:?} is not group^role^endpoint",
                    address
                )))
            }
        };
        let master = match role {
            "M" => true,
            "S" => false,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "unknown replica role {:?} in {:?}",
                    other, address
                )))
            }
        };
        Self::new(group, endpoint, master)
    }

    /// Returns `true` if `address` uses the replica address form.
    pub fn is_replica_form(address: &str) -> bool {
        address.contains(REPLICA_SEPARATOR)
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_master(&self) -> bool {
        self.master.load(Ordering::Acquire)
    }

    /// Update the master flag. Only replica groups should call this.
    pub fn set_master(&self, master: bool) {
        self.master.store(master, Ordering::Release);
    }
}

impl Clone for ReplicaAddress {
    fn clone(&self) -> Self {
        Self {
            group: self.group.clone(),
            endpoint: self.endpoint.clone(),
            master: AtomicBool::new(self.is_master()),
        }
    }
}

impl fmt::Display for ReplicaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = if self.is_master() { "M" } else { "S" };
        write!(f, "{}^{}^{}", self.group, role, self.endpoint)
    }
}

/// In-memory node with no socket behind it.
///
/// Stands in for a real connection in tools and tests: liveness is a flag and
/// shutdown only records that it was requested.
#[derive(Debug)]
pub struct SimpleNode {
    name: String,
    replica: Option<ReplicaAddress>,
    active: AtomicBool,
    shut_down: AtomicBool,
}

impl SimpleNode {
    /// Construct a plain node named after its address.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replica: None,
            active: AtomicBool::new(true),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Construct a replica node; its name is the replica endpoint.
    pub fn with_replica(replica: ReplicaAddress) -> Self {
        Self {
            name: replica.endpoint().to_string(),
            replica: Some(replica),
            active: AtomicBool::new(true),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Build a node from a reported address, plain or replica form.
    pub fn from_address(address: &str) -> Result<Arc<Self>> {
        if address.is_empty() {
            return Err(Error::InvalidArgument("empty node address".into()));
        }
        if ReplicaAddress::is_replica_form(address) {
            Ok(Arc::new(Self::with_replica(ReplicaAddress::parse(address)?)))
        } else {
            Ok(Arc::new(Self::new(address)))
        }
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// True once the locator requested shutdown.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Node for SimpleNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && !self.is_shut_down()
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
    }

    fn replica(&self) -> Option<&ReplicaAddress> {
        self.replica.as_ref()
    }
}
