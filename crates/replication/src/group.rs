//! Replica groups.
//!
//! A replica group is the set of connections serving one partition of the
//! keyspace: at most one master and a few slaves. The group name comes from
//! the members' replica addresses and never changes, so the group's ring
//! positions survive role changes.
//!
//! # Member lifecycle
//!
//! ```text
//! unassigned -> slave <-> master -> removed
//!                 (change_role)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use corelib::node::Node;
use corelib::{Error, Result};
use tracing::{debug, error, warn};

use crate::pick::ReplicaPick;

/// Whether a group accepts mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Mutable,
    ReadOnly,
}

/// One master, zero or more slaves, sharing a group name.
pub struct ReplicaGroup<N: Node + ?Sized> {
    name: String,
    master: Option<Arc<N>>,
    slaves: Vec<Arc<N>>,
    master_candidate: Option<Arc<N>>,
    max_size: usize,
    /// Round-robin toggle, flipped by every `pick` whatever the policy.
    slave_turn: AtomicBool,
    access: Access,
}

impl<N: Node + ?Sized> ReplicaGroup<N> {
    /// Create an empty group.
    pub fn new(name: impl Into<String>, max_size: usize) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument("empty replica group name".into()));
        }
        if max_size < 2 {
            return Err(Error::InvalidArgument(format!(
                "replica group size must be at least 2, got {}",
                max_size
            )));
        }
        Ok(Self {
            name,
            master: None,
            slaves: Vec::with_capacity(max_size - 1),
            master_candidate: None,
            max_size,
            slave_turn: AtomicBool::new(true),
            access: Access::Mutable,
        })
    }

    /// Create a group named after `node`'s replica address, with `node` in it.
    pub fn from_node(node: Arc<N>, max_size: usize) -> Result<Self> {
        let group = group_of(node.as_ref())?.to_string();
        let mut created = Self::new(group, max_size)?;
        if !created.add_member(Arc::clone(&node))? {
            return Err(Error::InvalidArgument(format!(
                "node {} cannot seed replica group {}",
                node.name(),
                created.name
            )));
        }
        Ok(created)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn master(&self) -> Option<&Arc<N>> {
        self.master.as_ref()
    }

    pub fn slaves(&self) -> &[Arc<N>] {
        &self.slaves
    }

    /// Master first, then slaves.
    pub fn members(&self) -> Vec<Arc<N>> {
        self.master.iter().chain(self.slaves.iter()).cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.master.as_ref().map_or(false, |m| m.name() == name)
            || self.slaves.iter().any(|s| s.name() == name)
    }

    pub fn len(&self) -> usize {
        usize::from(self.master.is_some()) + self.slaves.len()
    }

    /// A group with no members is pruned after the update that emptied it.
    pub fn is_empty_group(&self) -> bool {
        self.master.is_none() && self.slaves.is_empty()
    }

    pub fn is_read_only(&self) -> bool {
        self.access == Access::ReadOnly
    }

    pub fn master_candidate(&self) -> Option<&Arc<N>> {
        self.master_candidate.as_ref()
    }

    /// Add a member of this group, as master or slave per its address.
    ///
    /// Returns `false` for a node of another group, a node without replica
    /// metadata, a node already present, a full group, or a second master.
    pub fn add_member(&mut self, node: Arc<N>) -> Result<bool> {
        self.ensure_mutable("add_member")?;
        let Some(replica) = node.replica() else {
            warn!(node = node.name(), group = %self.name, "node has no replica address");
            return Ok(false);
        };
        if replica.group() != self.name {
            warn!(node = node.name(), group = %self.name, other = replica.group(), "node belongs to another group");
            return Ok(false);
        }
        if self.contains(node.name()) {
            return Ok(false);
        }
        if self.len() >= self.max_size {
            warn!(node = node.name(), group = %self.name, max = self.max_size, "replica group is full");
            return Ok(false);
        }
        if replica.is_master() {
            if let Some(current) = &self.master {
                error!(
                    node = node.name(),
                    master = current.name(),
                    group = %self.name,
                    "refusing second master in replica group"
                );
                return Ok(false);
            }
            self.master = Some(node);
        } else {
            self.slaves.push(node);
        }
        Ok(true)
    }

    /// Remove the member called `name`, master or slave.
    pub fn remove_member(&mut self, name: &str) -> Result<bool> {
        self.ensure_mutable("remove_member")?;
        if self.master_candidate.as_ref().map_or(false, |c| c.name() == name) {
            self.master_candidate = None;
        }
        if self.master.as_ref().map_or(false, |m| m.name() == name) {
            self.master = None;
            return Ok(true);
        }
        match self.slaves.iter().position(|s| s.name() == name) {
            Some(idx) => {
                self.slaves.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Select a member under `policy`.
    ///
    /// Flips the round-robin toggle on every call, including master and
    /// slave picks. Returns `None` only when the chosen fallback, the
    /// master, is missing.
    pub fn pick(&self, policy: ReplicaPick) -> Option<Arc<N>> {
        let slave_turn = self.slave_turn.fetch_xor(true, Ordering::AcqRel);
        match policy {
            ReplicaPick::Master => self.master.clone(),
            ReplicaPick::Slave => self.active_slave().or_else(|| self.master.clone()),
            ReplicaPick::RoundRobin if slave_turn => {
                self.active_slave().or_else(|| self.master.clone())
            }
            ReplicaPick::RoundRobin => self.master.clone(),
        }
    }

    fn active_slave(&self) -> Option<Arc<N>> {
        self.slaves.iter().find(|s| s.is_active()).cloned()
    }

    /// Choose the slave called `name` as the next master.
    pub fn set_master_candidate(&mut self, name: &str) -> Result<bool> {
        self.ensure_mutable("set_master_candidate")?;
        match self.slaves.iter().find(|s| s.name() == name) {
            Some(slave) => {
                self.master_candidate = Some(Arc::clone(slave));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Choose the first active slave as the next master (failover).
    pub fn elect_master_candidate(&mut self) -> Result<bool> {
        self.ensure_mutable("elect_master_candidate")?;
        self.master_candidate = self.active_slave();
        Ok(self.master_candidate.is_some())
    }

    /// Swap roles: the candidate becomes master, the old master a slave.
    ///
    /// Node metadata follows the group state. Returns `false` when no valid
    /// candidate was chosen.
    pub fn change_role(&mut self) -> Result<bool> {
        self.ensure_mutable("change_role")?;
        let Some(candidate) = self.master_candidate.take() else {
            return Ok(false);
        };
        let Some(idx) = self.slaves.iter().position(|s| s.name() == candidate.name()) else {
            warn!(node = candidate.name(), group = %self.name, "master candidate is no longer a slave");
            return Ok(false);
        };
        let promoted = self.slaves.remove(idx);
        set_master_flag(promoted.as_ref(), true);
        if let Some(demoted) = self.master.replace(Arc::clone(&promoted)) {
            set_master_flag(demoted.as_ref(), false);
            self.slaves.push(demoted);
        }
        debug!(group = %self.name, master = promoted.name(), "replica group changed role");
        Ok(true)
    }

    /// Independent copy that rejects every mutation.
    pub fn read_only_copy(&self) -> Self {
        Self {
            name: self.name.clone(),
            master: self.master.clone(),
            slaves: self.slaves.clone(),
            master_candidate: self.master_candidate.clone(),
            max_size: self.max_size,
            slave_turn: AtomicBool::new(self.slave_turn.load(Ordering::Acquire)),
            access: Access::ReadOnly,
        }
    }

    fn ensure_mutable(&self, operation: &'static str) -> Result<()> {
        match self.access {
            Access::Mutable => Ok(()),
            Access::ReadOnly => Err(Error::Unsupported(operation)),
        }
    }
}

impl<N: Node + ?Sized> fmt::Debug for ReplicaGroup<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaGroup")
            .field("name", &self.name)
            .field("master", &self.master.as_ref().map(|m| m.name()))
            .field("slaves", &self.slaves.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("access", &self.access)
            .finish()
    }
}

/// Group name from a node's replica address.
pub fn group_of<N: Node + ?Sized>(node: &N) -> Result<&str> {
    node.replica().map(|r| r.group()).ok_or_else(|| {
        Error::InvalidArgument(format!("node {} has no replica address", node.name()))
    })
}

fn set_master_flag<N: Node + ?Sized>(node: &N, master: bool) {
    if let Some(replica) = node.replica() {
        replica.set_master(master);
    }
}
