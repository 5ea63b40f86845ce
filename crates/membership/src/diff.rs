//! Diffing a reported node list against the locator's current nodes.
//!
//! Watchers report the whole list on every change. Nodes are matched by name
//! (the endpoint for replica addresses). A replica node whose reported role
//! differs from its current one is handled without a reconnect when a slave
//! of the same group is promoted; otherwise it is replaced.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use corelib::node::{Node, ReplicaAddress};
use replication::RoleChange;
use tracing::warn;

use crate::event::MembershipChange;
use crate::source::NodeFactory;

/// One entry of a reported node list.
#[derive(Debug)]
struct Reported {
    address: String,
    group: Option<String>,
    master: bool,
}

fn parse_reported(address: &str) -> Option<(String, Reported)> {
    if address.is_empty() {
        return None;
    }
    if !ReplicaAddress::is_replica_form(address) {
        let reported = Reported {
            address: address.to_string(),
            group: None,
            master: false,
        };
        return Some((address.to_string(), reported));
    }
    match ReplicaAddress::parse(address) {
        Ok(replica) => {
            let reported = Reported {
                address: address.to_string(),
                group: Some(replica.group().to_string()),
                master: replica.is_master(),
            };
            Some((replica.endpoint().to_string(), reported))
        }
        Err(err) => {
            warn!(address, error = %err, "ignoring malformed reported address");
            None
        }
    }
}

/// Difference between the current and the reported node lists.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeListDiff {
    /// Reported addresses to create and attach.
    pub attach: Vec<String>,
    /// Names of current nodes to detach.
    pub detach: Vec<String>,
    /// Slaves reported as master.
    pub role_changes: Vec<RoleChange>,
}

impl NodeListDiff {
    pub fn between<N, S>(current: &[Arc<N>], reported: &[S]) -> Self
    where
        N: Node + ?Sized,
        S: AsRef<str>,
    {
        let mut wanted: BTreeMap<String, Reported> = BTreeMap::new();
        for address in reported {
            if let Some((name, entry)) = parse_reported(address.as_ref()) {
                if wanted.contains_key(&name) {
                    warn!(node = %name, "duplicate node in reported list");
                    continue;
                }
                wanted.insert(name, entry);
            }
        }
        let current: BTreeMap<&str, &Arc<N>> = current.iter().map(|n| (n.name(), n)).collect();

        let mut diff = NodeListDiff::default();
        let mut replaced = BTreeSet::new();
        let mut promoted = BTreeSet::new();

        for (name, node) in &current {
            let Some(entry) = wanted.get(*name) else {
                diff.detach.push(name.to_string());
                continue;
            };
            match (node.replica(), entry.group.as_deref()) {
                (None, None) => {}
                (Some(replica), Some(group)) if replica.group() == group => {
                    if entry.master && !replica.is_master() {
                        diff.role_changes.push(RoleChange::new(group, *name));
                        promoted.insert(group.to_string());
                    }
                }
                _ => {
                    replaced.insert(name.to_string());
                }
            }
        }

        // A master reported as slave keeps its connection only when a current
        // slave takes over through a role change.
        for (name, node) in &current {
            let (Some(replica), Some(entry)) = (node.replica(), wanted.get(*name)) else {
                continue;
            };
            if replica.is_master() && !entry.master && !promoted.contains(replica.group()) {
                replaced.insert(name.to_string());
            }
        }

        for name in replaced {
            if let Some(entry) = wanted.get(&name) {
                diff.attach.push(entry.address.clone());
            }
            diff.detach.push(name);
        }
        for (name, entry) in &wanted {
            if !current.contains_key(name.as_str()) {
                diff.attach.push(entry.address.clone());
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.attach.is_empty() && self.detach.is_empty() && self.role_changes.is_empty()
    }

    /// Resolve names to current nodes and create attached nodes.
    ///
    /// Addresses the factory cannot build are skipped with a warning.
    pub fn into_change<N, F>(self, current: &[Arc<N>], factory: &F) -> MembershipChange<N>
    where
        N: Node + ?Sized,
        F: NodeFactory<N> + ?Sized,
    {
        let detach = current
            .iter()
            .filter(|n| self.detach.iter().any(|d| d == n.name()))
            .cloned()
            .collect();
        let attach = self
            .attach
            .iter()
            .filter_map(|address| match factory.create(address) {
                Ok(node) => Some(node),
                Err(err) => {
                    warn!(address = %address, error = %err, "cannot create node");
                    None
                }
            })
            .collect();
        MembershipChange::new(attach, detach).with_role_changes(self.role_changes)
    }
}
