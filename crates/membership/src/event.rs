//! Membership change events.

use std::fmt;
use std::sync::Arc;

use corelib::node::Node;
use replication::RoleChange;

/// One incremental membership change, applied atomically by a locator.
pub struct MembershipChange<N: Node + ?Sized> {
    pub attach: Vec<Arc<N>>,
    pub detach: Vec<Arc<N>>,
    pub role_changes: Vec<RoleChange>,
}

impl<N: Node + ?Sized> MembershipChange<N> {
    pub fn new(attach: Vec<Arc<N>>, detach: Vec<Arc<N>>) -> Self {
        Self {
            attach,
            detach,
            role_changes: Vec::new(),
        }
    }

    pub fn with_role_changes(mut self, role_changes: Vec<RoleChange>) -> Self {
        self.role_changes = role_changes;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.attach.is_empty() && self.detach.is_empty() && self.role_changes.is_empty()
    }
}

impl<N: Node + ?Sized> Default for MembershipChange<N> {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl<N: Node + ?Sized> fmt::Debug for MembershipChange<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |nodes: &[Arc<N>]| nodes.iter().map(|n| n.name().to_string()).collect::<Vec<_>>();
        f.debug_struct("MembershipChange")
            .field("attach", &names(&self.attach))
            .field("detach", &names(&self.detach))
            .field("role_changes", &self.role_changes)
            .finish()
    }
}
