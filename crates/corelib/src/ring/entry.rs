//! Ring entries: the members sharing one ring position.

use crate::configuration::KetamaConfiguration;
use crate::vnode::RingMember;

/// Members colliding on one ring position, kept sorted by the configuration's
/// comparator so reads are deterministic whatever the insertion order.
///
/// An entry stored in a ring is never empty.
#[derive(Clone, Debug)]
pub struct RingEntry<M> {
    members: Vec<M>,
}

impl<M: RingMember> RingEntry<M> {
    pub(crate) fn new() -> Self {
        // collisions are rare, one slot is the common case
        Self {
            members: Vec::with_capacity(1),
        }
    }

    /// Add a member, returning `false` if a member with the same name is present.
    pub(crate) fn insert<C>(&mut self, member: M, config: &C) -> bool
    where
        C: KetamaConfiguration<M> + ?Sized,
    {
        if self.contains(member.ring_name()) {
            return false;
        }
        let idx = self
            .members
            .partition_point(|m| config.compare(m, &member).is_lt());
        self.members.insert(idx, member);
        true
    }

    /// Remove the member called `name`, returning `true` if it was present.
    pub(crate) fn remove(&mut self, name: &str) -> bool {
        match self.members.iter().position(|m| m.ring_name() == name) {
            Some(idx) => {
                self.members.remove(idx);
                true
            }
            None => false,
        }
    }

    /// The member that serves this position.
    pub fn first(&self) -> Option<&M> {
        self.members.first()
    }

    /// First member accepted by `accept`, in comparator order.
    pub fn first_where(&self, accept: impl Fn(&M) -> bool) -> Option<&M> {
        self.members.iter().find(|m| accept(m))
    }

    pub fn members(&self) -> &[M] {
        &self.members
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m.ring_name() == name)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::DefaultKetamaConfiguration;
    use crate::node::{Node, SimpleNode};
    use std::sync::Arc;

    #[test]
    fn test_collision_order_is_insertion_independent() {
        let config = DefaultKetamaConfiguration::new(4).unwrap();
        let a = Arc::new(SimpleNode::new("a"));
        let b = Arc::new(SimpleNode::new("b"));

        let mut first = RingEntry::new();
        first.insert(b.clone(), &config);
        first.insert(a.clone(), &config);

        let mut second = RingEntry::new();
        second.insert(a, &config);
        second.insert(b, &config);

        assert_eq!(first.first().unwrap().name(), "a");
        assert_eq!(second.first().unwrap().name(), "a");
    }

    #[test]
    fn test_duplicate_and_remove() {
        let config = DefaultKetamaConfiguration::new(4).unwrap();
        let a = Arc::new(SimpleNode::new("a"));
        let mut entry = RingEntry::new();
        assert!(entry.insert(a.clone(), &config));
        assert!(!entry.insert(a, &config));
        assert_eq!(entry.len(), 1);
        assert!(entry.remove("a"));
        assert!(!entry.remove("a"));
        assert!(entry.is_empty());
    }
}
