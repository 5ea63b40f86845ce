//! Read-only copies of a replica locator.

use std::collections::BTreeMap;
use std::sync::Arc;

use corelib::locator::{KetamaSequence, NodeLocator, PointLookup};
use corelib::node::Node;
use corelib::ring::KetamaRing;
use corelib::{Error, HashAlgorithm, Result};

use crate::group::ReplicaGroup;
use crate::locator::{resolve, GroupName};
use crate::pick::ReplicaPick;

/// Ring and groups copied out of a live replica locator.
///
/// Groups are read-only copies, so role changes and membership edits fail
/// with [`Error::Unsupported`]. Picks still work and keep their own
/// round-robin state.
#[derive(Debug)]
pub struct ReplicaLocatorSnapshot<N: Node + ?Sized> {
    ring: KetamaRing<GroupName>,
    groups: BTreeMap<String, ReplicaGroup<N>>,
    nodes: BTreeMap<String, Arc<N>>,
    hash_alg: HashAlgorithm,
}

impl<N: Node + ?Sized> ReplicaLocatorSnapshot<N> {
    pub(crate) fn new(
        ring: KetamaRing<GroupName>,
        groups: BTreeMap<String, ReplicaGroup<N>>,
        nodes: BTreeMap<String, Arc<N>>,
        hash_alg: HashAlgorithm,
    ) -> Self {
        Self {
            ring,
            groups,
            nodes,
            hash_alg,
        }
    }

    fn key_hash(&self, key: &str) -> u64 {
        u64::from(self.hash_alg.hash(key) as u32)
    }

    pub fn primary_with(&self, key: &str, policy: ReplicaPick) -> Result<Arc<N>> {
        resolve(&self.ring, &self.groups, self.key_hash(key), policy)
    }

    /// Same walk as [`crate::ReplicaKetamaNodeLocator::sequence_with`]; unresolvable
    /// steps are skipped and still counted.
    pub fn sequence_with(&self, key: &str, policy: ReplicaPick) -> KetamaSequence<SnapshotLookup<'_, N>> {
        KetamaSequence::new(
            SnapshotLookup { snapshot: self, policy },
            self.hash_alg,
            key,
            self.groups.len(),
        )
    }

    pub fn group(&self, name: &str) -> Option<&ReplicaGroup<N>> {
        self.groups.get(name)
    }

    pub fn groups(&self) -> impl Iterator<Item = &ReplicaGroup<N>> {
        self.groups.values()
    }

    pub fn ring(&self) -> &KetamaRing<GroupName> {
        &self.ring
    }

    /// Role changes are never applied to a snapshot.
    pub fn change_role(&self, _group: &str, _new_master: &str) -> Result<bool> {
        Err(Error::Unsupported("change_role on read-only locator"))
    }
}

impl<N: Node + ?Sized> Clone for ReplicaLocatorSnapshot<N> {
    fn clone(&self) -> Self {
        Self {
            ring: self.ring.clone(),
            groups: self
                .groups
                .iter()
                .map(|(name, group)| (name.clone(), group.read_only_copy()))
                .collect(),
            nodes: self.nodes.clone(),
            hash_alg: self.hash_alg,
        }
    }
}

pub struct SnapshotLookup<'a, N: Node + ?Sized> {
    snapshot: &'a ReplicaLocatorSnapshot<N>,
    policy: ReplicaPick,
}

impl<'a, N: Node + ?Sized> PointLookup for SnapshotLookup<'a, N> {
    type Item = Arc<N>;

    fn lookup_point(&self, hash: u64) -> Option<Arc<N>> {
        resolve(&self.snapshot.ring, &self.snapshot.groups, hash, self.policy).ok()
    }
}

impl<N: Node + ?Sized> NodeLocator<N> for ReplicaLocatorSnapshot<N> {
    type Sequence<'a> = KetamaSequence<SnapshotLookup<'a, N>>
    where
        Self: 'a;
    type Snapshot = ReplicaLocatorSnapshot<N>;

    fn primary(&self, key: &str) -> Result<Arc<N>> {
        self.primary_with(key, ReplicaPick::Master)
    }

    fn sequence(&self, key: &str) -> Self::Sequence<'_> {
        self.sequence_with(key, ReplicaPick::Master)
    }

    fn all_nodes(&self) -> Vec<Arc<N>> {
        self.nodes.values().cloned().collect()
    }

    fn snapshot(&self) -> Self::Snapshot {
        self.clone()
    }

    fn update(&self, _attach: Vec<Arc<N>>, _detach: Vec<Arc<N>>) -> Result<()> {
        Err(Error::Unsupported("update on read-only locator"))
    }

    fn update_alter(&self, _attach: Vec<Arc<N>>, _detach: Vec<Arc<N>>) -> Result<()> {
        Err(Error::Unsupported("update_alter on read-only locator"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::ReplicaKetamaNodeLocator;
    use corelib::{DefaultKetamaConfiguration, SimpleNode};

    fn locator() -> ReplicaKetamaNodeLocator<SimpleNode> {
        let nodes = ["g1^M^10.0.0.1:11211", "g1^S^10.0.0.2:11211", "g2^M^10.0.0.3:11211"]
            .iter()
            .map(|a| SimpleNode::from_address(a).unwrap())
            .collect();
        ReplicaKetamaNodeLocator::new(nodes, Arc::new(DefaultKetamaConfiguration::default()), 4).unwrap()
    }

    #[test]
    fn test_snapshot_rejects_mutation() {
        let snap = locator().snapshot();
        assert!(matches!(snap.update(vec![], vec![]), Err(Error::Unsupported(_))));
        assert!(matches!(snap.update_alter(vec![], vec![]), Err(Error::Unsupported(_))));
        assert!(matches!(snap.change_role("g1", "10.0.0.2:11211"), Err(Error::Unsupported(_))));
        assert!(snap.groups().all(|g| g.is_read_only()));
    }

    #[test]
    fn test_snapshot_matches_live_primary() {
        let loc = locator();
        let snap = loc.snapshot();
        for i in 0..200 {
            let key = format!("key-{i}");
            assert_eq!(loc.primary(&key).unwrap().name(), snap.primary(&key).unwrap().name());
        }
        assert_eq!(snap.all_nodes().len(), 3);
    }
}
