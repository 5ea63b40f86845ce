//! Replica-aware Ketama locator.
//!
//! The ring is keyed by replica group name: a key resolves to a group, then
//! the group's pick policy resolves it to a node. Role changes only move the
//! group's internal master pointer, so they never touch ring positions.

use std::collections::BTreeMap;
use std::sync::Arc;

use corelib::configuration::KetamaConfiguration;
use corelib::locator::{KetamaSequence, NodeLocator, PointLookup};
use corelib::node::Node;
use corelib::registry::{LocatorStats, RegistryHandle};
use corelib::ring::KetamaRing;
use corelib::vnode::RingMember;
use corelib::{Error, HashAlgorithm, LocatorConfig, Result};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::group::{group_of, ReplicaGroup};
use crate::pick::ReplicaPick;
use crate::role::RoleChange;
use crate::snapshot::ReplicaLocatorSnapshot;

/// Ring member standing for a replica group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupName(Arc<str>);

impl GroupName {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RingMember for GroupName {
    fn ring_name(&self) -> &str {
        &self.0
    }
}

/// Ring, groups and nodes, guarded together by the locator lock.
pub(crate) struct ReplicaState<N: Node + ?Sized> {
    pub(crate) ring: KetamaRing<GroupName>,
    pub(crate) groups: BTreeMap<String, ReplicaGroup<N>>,
    pub(crate) nodes: BTreeMap<String, Arc<N>>,
    updates: u64,
}

impl<N: Node + ?Sized> ReplicaState<N> {
    fn stats(&self) -> LocatorStats {
        LocatorStats {
            kind: "replica_ketama",
            nodes: self.nodes.len(),
            groups: self.groups.len(),
            ring_points: self.ring.len(),
            updates: self.updates,
        }
    }
}

/// Resolve a ring position to a node through the owning group.
pub(crate) fn resolve<N: Node + ?Sized>(
    ring: &KetamaRing<GroupName>,
    groups: &BTreeMap<String, ReplicaGroup<N>>,
    hash: u64,
    policy: ReplicaPick,
) -> Result<Arc<N>> {
    let group_name = ring.lookup(hash)?;
    let group = groups.get(group_name.as_str()).ok_or_else(|| {
        Error::InvariantViolation(format!("ring names unknown group {}", group_name.as_str()))
    })?;
    group.pick(policy).ok_or_else(|| Error::NoMaster {
        group: group.name().to_string(),
    })
}

/// Consistent hashing over replica groups with live membership updates.
///
/// One `RwLock` guards ring, groups and node map. Lookups share it; updates
/// and role changes hold it exclusively for the whole
/// delete, role change, attach, prune pass.
pub struct ReplicaKetamaNodeLocator<N: Node + ?Sized> {
    state: RwLock<ReplicaState<N>>,
    hash_alg: HashAlgorithm,
    max_group_size: usize,
    registry: Option<RegistryHandle>,
}

impl<N: Node + ?Sized> ReplicaKetamaNodeLocator<N> {
    /// Group the initial nodes and build the ring over group names.
    ///
    /// Every node needs a replica address; duplicates, a second master in a
    /// group or an overfull group are rejected.
    pub fn new(
        nodes: Vec<Arc<N>>,
        configuration: Arc<dyn KetamaConfiguration<GroupName>>,
        max_group_size: usize,
    ) -> Result<Self> {
        if max_group_size < 2 {
            return Err(Error::InvalidArgument(format!(
                "replica group size must be at least 2, got {}",
                max_group_size
            )));
        }
        let mut groups: BTreeMap<String, ReplicaGroup<N>> = BTreeMap::new();
        let mut by_name = BTreeMap::new();
        for node in nodes {
            let group_name = group_of(node.as_ref())?.to_string();
            if by_name.contains_key(node.name()) {
                return Err(Error::InvalidArgument(format!("duplicate node {}", node.name())));
            }
            let accepted = match groups.get_mut(&group_name) {
                Some(group) => group.add_member(Arc::clone(&node))?,
                None => {
                    groups.insert(
                        group_name.clone(),
                        ReplicaGroup::from_node(Arc::clone(&node), max_group_size)?,
                    );
                    true
                }
            };
            if !accepted {
                return Err(Error::InvalidArgument(format!(
                    "node {} rejected by replica group {}",
                    node.name(),
                    group_name
                )));
            }
            by_name.insert(node.name().to_string(), node);
        }
        let ring = KetamaRing::build(groups.keys().map(|g| GroupName::new(g)), configuration)?;
        info!(
            nodes = by_name.len(),
            groups = groups.len(),
            positions = ring.len(),
            "replica ketama locator created"
        );
        Ok(Self {
            state: RwLock::new(ReplicaState {
                ring,
                groups,
                nodes: by_name,
                updates: 0,
            }),
            hash_alg: HashAlgorithm::Ketama,
            max_group_size,
            registry: None,
        })
    }

    /// Build from serializable settings.
    pub fn from_config(nodes: Vec<Arc<N>>, config: &LocatorConfig) -> Result<Self> {
        config.validate()?;
        let configuration = Arc::new(config.ketama_configuration()?);
        Ok(Self::new(nodes, configuration, config.max_group_size)?.with_hash_algorithm(config.hash))
    }

    pub fn with_hash_algorithm(mut self, hash_alg: HashAlgorithm) -> Self {
        self.hash_alg = hash_alg;
        self
    }

    /// Publish stats to `registry` now and after every update.
    pub fn with_registry(mut self, registry: RegistryHandle) -> Self {
        registry.publish(self.state.read().stats());
        self.registry = Some(registry);
        self
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_alg
    }

    fn key_hash(&self, key: &str) -> u64 {
        u64::from(self.hash_alg.hash(key) as u32)
    }

    /// Node for `key` under an explicit pick policy.
    pub fn primary_with(&self, key: &str, policy: ReplicaPick) -> Result<Arc<N>> {
        let hash = self.key_hash(key);
        let state = self.state.read();
        resolve(&state.ring, &state.groups, hash, policy)
    }

    /// Failover walk over groups, each resolved with `policy`.
    ///
    /// The walk takes one step per group. A step landing on a group that
    /// cannot serve `policy` (no master under [`ReplicaPick::Master`]) is
    /// skipped but still counted, so fewer items than groups may come out.
    pub fn sequence_with(&self, key: &str, policy: ReplicaPick) -> KetamaSequence<PolicyLookup<'_, N>> {
        let steps = self.group_count();
        KetamaSequence::new(PolicyLookup { locator: self, policy }, self.hash_alg, key, steps)
    }

    /// Read-only copy of the group owning `key`.
    pub fn group_for_key(&self, key: &str) -> Result<ReplicaGroup<N>> {
        let hash = self.key_hash(key);
        let state = self.state.read();
        let name = state.ring.lookup(hash)?;
        state
            .groups
            .get(name.as_str())
            .map(ReplicaGroup::read_only_copy)
            .ok_or_else(|| Error::InvariantViolation(format!("ring names unknown group {}", name.as_str())))
    }

    /// Read-only copy of the group called `name`.
    pub fn group(&self, name: &str) -> Option<ReplicaGroup<N>> {
        self.state.read().groups.get(name).map(ReplicaGroup::read_only_copy)
    }

    /// Read-only copies of every group, ordered by name.
    pub fn all_groups(&self) -> Vec<ReplicaGroup<N>> {
        self.state
            .read()
            .groups
            .values()
            .map(ReplicaGroup::read_only_copy)
            .collect()
    }

    pub fn group_count(&self) -> usize {
        self.state.read().groups.len()
    }

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn stats(&self) -> LocatorStats {
        self.state.read().stats()
    }

    /// Apply a membership change in the fixed order: delete, role change,
    /// attach, prune.
    ///
    /// Only groups created by this update get new ring positions. Rejected
    /// entries are logged and skipped; the pass always completes. Removed
    /// nodes are shut down after the lock is released.
    pub fn update_with_roles(
        &self,
        attach: Vec<Arc<N>>,
        detach: Vec<Arc<N>>,
        role_changes: Vec<RoleChange>,
    ) -> Result<()> {
        for node in &attach {
            group_of(node.as_ref())?;
        }

        let mut removed = Vec::with_capacity(detach.len());
        {
            let mut guard = self.state.write();
            let state = &mut *guard;

            // 1. deletions
            for node in &detach {
                let Some(existing) = state.nodes.remove(node.name()) else {
                    warn!(node = node.name(), "detach of unknown node ignored");
                    continue;
                };
                let removed_from_group = existing
                    .replica()
                    .and_then(|r| state.groups.get_mut(r.group()))
                    .map_or(false, |g| matches!(g.remove_member(existing.name()), Ok(true)));
                if !removed_from_group {
                    warn!(node = existing.name(), "detached node was not in its group");
                }
                removed.push(existing);
            }

            // 2. role changes
            let mut switched = 0usize;
            for change in &role_changes {
                let Some(group) = state.groups.get_mut(&change.group) else {
                    warn!(%change, "role change for unknown group ignored");
                    continue;
                };
                if !matches!(group.set_master_candidate(&change.new_master), Ok(true)) {
                    warn!(%change, "role change candidate is not a slave, ignored");
                    continue;
                }
                if matches!(group.change_role(), Ok(true)) {
                    switched += 1;
                }
            }

            // 3. attachments
            let mut attached = 0usize;
            for node in attach {
                if state.nodes.contains_key(node.name()) {
                    warn!(node = node.name(), "attach of known node ignored");
                    continue;
                }
                let Some(group_name) = node.replica().map(|r| r.group().to_string()) else {
                    continue;
                };
                let accepted = match state.groups.get_mut(&group_name) {
                    Some(group) => matches!(group.add_member(Arc::clone(&node)), Ok(true)),
                    None => match ReplicaGroup::from_node(Arc::clone(&node), self.max_group_size) {
                        Ok(group) => {
                            state.ring.insert(GroupName::new(&group_name));
                            state.groups.insert(group_name.clone(), group);
                            true
                        }
                        Err(err) => {
                            warn!(node = node.name(), error = %err, "cannot create replica group");
                            false
                        }
                    },
                };
                if accepted {
                    state.nodes.insert(node.name().to_string(), node);
                    attached += 1;
                } else {
                    warn!(node = node.name(), group = %group_name, "attach rejected by replica group");
                }
            }

            // 4. prune empty groups
            let empty: Vec<String> = state
                .groups
                .iter()
                .filter(|(_, g)| g.is_empty_group())
                .map(|(name, _)| name.clone())
                .collect();
            for name in &empty {
                state.ring.remove(name);
                state.groups.remove(name);
            }

            debug_assert_eq!(state.ring.member_count(), state.groups.len());
            state.updates += 1;
            debug!(
                attached,
                detached = removed.len(),
                switched,
                pruned = empty.len(),
                groups = state.groups.len(),
                "replica locator updated"
            );
            if let Some(registry) = &self.registry {
                registry.publish(state.stats());
            }
        }
        for node in removed {
            node.shutdown();
        }
        Ok(())
    }

    /// Switch the master of `group` to its slave `new_master`.
    pub fn change_role(&self, group: &str, new_master: &str) -> Result<bool> {
        let mut state = self.state.write();
        let target = state
            .groups
            .get_mut(group)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown replica group {}", group)))?;
        if !target.set_master_candidate(new_master)? {
            return Ok(false);
        }
        let changed = target.change_role()?;
        if changed {
            state.updates += 1;
            if let Some(registry) = &self.registry {
                registry.publish(state.stats());
            }
        }
        Ok(changed)
    }
}

/// A live locator paired with a pick policy, looked up one point at a time.
pub struct PolicyLookup<'a, N: Node + ?Sized> {
    locator: &'a ReplicaKetamaNodeLocator<N>,
    policy: ReplicaPick,
}

impl<'a, N: Node + ?Sized> PointLookup for PolicyLookup<'a, N> {
    type Item = Arc<N>;

    fn lookup_point(&self, hash: u64) -> Option<Arc<N>> {
        let state = self.locator.state.read();
        resolve(&state.ring, &state.groups, hash, self.policy).ok()
    }
}

impl<N: Node + ?Sized> NodeLocator<N> for ReplicaKetamaNodeLocator<N> {
    type Sequence<'a> = KetamaSequence<PolicyLookup<'a, N>>
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
        self.state.read().nodes.values().cloned().collect()
    }

    fn snapshot(&self) -> ReplicaLocatorSnapshot<N> {
        let state = self.state.read();
        ReplicaLocatorSnapshot::new(
            state.ring.clone(),
            state
                .groups
                .iter()
                .map(|(name, group)| (name.clone(), group.read_only_copy()))
                .collect(),
            state.nodes.clone(),
            self.hash_alg,
        )
    }

    fn update(&self, attach: Vec<Arc<N>>, detach: Vec<Arc<N>>) -> Result<()> {
        self.update_with_roles(attach, detach, Vec::new())
    }
}

impl<N: Node + ?Sized> Drop for ReplicaKetamaNodeLocator<N> {
    fn drop(&mut self) {
        if let Some(registry) = &self.registry {
            registry.unregister();
        }
    }
}
