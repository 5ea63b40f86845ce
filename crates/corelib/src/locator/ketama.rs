//! Live Ketama locator.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::configuration::KetamaConfiguration;
use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use crate::locator::sequence::{KetamaSequence, PointLookup};
use crate::locator::snapshot::KetamaSnapshot;
use crate::locator::NodeLocator;
use crate::node::Node;
use crate::registry::{LocatorStats, RegistryHandle};
use crate::ring::{KetamaRing, MigrationOverlay, MigrationType};

/// Ring state guarded by the locator lock.
#[derive(Debug)]
struct LocatorState<N: Node + ?Sized> {
    ring: KetamaRing<Arc<N>>,
    migration: Option<MigrationOverlay<Arc<N>>>,
    updates: u64,
}

/// Consistent hashing locator whose ring follows membership changes.
///
/// Every lookup and every mutation goes through one `RwLock`: lookups share
/// it, updates take it exclusively, so no lookup sees a half-applied update.
#[derive(Debug)]
pub struct KetamaNodeLocator<N: Node + ?Sized> {
    state: RwLock<LocatorState<N>>,
    hash_alg: HashAlgorithm,
    registry: Option<RegistryHandle>,
}

impl<N: Node + ?Sized> KetamaNodeLocator<N> {
    /// Build the ring from the initial node list.
    pub fn new(nodes: Vec<Arc<N>>, config: Arc<dyn KetamaConfiguration<Arc<N>>>) -> Result<Self> {
        let count = nodes.len();
        let ring = KetamaRing::build(nodes, config)?;
        info!(nodes = count, positions = ring.len(), "ketama locator created");
        Ok(Self {
            state: RwLock::new(LocatorState {
                ring,
                migration: None,
                updates: 0,
            }),
            hash_alg: HashAlgorithm::Ketama,
            registry: None,
        })
    }

    /// Hash keys with `hash_alg` instead of the Ketama hash.
    pub fn with_hash_algorithm(mut self, hash_alg: HashAlgorithm) -> Self {
        self.hash_alg = hash_alg;
        self
    }

    /// Publish stats to `registry` now and after every update.
    pub fn with_registry(mut self, registry: RegistryHandle) -> Self {
        registry.publish(Self::stats_of(&self.state.read()));
        self.registry = Some(registry);
        self
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_alg
    }

    pub fn node_count(&self) -> usize {
        self.state.read().ring.member_count()
    }

    pub fn stats(&self) -> LocatorStats {
        Self::stats_of(&self.state.read())
    }

    fn stats_of(state: &LocatorState<N>) -> LocatorStats {
        LocatorStats {
            kind: "ketama",
            nodes: state.ring.member_count(),
            groups: 0,
            ring_points: state.ring.len(),
            updates: state.updates,
        }
    }

    fn publish(&self, state: &LocatorState<N>) {
        if let Some(registry) = &self.registry {
            registry.publish(Self::stats_of(state));
        }
    }

    /// Start a migration window for `alter` nodes.
    pub fn prepare_migration(&self, alter: Vec<Arc<N>>, kind: MigrationType) -> Result<()> {
        let mut state = self.state.write();
        if state.migration.is_some() {
            return Err(Error::InvalidArgument("a migration is already in progress".into()));
        }
        let count = alter.len();
        state.migration = Some(MigrationOverlay::prepare(kind, alter, &state.ring)?);
        info!(?kind, nodes = count, "migration prepared");
        Ok(())
    }

    /// Mark the hash range `(start, end]` as migrated.
    ///
    /// Nodes that finished leaving are shut down once the lock is released.
    pub fn update_migration(&self, start: Option<u64>, end: u64) -> Result<()> {
        let mut left = Vec::new();
        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let overlay = state
                .migration
                .as_mut()
                .ok_or_else(|| Error::InvalidArgument("no migration in progress".into()))?;
            let finished = overlay.migrate_range(&mut state.ring, start, end);
            let kind = overlay.kind();
            debug!(?kind, ?start, end, finished = finished.len(), "migration range applied");
            if kind == MigrationType::Leave {
                left = finished;
            }
            if overlay.is_complete() {
                info!(?kind, "migration complete");
                state.migration = None;
            }
            state.updates += 1;
            self.publish(state);
        }
        for node in left {
            node.shutdown();
        }
        Ok(())
    }

    /// Direction of the running migration, if any.
    pub fn migration_type(&self) -> Option<MigrationType> {
        self.state.read().migration.as_ref().map(|m| m.kind())
    }

    /// Alter node called `name` in the running migration.
    pub fn alter_node(&self, name: &str) -> Option<Arc<N>> {
        self.state
            .read()
            .migration
            .as_ref()
            .and_then(|m| m.alter_member(name).cloned())
    }

    /// Node that owns `key` once the running migration completes.
    ///
    /// Without a migration this is the primary.
    pub fn migration_owner(&self, key: &str) -> Result<Arc<N>> {
        let hash = self.key_hash(key);
        let state = self.state.read();
        let owner = match &state.migration {
            Some(overlay) => overlay.owner(&state.ring, hash),
            None => state.ring.ceiling(hash).map(|(_, n)| n),
        };
        owner.cloned().ok_or(Error::NoNode)
    }

    fn key_hash(&self, key: &str) -> u64 {
        u64::from(self.hash_alg.hash(key) as u32)
    }
}

impl<'a, N: Node + ?Sized> PointLookup for &'a KetamaNodeLocator<N> {
    type Item = Arc<N>;

    fn lookup_point(&self, hash: u64) -> Option<Arc<N>> {
        self.state.read().ring.lookup(hash).ok().cloned()
    }
}

impl<N: Node + ?Sized> NodeLocator<N> for KetamaNodeLocator<N> {
    type Sequence<'a> = KetamaSequence<&'a KetamaNodeLocator<N>>
    where
        Self: 'a;
    type Snapshot = KetamaSnapshot<N>;

    fn primary(&self, key: &str) -> Result<Arc<N>> {
        let hash = self.key_hash(key);
        self.state.read().ring.lookup(hash).cloned()
    }

    fn sequence(&self, key: &str) -> Self::Sequence<'_> {
        let steps = self.node_count();
        KetamaSequence::new(self, self.hash_alg, key, steps)
    }

    fn all_nodes(&self) -> Vec<Arc<N>> {
        self.state.read().ring.members().cloned().collect()
    }

    fn snapshot(&self) -> KetamaSnapshot<N> {
        let state = self.state.read();
        KetamaSnapshot::new(state.ring.clone(), self.hash_alg)
    }

    fn update(&self, attach: Vec<Arc<N>>, detach: Vec<Arc<N>>) -> Result<()> {
        let mut removed = Vec::with_capacity(detach.len());
        {
            let mut state = self.state.write();
            for node in &detach {
                match state.ring.remove(node.name()) {
                    Some(node) => removed.push(node),
                    None => warn!(node = node.name(), "detach of unknown node ignored"),
                }
            }
            let mut attached = 0usize;
            for node in attach {
                let name = node.name().to_string();
                if state.ring.insert(node) {
                    attached += 1;
                } else {
                    warn!(node = %name, "attach of known node ignored");
                }
            }
            state.updates += 1;
            debug!(
                attached,
                detached = removed.len(),
                nodes = state.ring.member_count(),
                positions = state.ring.len(),
                "ketama locator updated"
            );
            self.publish(&state);
        }
        for node in removed {
            node.shutdown();
        }
        Ok(())
    }

    fn update_alter(&self, attach: Vec<Arc<N>>, detach: Vec<Arc<N>>) -> Result<()> {
        let mut removed = Vec::with_capacity(detach.len());
        let mut rejected = None;
        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let overlay = state
                .migration
                .as_mut()
                .ok_or_else(|| Error::InvalidArgument("no migration in progress".into()))?;
            for node in &detach {
                match overlay.detach(node.name(), &mut state.ring) {
                    Some(node) => removed.push(node),
                    None => warn!(node = node.name(), "detach of unknown alter node ignored"),
                }
            }
            for node in attach {
                let name = node.name().to_string();
                match overlay.attach(node, &state.ring) {
                    Ok(true) => {}
                    Ok(false) => warn!(node = %name, "attach of known alter node ignored"),
                    Err(err) => {
                        warn!(node = %name, error = %err, "alter node rejected");
                        if rejected.is_none() {
                            rejected = Some(err);
                        }
                    }
                }
            }
            if overlay.is_complete() {
                info!("migration window closed");
                state.migration = None;
            }
            state.updates += 1;
            debug!(
                detached = removed.len(),
                nodes = state.ring.member_count(),
                positions = state.ring.len(),
                "alter nodes updated"
            );
            self.publish(state);
        }
        for node in removed {
            node.shutdown();
        }
        rejected.map_or(Ok(()), Err)
    }
}

impl<N: Node + ?Sized> Drop for KetamaNodeLocator<N> {
    fn drop(&mut self) {
        if let Some(registry) = &self.registry {
            registry.unregister();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::DefaultKetamaConfiguration;
    use crate::node::SimpleNode;
    use crate::registry::LocatorRegistry;

    fn nodes(names: &[&str]) -> Vec<Arc<SimpleNode>> {
        names.iter().map(|n| Arc::new(SimpleNode::new(*n))).collect()
    }

    fn locator(names: &[&str]) -> KetamaNodeLocator<SimpleNode> {
        let config = Arc::new(DefaultKetamaConfiguration::new(40).unwrap());
        KetamaNodeLocator::new(nodes(names), config).unwrap()
    }

    #[test]
    fn test_update_detach_shuts_down() {
        let loc = locator(&["a", "b", "c"]);
        let b = loc.all_nodes().into_iter().find(|n| n.name() == "b").unwrap();
        loc.update(vec![], vec![b.clone()]).unwrap();
        assert!(b.is_shut_down());
        assert_eq!(loc.node_count(), 2);
        for i in 0..100 {
            assert_ne!(loc.primary(&format!("key{}", i)).unwrap().name(), "b");
        }
    }

    #[test]
    fn test_update_ignores_unknown_and_duplicates() {
        let loc = locator(&["a"]);
        let stranger = Arc::new(SimpleNode::new("z"));
        let dup = Arc::new(SimpleNode::new("a"));
        loc.update(vec![dup], vec![stranger.clone()]).unwrap();
        assert_eq!(loc.node_count(), 1);
        assert!(!stranger.is_shut_down());
    }

    #[test]
    fn test_registry_follows_updates() {
        let registry = LocatorRegistry::new();
        let loc = locator(&["a", "b"]).with_registry(RegistryHandle::new(registry.clone(), "main"));
        assert_eq!(registry.get("main").unwrap().nodes, 2);

        loc.update(nodes(&["c"]), vec![]).unwrap();
        let stats = registry.get("main").unwrap();
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.updates, 1);
        assert_eq!(stats, loc.stats());

        drop(loc);
        assert!(registry.get("main").is_none());
    }

    #[test]
    fn test_migration_requires_window() {
        let loc = locator(&["a"]);
        assert!(matches!(loc.update_migration(None, 10), Err(Error::InvalidArgument(_))));
        assert!(matches!(loc.update_alter(vec![], vec![]), Err(Error::InvalidArgument(_))));
        assert_eq!(loc.migration_type(), None);
    }

    #[test]
    fn test_join_migration_end_to_end() {
        let loc = locator(&["a", "b"]);
        let joining = nodes(&["c"]);
        loc.prepare_migration(joining.clone(), MigrationType::Join).unwrap();
        assert!(loc.alter_node("c").is_some());
        assert!(matches!(
            loc.prepare_migration(vec![], MigrationType::Leave),
            Err(Error::InvalidArgument(_))
        ));

        let target = locator(&["a", "b", "c"]);
        for i in 0..50 {
            let key = format!("key{}", i);
            assert_eq!(
                loc.migration_owner(&key).unwrap().name(),
                target.primary(&key).unwrap().name()
            );
        }

        loc.update_migration(None, u64::from(u32::MAX)).unwrap();
        assert_eq!(loc.migration_type(), None);
        assert_eq!(loc.node_count(), 3);
        for i in 0..50 {
            let key = format!("key{}", i);
            assert_eq!(loc.primary(&key).unwrap().name(), target.primary(&key).unwrap().name());
        }
    }

    #[test]
    fn test_leave_migration_shuts_down_when_done() {
        let loc = locator(&["a", "b", "c"]);
        let c = loc.all_nodes().into_iter().find(|n| n.name() == "c").unwrap();
        loc.prepare_migration(vec![c.clone()], MigrationType::Leave).unwrap();

        loc.update_migration(None, u64::from(u32::MAX / 2)).unwrap();
        assert!(!c.is_shut_down() || loc.node_count() == 2);
        loc.update_migration(Some(u64::from(u32::MAX / 2)), u64::from(u32::MAX)).unwrap();
        assert!(c.is_shut_down());
        assert_eq!(loc.node_count(), 2);
        assert_eq!(loc.migration_type(), None);
    }

    #[test]
    fn test_update_alter_adds_joining_node() {
        let loc = locator(&["a"]);
        loc.prepare_migration(nodes(&["b"]), MigrationType::Join).unwrap();
        loc.update_alter(nodes(&["c"]), vec![]).unwrap();
        assert!(loc.alter_node("c").is_some());

        let b = loc.alter_node("b").unwrap();
        let c = loc.alter_node("c").unwrap();
        loc.update_alter(vec![], vec![b, c]).unwrap();
        assert_eq!(loc.migration_type(), None);
        assert_eq!(loc.node_count(), 1);
    }
}
