//! Tests for the Ketama locator, its snapshots and failover sequences.

use std::collections::HashSet;
use std::sync::Arc;

use corelib::locator::{LocatorBuilder, NodeLocator};
use corelib::node::{Node, SimpleNode};
use corelib::{Error, KetamaNodeLocator, LocatorRegistry, MigrationType};

fn nodes(names: &[&str]) -> Vec<Arc<SimpleNode>> {
    names.iter().map(|n| Arc::new(SimpleNode::new(*n))).collect()
}

fn locator(names: &[&str]) -> KetamaNodeLocator<SimpleNode> {
    LocatorBuilder::new().add_nodes(nodes(names)).build().unwrap()
}

fn names(nodes: &[Arc<SimpleNode>]) -> HashSet<String> {
    nodes.iter().map(|n| n.name().to_string()).collect()
}

// ============================================================================
// Primary Lookup
// ============================================================================

#[test]
fn test_primary_is_deterministic() {
    let loc = locator(&["10.0.0.1:11211", "10.0.0.2:11211", "10.0.0.3:11211"]);
    for i in 0..100 {
        let key = format!("user:{}", i);
        let first = loc.primary(&key).unwrap();
        let second = loc.primary(&key).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}

#[test]
fn test_primary_on_empty_locator() {
    let loc = locator(&[]);
    assert_eq!(loc.primary("key").unwrap_err(), Error::NoNode);
    assert_eq!(loc.sequence("key").count(), 0);
    assert!(loc.all_nodes().is_empty());
}

#[test]
fn test_builder_rejects_bad_settings() {
    let result = LocatorBuilder::<SimpleNode>::new().with_repetitions(7).build();
    assert!(matches!(result, Err(Error::InvalidArgument(_))));

    let dup = LocatorBuilder::new().add_nodes(nodes(&["a", "a"])).build();
    assert!(matches!(dup, Err(Error::InvalidArgument(_))));
}

#[test]
fn test_only_moved_keys_change_owner() {
    let loc = locator(&["a", "b", "c"]);
    let keys: Vec<String> = (0..2_000).map(|i| format!("key{}", i)).collect();
    let before: Vec<String> = keys.iter().map(|k| loc.primary(k).unwrap().name().to_string()).collect();

    loc.update(nodes(&["d"]), vec![]).unwrap();

    for (key, old) in keys.iter().zip(&before) {
        let now = loc.primary(key).unwrap();
        assert!(now.name() == old || now.name() == "d", "{} moved from {} to {}", key, old, now.name());
    }
}

// ============================================================================
// Failover Sequences
// ============================================================================

#[test]
fn test_sequence_yields_node_count_elements() {
    let loc = locator(&["a", "b", "c", "d", "e"]);
    let mut seq = loc.sequence("some-key");
    for _ in 0..5 {
        assert!(seq.next().is_some());
    }
    assert!(seq.next().is_none());
    assert!(seq.next().is_none());
}

#[test]
fn test_sequence_starts_at_primary_and_is_restartable() {
    let loc = locator(&["a", "b", "c"]);
    let first: Vec<_> = loc.sequence("k").map(|n| n.name().to_string()).collect();
    let second: Vec<_> = loc.sequence("k").map(|n| n.name().to_string()).collect();
    assert_eq!(first, second);
    assert_eq!(first[0], loc.primary("k").unwrap().name());
}

#[test]
fn test_sequence_only_returns_members() {
    let loc = locator(&["a", "b", "c", "d"]);
    let members = names(&loc.all_nodes());
    for i in 0..50 {
        for node in loc.sequence(&format!("key{}", i)) {
            assert!(members.contains(node.name()));
        }
    }
}

// ============================================================================
// Snapshots
// ============================================================================

#[test]
fn test_snapshot_isolation() {
    let loc = locator(&["a", "b", "c"]);
    let snapshot = loc.snapshot();
    let keys: Vec<String> = (0..500).map(|i| format!("key{}", i)).collect();
    let before: Vec<String> = keys.iter().map(|k| snapshot.primary(k).unwrap().name().to_string()).collect();

    let b = loc.all_nodes().into_iter().find(|n| n.name() == "b").unwrap();
    loc.update(nodes(&["d", "e"]), vec![b]).unwrap();

    let after: Vec<String> = keys.iter().map(|k| snapshot.primary(k).unwrap().name().to_string()).collect();
    assert_eq!(before, after);
    assert_eq!(names(&snapshot.all_nodes()), names(&nodes(&["a", "b", "c"])));
    assert_eq!(snapshot.sequence("key").count(), 3);
}

#[test]
fn test_snapshot_rejects_mutation() {
    let loc = locator(&["a", "b"]);
    let snapshot = loc.snapshot();
    assert!(matches!(
        snapshot.update(nodes(&["c"]), vec![]),
        Err(Error::Unsupported(_))
    ));
    assert!(matches!(
        snapshot.update_alter(nodes(&["c"]), vec![]),
        Err(Error::Unsupported(_))
    ));
    assert!(matches!(
        snapshot.snapshot().update(vec![], vec![]),
        Err(Error::Unsupported(_))
    ));
}

#[test]
fn test_array_mod_locator_is_fixed() {
    let loc = LocatorBuilder::new()
        .add_nodes(nodes(&["a", "b", "c"]))
        .build_array_mod()
        .unwrap();
    assert_eq!(loc.sequence("key").count(), 2);
    assert!(matches!(loc.update(vec![], vec![]), Err(Error::Unsupported(_))));
}

// ============================================================================
// Migration
// ============================================================================

#[test]
fn test_leave_migration_moves_keys_to_survivors() {
    let loc = locator(&["a", "b", "c"]);
    let c = loc.all_nodes().into_iter().find(|n| n.name() == "c").unwrap();
    loc.prepare_migration(vec![c.clone()], MigrationType::Leave).unwrap();

    for i in 0..100 {
        let owner = loc.migration_owner(&format!("key{}", i)).unwrap();
        assert_ne!(owner.name(), "c");
    }

    loc.update_migration(None, u64::from(u32::MAX)).unwrap();
    assert!(c.is_shut_down());
    assert_eq!(names(&loc.all_nodes()), names(&nodes(&["a", "b"])));
}

#[test]
fn test_detaching_leaving_node_mid_migration_completes_leave() {
    let loc = LocatorBuilder::new()
        .with_repetitions(40)
        .add_nodes(nodes(&["a", "b", "c"]))
        .build()
        .unwrap();
    let survivors = LocatorBuilder::new()
        .with_repetitions(40)
        .add_nodes(nodes(&["a", "b"]))
        .build()
        .unwrap();
    let c = loc.all_nodes().into_iter().find(|n| n.name() == "c").unwrap();
    loc.prepare_migration(vec![c.clone()], MigrationType::Leave).unwrap();
    loc.update_migration(None, u64::from(u32::MAX / 2)).unwrap();
    assert!(!c.is_shut_down());

    loc.update_alter(vec![], vec![c.clone()]).unwrap();

    assert!(c.is_shut_down());
    assert_eq!(loc.migration_type(), None);
    assert_eq!(names(&loc.all_nodes()), names(&nodes(&["a", "b"])));
    assert_eq!(loc.stats().ring_points, survivors.stats().ring_points);
    for i in 0..200 {
        let key = format!("key{}", i);
        assert_eq!(loc.primary(&key).unwrap().name(), survivors.primary(&key).unwrap().name());
    }
}

#[test]
fn test_detaching_joining_node_mid_migration_shuts_it_down() {
    let loc = locator(&["a", "b"]);
    let before = loc.stats().ring_points;
    let d = Arc::new(SimpleNode::new("d"));
    loc.prepare_migration(vec![d.clone()], MigrationType::Join).unwrap();
    loc.update_migration(None, u64::from(u32::MAX / 2)).unwrap();

    loc.update_alter(vec![], vec![d.clone()]).unwrap();

    assert!(d.is_shut_down());
    assert_eq!(loc.migration_type(), None);
    assert_eq!(loc.node_count(), 2);
    assert_eq!(loc.stats().ring_points, before);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_lookups_during_updates() {
    let registry = LocatorRegistry::new();
    let loc = LocatorBuilder::new()
        .with_registry(registry.clone(), "concurrent")
        .add_nodes(nodes(&["a", "b", "c"]))
        .build()
        .unwrap();
    let stable = names(&nodes(&["a", "b", "c", "x"]));

    crossbeam::thread::scope(|s| {
        for t in 0..4 {
            let loc = &loc;
            let stable = &stable;
            s.spawn(move |_| {
                for i in 0..2_000 {
                    let key = format!("t{}-{}", t, i);
                    let node = loc.primary(&key).unwrap();
                    assert!(stable.contains(node.name()));
                    assert!(loc.sequence(&key).count() <= 4);
                }
            });
        }
        s.spawn(|_| {
            for _ in 0..200 {
                let x = nodes(&["x"]);
                loc.update(x.clone(), vec![]).unwrap();
                loc.update(vec![], x).unwrap();
            }
        });
    })
    .unwrap();

    assert_eq!(loc.node_count(), 3);
    assert_eq!(registry.get("concurrent").unwrap().updates, 400);
}
