//! Property-based tests for the Ketama ring using proptest.

use std::collections::BTreeSet;
use std::sync::Arc;

use corelib::configuration::{DefaultKetamaConfiguration, KetamaConfiguration};
use corelib::node::{Node, SimpleNode};
use corelib::ring::KetamaRing;
use proptest::prelude::*;

type Ring = KetamaRing<Arc<SimpleNode>>;

fn ring_of(names: &BTreeSet<String>, repetitions: usize) -> Ring {
    let config: Arc<dyn KetamaConfiguration<Arc<SimpleNode>>> =
        Arc::new(DefaultKetamaConfiguration::new(repetitions).unwrap());
    KetamaRing::build(names.iter().map(|n| Arc::new(SimpleNode::new(n.clone()))), config).unwrap()
}

fn layout(ring: &Ring) -> Vec<(u64, Vec<String>)> {
    ring.entries()
        .map(|(p, e)| (p, e.members().iter().map(|m| m.name().to_string()).collect()))
        .collect()
}

/// Generator for small sets of node addresses.
fn any_node_names() -> impl Strategy<Value = BTreeSet<String>> {
    proptest::collection::btree_set("[a-z]{1,6}:[0-9]{2,5}", 1..8)
}

/// Generator for valid repetition counts.
fn any_repetitions() -> impl Strategy<Value = usize> {
    (1usize..=40).prop_map(|n| n * 4)
}

proptest! {
    /// Every lookup lands on a current member.
    #[test]
    fn test_lookup_coverage(names in any_node_names(), reps in any_repetitions(), hashes in proptest::collection::vec(any::<u32>(), 1..50)) {
        let ring = ring_of(&names, reps);
        for hash in hashes {
            let node = ring.lookup(u64::from(hash)).unwrap();
            prop_assert!(names.contains(node.name()));
        }
    }

    /// Inserting then removing a node leaves the ring exactly as it was.
    #[test]
    fn test_insert_remove_symmetry(names in any_node_names(), extra in "[A-Z]{1,6}:[0-9]{2,5}", reps in any_repetitions()) {
        let mut ring = ring_of(&names, reps);
        let before = layout(&ring);
        prop_assert!(ring.insert(Arc::new(SimpleNode::new(extra.clone()))));
        prop_assert!(ring.remove(&extra).is_some());
        prop_assert_eq!(layout(&ring), before);
    }

    /// After any insert/remove sequence the ring stays within its size bound
    /// and has no empty entries.
    #[test]
    fn test_size_invariant(ops in proptest::collection::vec((any::<bool>(), 0u8..6), 1..40), reps in any_repetitions()) {
        let mut ring = ring_of(&BTreeSet::new(), reps);
        for (insert, id) in ops {
            let name = format!("node{}", id);
            if insert {
                ring.insert(Arc::new(SimpleNode::new(name)));
            } else {
                ring.remove(&name);
            }
            prop_assert!(ring.len() <= reps / 4 * 4 * ring.member_count());
            prop_assert!(ring.entries().all(|(_, e)| !e.is_empty()));
        }
    }
}
