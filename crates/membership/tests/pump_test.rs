//! End-to-end tests: source reports flow through the diff and apply loop.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use corelib::locator::{LocatorBuilder, NodeLocator};
use corelib::node::{Node, SimpleNode};
use corelib::{DefaultKetamaConfiguration, LocatorRegistry};
use membership::{pump, MembershipApplier, MembershipError, MembershipSource};
use replication::{ReplicaKetamaNodeLocator, ReplicaPick};

/// Replays a fixed list of reports, then closes.
struct ScriptedSource {
    reports: VecDeque<Vec<String>>,
    fail_at_end: bool,
}

impl ScriptedSource {
    fn new(reports: &[&[&str]]) -> Self {
        Self {
            reports: reports
                .iter()
                .map(|r| r.iter().map(|a| a.to_string()).collect())
                .collect(),
            fail_at_end: false,
        }
    }
}

#[async_trait]
impl MembershipSource for ScriptedSource {
    async fn next_nodes(&mut self) -> membership::Result<Option<Vec<String>>> {
        match self.reports.pop_front() {
            Some(report) => Ok(Some(report)),
            None if self.fail_at_end => Err(MembershipError::Source("session expired".into())),
            None => Ok(None),
        }
    }
}

fn names<N: Node + ?Sized>(nodes: &[Arc<N>]) -> Vec<String> {
    let mut names: Vec<String> = nodes.iter().map(|n| n.name().to_string()).collect();
    names.sort();
    names
}

// ============================================================================
// Plain Ketama Locator
// ============================================================================

#[tokio::test]
async fn test_reports_drive_ketama_locator() {
    let registry = LocatorRegistry::new();
    let locator = Arc::new(
        LocatorBuilder::<SimpleNode>::new()
            .with_registry(registry.clone(), "cache")
            .build()
            .unwrap(),
    );
    let (handle, task) = MembershipApplier::spawn(locator.clone(), 4);

    let mut source = ScriptedSource::new(&[
        &["a:11211", "b:11211"],
        &["a:11211", "b:11211"],
        &["b:11211", "c:11211"],
    ]);
    let applied = pump(&mut source, &SimpleNode::from_address, &handle).await.unwrap();
    assert_eq!(applied, 2);
    assert_eq!(names(&locator.all_nodes()), vec!["b:11211", "c:11211"]);
    assert_eq!(registry.get("cache").unwrap().updates, 2);

    handle.shutdown().await.unwrap();
    assert_eq!(task.await.unwrap().applied, 2);
}

#[tokio::test]
async fn test_source_error_stops_pump() {
    let locator = Arc::new(LocatorBuilder::<SimpleNode>::new().build().unwrap());
    let (handle, _task) = MembershipApplier::spawn(locator.clone(), 4);

    let mut source = ScriptedSource::new(&[&["a:11211"]]);
    source.fail_at_end = true;
    let err = pump(&mut source, &SimpleNode::from_address, &handle).await.unwrap_err();
    assert_eq!(err, MembershipError::Source("session expired".into()));
    assert_eq!(locator.all_nodes().len(), 1);
}

// ============================================================================
// Replica Locator
// ============================================================================

#[tokio::test]
async fn test_reports_drive_replica_switchover() {
    let locator = Arc::new(
        ReplicaKetamaNodeLocator::<SimpleNode>::new(
            vec![],
            Arc::new(DefaultKetamaConfiguration::default()),
            4,
        )
        .unwrap(),
    );
    let (handle, _task) = MembershipApplier::spawn(locator.clone(), 4);

    let mut source = ScriptedSource::new(&[
        &["g1^M^10.0.0.1:11211", "g1^S^10.0.0.2:11211"],
        &["g1^S^10.0.0.1:11211", "g1^M^10.0.0.2:11211"],
    ]);
    let applied = pump(&mut source, &SimpleNode::from_address, &handle).await.unwrap();
    assert_eq!(applied, 2);

    let group = locator.group("g1").unwrap();
    assert_eq!(group.master().unwrap().name(), "10.0.0.2:11211");
    assert_eq!(names(group.slaves()), vec!["10.0.0.1:11211"]);
    assert_eq!(locator.primary_with("key", ReplicaPick::Master).unwrap().name(), "10.0.0.2:11211");
    // the demoted master kept its connection
    assert!(locator.all_nodes().iter().all(|n| !n.is_shut_down()));
}

#[tokio::test]
async fn test_master_replacement_in_one_report() {
    let locator = Arc::new(
        ReplicaKetamaNodeLocator::<SimpleNode>::new(
            vec![],
            Arc::new(DefaultKetamaConfiguration::default()),
            4,
        )
        .unwrap(),
    );
    let (handle, _task) = MembershipApplier::spawn(locator.clone(), 4);

    let mut source = ScriptedSource::new(&[
        &["g1^M^10.0.0.1:11211", "g1^S^10.0.0.2:11211"],
        &["g1^M^10.0.0.3:11211", "g1^S^10.0.0.2:11211"],
    ]);
    pump(&mut source, &SimpleNode::from_address, &handle).await.unwrap();

    let group = locator.group("g1").unwrap();
    assert_eq!(group.master().unwrap().name(), "10.0.0.3:11211");
    assert_eq!(locator.node_count(), 2);
}
