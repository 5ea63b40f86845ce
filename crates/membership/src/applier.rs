//! Bounded-channel apply loop.
//!
//! Every change goes through one task, so a locator sees changes in the
//! order they were submitted and never two at once.

use std::sync::Arc;

use corelib::locator::NodeLocator;
use corelib::node::Node;
use corelib::KetamaNodeLocator;
use replication::ReplicaKetamaNodeLocator;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{MembershipError, Result};
use crate::event::MembershipChange;

/// A locator that accepts membership changes.
pub trait ApplyMembership<N: Node + ?Sized>: Send + Sync + 'static {
    fn apply_change(&self, change: MembershipChange<N>) -> corelib::Result<()>;

    /// Nodes currently known to the target.
    fn current_nodes(&self) -> Vec<Arc<N>>;
}

impl<N: Node + ?Sized> ApplyMembership<N> for KetamaNodeLocator<N> {
    fn apply_change(&self, change: MembershipChange<N>) -> corelib::Result<()> {
        if !change.role_changes.is_empty() {
            warn!(
                count = change.role_changes.len(),
                "role changes ignored by a locator without replica groups"
            );
        }
        self.update(change.attach, change.detach)
    }

    fn current_nodes(&self) -> Vec<Arc<N>> {
        self.all_nodes()
    }
}

impl<N: Node + ?Sized> ApplyMembership<N> for ReplicaKetamaNodeLocator<N> {
    fn apply_change(&self, change: MembershipChange<N>) -> corelib::Result<()> {
        self.update_with_roles(change.attach, change.detach, change.role_changes)
    }

    fn current_nodes(&self) -> Vec<Arc<N>> {
        self.all_nodes()
    }
}

/// Counters kept by the apply loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplierStats {
    pub applied: u64,
    pub failed: u64,
}

enum Command<N: Node + ?Sized> {
    Apply {
        change: MembershipChange<N>,
        ack: Option<oneshot::Sender<corelib::Result<()>>>,
    },
    Nodes {
        reply: oneshot::Sender<Vec<Arc<N>>>,
    },
    Shutdown,
}

/// Cloneable handle for submitting changes to an apply loop.
pub struct MembershipHandle<N: Node + ?Sized> {
    sender: mpsc::Sender<Command<N>>,
    stats: watch::Receiver<ApplierStats>,
}

impl<N: Node + ?Sized> Clone for MembershipHandle<N> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<N: Node + ?Sized> MembershipHandle<N> {
    /// Queue a change, waiting only for channel capacity.
    pub async fn submit(&self, change: MembershipChange<N>) -> Result<()> {
        self.sender
            .send(Command::Apply { change, ack: None })
            .await
            .map_err(|_| MembershipError::Closed)
    }

    /// Queue a change and wait until the locator has applied it.
    pub async fn apply(&self, change: MembershipChange<N>) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(Command::Apply {
                change,
                ack: Some(ack),
            })
            .await
            .map_err(|_| MembershipError::Closed)?;
        done.await.map_err(|_| MembershipError::Closed)??;
        Ok(())
    }

    /// Current nodes of the target, read after every queued change.
    pub async fn current_nodes(&self) -> Result<Vec<Arc<N>>> {
        let (reply, nodes) = oneshot::channel();
        self.sender
            .send(Command::Nodes { reply })
            .await
            .map_err(|_| MembershipError::Closed)?;
        nodes.await.map_err(|_| MembershipError::Closed)
    }

    /// Stop the loop after the changes already queued.
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(Command::Shutdown)
            .await
            .map_err(|_| MembershipError::Closed)
    }

    pub fn stats(&self) -> ApplierStats {
        *self.stats.borrow()
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// The task side of the apply loop.
pub struct MembershipApplier<T, N: Node + ?Sized> {
    target: Arc<T>,
    stats_tx: watch::Sender<ApplierStats>,
    stats: ApplierStats,
    _node: std::marker::PhantomData<fn() -> Arc<N>>,
}

impl<T, N> MembershipApplier<T, N>
where
    T: ApplyMembership<N>,
    N: Node + ?Sized,
{
    /// Start the loop on the current tokio runtime.
    ///
    /// `capacity` bounds the number of queued changes; submitters wait when
    /// the queue is full.
    pub fn spawn(target: Arc<T>, capacity: usize) -> (MembershipHandle<N>, JoinHandle<ApplierStats>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (stats_tx, stats_rx) = watch::channel(ApplierStats::default());
        let applier = MembershipApplier {
            target,
            stats_tx,
            stats: ApplierStats::default(),
            _node: std::marker::PhantomData,
        };
        let task = tokio::spawn(applier.run(rx));
        info!(capacity, "membership apply loop started");
        (
            MembershipHandle {
                sender: tx,
                stats: stats_rx,
            },
            task,
        )
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command<N>>) -> ApplierStats {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Apply { change, ack } => {
                    let result = self.apply(change);
                    if let Some(ack) = ack {
                        let _ = ack.send(result);
                    }
                }
                Command::Nodes { reply } => {
                    let _ = reply.send(self.target.current_nodes());
                }
                Command::Shutdown => break,
            }
        }
        info!(
            applied = self.stats.applied,
            failed = self.stats.failed,
            "membership apply loop stopped"
        );
        self.stats
    }

    fn apply(&mut self, change: MembershipChange<N>) -> corelib::Result<()> {
        if change.is_empty() {
            return Ok(());
        }
        debug!(
            attach = change.attach.len(),
            detach = change.detach.len(),
            role_changes = change.role_changes.len(),
            "applying membership change"
        );
        let result = self.target.apply_change(change);
        match &result {
            Ok(()) => self.stats.applied += 1,
            Err(err) => {
                warn!(error = %err, "membership change rejected");
                self.stats.failed += 1;
            }
        }
        let _ = self.stats_tx.send(self.stats);
        result
    }
}
