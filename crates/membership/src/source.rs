//! External membership sources.
//!
//! A source stands in for the coordination-service watcher: each call yields
//! the complete node list as currently reported. [`pump`] diffs each report
//! against the locator and forwards the result to the apply loop.

use std::sync::Arc;

use async_trait::async_trait;
use corelib::node::Node;
use tracing::{debug, info, warn};

use crate::applier::MembershipHandle;
use crate::diff::NodeListDiff;
use crate::error::{MembershipError, Result};

/// Builds connection handles for newly reported addresses.
pub trait NodeFactory<N: Node + ?Sized>: Send + Sync {
    fn create(&self, address: &str) -> corelib::Result<Arc<N>>;
}

impl<N, F> NodeFactory<N> for F
where
    N: Node + ?Sized,
    F: Fn(&str) -> corelib::Result<Arc<N>> + Send + Sync,
{
    fn create(&self, address: &str) -> corelib::Result<Arc<N>> {
        self(address)
    }
}

/// A stream of full node-list reports.
#[async_trait]
pub trait MembershipSource: Send {
    /// Next reported node list, or `None` once the source is closed.
    async fn next_nodes(&mut self) -> Result<Option<Vec<String>>>;
}

/// Forward every report from `source` to the apply loop behind `handle`.
///
/// Returns the number of non-empty changes applied once the source closes.
/// Changes the locator rejects are logged and skipped; source errors and a
/// closed apply loop end the pump.
pub async fn pump<N, S, F>(source: &mut S, factory: &F, handle: &MembershipHandle<N>) -> Result<usize>
where
    N: Node + ?Sized,
    S: MembershipSource + ?Sized,
    F: NodeFactory<N> + ?Sized,
{
    let mut applied = 0usize;
    while let Some(reported) = source.next_nodes().await? {
        let current = handle.current_nodes().await?;
        let diff = NodeListDiff::between(&current, &reported);
        if diff.is_empty() {
            debug!(nodes = reported.len(), "membership report without changes");
            continue;
        }
        let change = diff.into_change(&current, factory);
        match handle.apply(change).await {
            Ok(()) => applied += 1,
            Err(MembershipError::Locator(err)) => {
                warn!(error = %err, "reported membership rejected by locator");
            }
            Err(err) => return Err(err),
        }
    }
    info!(applied, "membership source closed");
    Ok(applied)
}
