//! Fixed array-modulus locator.

use std::iter::FusedIterator;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use crate::locator::NodeLocator;
use crate::node::Node;

/// Routes `key` to `nodes[hash(key) % len]`.
///
/// The node array is immutable after construction, so lookups take no lock
/// and live updates are unsupported.
#[derive(Debug)]
pub struct ArrayModNodeLocator<N: Node + ?Sized> {
    nodes: Arc<[Arc<N>]>,
    hash_alg: HashAlgorithm,
}

impl<N: Node + ?Sized> Clone for ArrayModNodeLocator<N> {
    fn clone(&self) -> Self {
        Self {
            nodes: Arc::clone(&self.nodes),
            hash_alg: self.hash_alg,
        }
    }
}

impl<N: Node + ?Sized> ArrayModNodeLocator<N> {
    pub fn new(nodes: Vec<Arc<N>>, hash_alg: HashAlgorithm) -> Self {
        Self {
            nodes: nodes.into(),
            hash_alg,
        }
    }

    fn index_for(&self, key: &str) -> Option<usize> {
        if self.nodes.is_empty() {
            return None;
        }
        Some((self.hash_alg.hash(key) % self.nodes.len() as u64) as usize)
    }
}

impl<N: Node + ?Sized> NodeLocator<N> for ArrayModNodeLocator<N> {
    type Sequence<'a> = ArrayModSequence<'a, N>
    where
        Self: 'a;
    type Snapshot = ArrayModNodeLocator<N>;

    fn primary(&self, key: &str) -> Result<Arc<N>> {
        let idx = self.index_for(key).ok_or(Error::NoNode)?;
        Ok(Arc::clone(&self.nodes[idx]))
    }

    /// The nodes after the primary, in array order, wrapping once.
    fn sequence(&self, key: &str) -> ArrayModSequence<'_, N> {
        ArrayModSequence::new(&self.nodes, self.index_for(key))
    }

    fn all_nodes(&self) -> Vec<Arc<N>> {
        self.nodes.to_vec()
    }

    fn snapshot(&self) -> Self::Snapshot {
        self.clone()
    }

    fn update(&self, _attach: Vec<Arc<N>>, _detach: Vec<Arc<N>>) -> Result<()> {
        Err(Error::Unsupported("update on array-modulus locator"))
    }
}

/// Walks the array from the slot after the primary back around to it.
#[derive(Debug)]
pub struct ArrayModSequence<'a, N: Node + ?Sized> {
    nodes: &'a [Arc<N>],
    start: usize,
    next: Option<usize>,
}

impl<'a, N: Node + ?Sized> ArrayModSequence<'a, N> {
    fn new(nodes: &'a [Arc<N>], start: Option<usize>) -> Self {
        let mut seq = Self {
            nodes,
            start: start.unwrap_or(0),
            next: start,
        };
        seq.step();
        seq
    }

    fn step(&mut self) {
        let Some(current) = self.next else {
            return;
        };
        let candidate = (current + 1) % self.nodes.len();
        self.next = (candidate != self.start).then_some(candidate);
    }
}

impl<'a, N: Node + ?Sized> Iterator for ArrayModSequence<'a, N> {
    type Item = Arc<N>;

    fn next(&mut self) -> Option<Arc<N>> {
        let idx = self.next?;
        self.step();
        Some(Arc::clone(&self.nodes[idx]))
    }
}

impl<'a, N: Node + ?Sized> FusedIterator for ArrayModSequence<'a, N> {}
