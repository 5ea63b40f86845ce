//! Read-only Ketama locator copies.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use crate::locator::sequence::{KetamaSequence, PointLookup};
use crate::locator::NodeLocator;
use crate::node::Node;
use crate::ring::KetamaRing;

/// A ring copied out of a live locator.
///
/// Owns its entry map outright, so it needs no lock and never changes. All
/// mutating operations fail with [`Error::Unsupported`].
#[derive(Debug)]
pub struct KetamaSnapshot<N: Node + ?Sized> {
    ring: KetamaRing<Arc<N>>,
    hash_alg: HashAlgorithm,
}

impl<N: Node + ?Sized> Clone for KetamaSnapshot<N> {
    fn clone(&self) -> Self {
        Self {
            ring: self.ring.clone(),
            hash_alg: self.hash_alg,
        }
    }
}

impl<N: Node + ?Sized> KetamaSnapshot<N> {
    pub(crate) fn new(ring: KetamaRing<Arc<N>>, hash_alg: HashAlgorithm) -> Self {
        Self { ring, hash_alg }
    }

    /// The copied ring.
    pub fn ring(&self) -> &KetamaRing<Arc<N>> {
        &self.ring
    }
}

impl<'a, N: Node + ?Sized> PointLookup for &'a KetamaSnapshot<N> {
    type Item = Arc<N>;

    fn lookup_point(&self, hash: u64) -> Option<Arc<N>> {
        self.ring.lookup(hash).ok().cloned()
    }
}

impl<N: Node + ?Sized> NodeLocator<N> for KetamaSnapshot<N> {
    type Sequence<'a> = KetamaSequence<&'a KetamaSnapshot<N>>
    where
        Self: 'a;
    type Snapshot = KetamaSnapshot<N>;

    fn primary(&self, key: &str) -> Result<Arc<N>> {
        let hash = u64::from(self.hash_alg.hash(key) as u32);
        self.ring.lookup(hash).cloned()
    }

    fn sequence(&self, key: &str) -> Self::Sequence<'_> {
        KetamaSequence::new(self, self.hash_alg, key, self.ring.member_count())
    }

    fn all_nodes(&self) -> Vec<Arc<N>> {
        self.ring.members().cloned().collect()
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
