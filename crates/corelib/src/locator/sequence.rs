//! Failover walk around a Ketama ring.

use std::iter::FusedIterator;

use crate::hash::HashAlgorithm;

/// Point query against a ring, one lookup per call.
///
/// Live locators take their lock inside each call, so a sequence never holds
/// a lock between steps.
pub trait PointLookup {
    type Item;

    /// Resolve a ring position, `None` when nothing can serve it.
    fn lookup_point(&self, hash: u64) -> Option<Self::Item>;
}

/// Pseudo-random walk around the ring seeded by the key.
///
/// Step `n` looks up the current hash, then advances it by the low 32 bits of
/// `hash("{n}{key}")` with wrapping arithmetic. The walk is capped at the
/// member count captured when it was created, and positions that resolve to
/// nothing are skipped without extending the cap.
#[derive(Debug)]
pub struct KetamaSequence<L> {
    source: L,
    hash_alg: HashAlgorithm,
    key: String,
    hash: u32,
    tries: usize,
    remaining: usize,
}

impl<L: PointLookup> KetamaSequence<L> {
    pub fn new(source: L, hash_alg: HashAlgorithm, key: &str, steps: usize) -> Self {
        Self {
            source,
            hash_alg,
            key: key.to_string(),
            hash: hash_alg.hash(key) as u32,
            tries: 0,
            remaining: steps,
        }
    }

    /// Steps left before the sequence ends.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn advance(&mut self) {
        let salted = self.hash_alg.salted_hash(self.tries, &self.key);
        self.tries += 1;
        self.hash = self.hash.wrapping_add(salted as u32);
        self.remaining -= 1;
    }
}

impl<L: PointLookup> Iterator for KetamaSequence<L> {
    type Item = L::Item;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            let found = self.source.lookup_point(u64::from(self.hash));
            self.advance();
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<L: PointLookup> FusedIterator for KetamaSequence<L> {}
