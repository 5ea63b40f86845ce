//! The Ketama hash ring.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use tracing::debug;

use crate::configuration::{validate_repetitions, KetamaConfiguration};
use crate::error::{Error, Result};
use crate::ring::entry::RingEntry;
use crate::vnode::{virtual_positions, RingMember};

/// Sorted mapping from ring positions to the members owning them, plus the
/// flat set of members.
///
/// # Invariants
///
/// - No entry is empty; an entry is dropped with its last member.
/// - `len() <= repetitions * member_count()`; collisions only shrink it.
///
/// Cloning produces an independent copy of the entry map and member set
/// (members themselves are shared handles).
#[derive(Clone, Debug)]
pub struct KetamaRing<M: RingMember> {
    entries: BTreeMap<u64, RingEntry<M>>,
    members: BTreeMap<String, M>,
    config: Arc<dyn KetamaConfiguration<M>>,
}

impl<M: RingMember> KetamaRing<M> {
    /// Create an empty ring.
    pub fn new(config: Arc<dyn KetamaConfiguration<M>>) -> Result<Self> {
        validate_repetitions(config.repetitions())?;
        Ok(Self {
            entries: BTreeMap::new(),
            members: BTreeMap::new(),
            config,
        })
    }

    /// Build a ring from an initial member list.
    ///
    /// An empty list is legal. Duplicate member names are rejected.
    pub fn build(
        members: impl IntoIterator<Item = M>,
        config: Arc<dyn KetamaConfiguration<M>>,
    ) -> Result<Self> {
        let mut ring = Self::new(config)?;
        for member in members {
            if !ring.insert(member.clone()) {
                return Err(Error::InvalidArgument(format!(
                    "duplicate ring member {}",
                    member.ring_name()
                )));
            }
        }
        debug!(
            members = ring.member_count(),
            positions = ring.len(),
            "built ketama ring"
        );
        Ok(ring)
    }

    /// Place all virtual nodes of `member`. Returns `false` if already present.
    pub fn insert(&mut self, member: M) -> bool {
        if self.members.contains_key(member.ring_name()) {
            return false;
        }
        for position in self.positions_of(&member) {
            self.insert_at(position, member.clone());
        }
        self.members
            .insert(member.ring_name().to_string(), member);
        debug_assert!(
            self.len() <= self.max_positions(),
            "ring holds {} positions for {} members",
            self.len(),
            self.member_count()
        );
        true
    }

    /// Remove every virtual node of the member called `name`.
    pub fn remove(&mut self, name: &str) -> Option<M> {
        let member = self.members.remove(name)?;
        for position in self.positions_of(&member) {
            self.remove_at(position, name);
        }
        Some(member)
    }

    /// Member serving `hash`: exact position, else ceiling, else wrap to first.
    pub fn lookup(&self, hash: u64) -> Result<&M> {
        self.ceiling(hash).map(|(_, m)| m).ok_or(Error::NoNode)
    }

    /// Position and member serving `hash`, or `None` on an empty ring.
    pub fn ceiling(&self, hash: u64) -> Option<(u64, &M)> {
        self.ceiling_where(hash, |_| true)
    }

    /// Like [`ceiling`](Self::ceiling) but skipping members rejected by
    /// `accept`, walking clockwise at most once around the ring.
    pub fn ceiling_where(&self, hash: u64, accept: impl Fn(&M) -> bool) -> Option<(u64, &M)> {
        self.entries
            .range(hash..)
            .chain(self.entries.range(..hash))
            .find_map(|(position, entry)| entry.first_where(&accept).map(|m| (*position, m)))
    }

    /// Add `member` at a single position.
    pub(crate) fn insert_at(&mut self, position: u64, member: M) -> bool {
        let config = Arc::clone(&self.config);
        self.entries
            .entry(position)
            .or_insert_with(RingEntry::new)
            .insert(member, config.as_ref())
    }

    /// Remove the member called `name` from a single position, dropping the
    /// entry if it becomes empty.
    pub(crate) fn remove_at(&mut self, position: u64, name: &str) -> bool {
        let Some(entry) = self.entries.get_mut(&position) else {
            return false;
        };
        let removed = entry.remove(name);
        if entry.is_empty() {
            self.entries.remove(&position);
        }
        removed
    }

    /// Position/member pairs inside the hash range `(start, end]`.
    ///
    /// `start == None` means from the beginning of the hash space. A `start`
    /// at or past `end` wraps around the top of the ring.
    pub(crate) fn points_in_range(&self, start: Option<u64>, end: u64) -> Vec<(u64, M)> {
        let collect = |iter: std::collections::btree_map::Range<'_, u64, RingEntry<M>>| {
            iter.flat_map(|(p, e)| e.members().iter().map(move |m| (*p, m.clone())))
                .collect::<Vec<_>>()
        };
        match start {
            None => collect(self.entries.range(..=end)),
            Some(start) if start < end => {
                collect(self.entries.range((Bound::Excluded(start), Bound::Included(end))))
            }
            Some(start) => {
                let mut points = collect(self.entries.range((Bound::Excluded(start), Bound::Unbounded)));
                points.extend(collect(self.entries.range(..=end)));
                points
            }
        }
    }

    /// Record `member` in the member set without touching positions.
    pub(crate) fn register(&mut self, member: M) {
        self.members
            .entry(member.ring_name().to_string())
            .or_insert(member);
    }

    /// Drop `name` from the member set without touching positions.
    pub(crate) fn unregister(&mut self, name: &str) -> Option<M> {
        self.members.remove(name)
    }

    /// True if `member` still owns at least one of its virtual positions.
    pub fn holds_any(&self, member: &M) -> bool {
        self.positions_of(member).into_iter().any(|p| {
            self.entries
                .get(&p)
                .map_or(false, |e| e.contains(member.ring_name()))
        })
    }

    /// Virtual positions this ring's configuration assigns to `member`.
    pub fn positions_of(&self, member: &M) -> Vec<u64> {
        virtual_positions(self.config.as_ref(), member)
    }

    /// Iterate positions in ring order.
    pub fn entries(&self) -> impl Iterator<Item = (u64, &RingEntry<M>)> {
        self.entries.iter().map(|(p, e)| (*p, e))
    }

    /// Entry at an exact position.
    pub fn entry(&self, position: u64) -> Option<&RingEntry<M>> {
        self.entries.get(&position)
    }

    pub fn member(&self, name: &str) -> Option<&M> {
        self.members.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Members ordered by name.
    pub fn members(&self) -> impl Iterator<Item = &M> {
        self.members.values()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Number of distinct positions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Upper bound on positions for the current member count.
    pub fn max_positions(&self) -> usize {
        self.config.repetitions() * self.members.len()
    }

    pub fn config(&self) -> &Arc<dyn KetamaConfiguration<M>> {
        &self.config
    }
}
