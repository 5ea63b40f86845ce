//! Alternate ring fragment used while data migrates between nodes.
//!
//! During a migration window the live ring keeps serving lookups while an
//! overlay tracks the points of the members being added (`Join`) or removed
//! (`Leave`). Each completed hash range moves those points into (or out of)
//! the live ring, so ownership changes range by range instead of all at once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ring::ring::KetamaRing;
use crate::vnode::{clockwise_distance, RingMember};

/// Direction of a migration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationType {
    /// Alter members are joining the ring.
    Join,
    /// Alter members are leaving the ring.
    Leave,
}

/// Remaining, not yet migrated points of the alter members.
#[derive(Clone, Debug)]
pub struct MigrationOverlay<M: RingMember> {
    kind: MigrationType,
    alter: KetamaRing<M>,
}

impl<M: RingMember> MigrationOverlay<M> {
    /// Start a migration for `members` against the `live` ring.
    ///
    /// Joining members must be absent from the live ring, leaving members
    /// must be present.
    pub fn prepare(kind: MigrationType, members: Vec<M>, live: &KetamaRing<M>) -> Result<Self> {
        for member in &members {
            check_membership(kind, member, live)?;
        }
        let alter = KetamaRing::build(members, live.config().clone())?;
        Ok(Self { kind, alter })
    }

    pub fn kind(&self) -> MigrationType {
        self.kind
    }

    /// Points not migrated yet.
    pub fn alter_ring(&self) -> &KetamaRing<M> {
        &self.alter
    }

    pub fn alter_member(&self, name: &str) -> Option<&M> {
        self.alter.member(name)
    }

    /// True once every alter point has been migrated.
    pub fn is_complete(&self) -> bool {
        self.alter.member_count() == 0
    }

    /// Add another alter member to the running migration.
    pub fn attach(&mut self, member: M, live: &KetamaRing<M>) -> Result<bool> {
        check_membership(self.kind, &member, live)?;
        Ok(self.alter.insert(member))
    }

    /// Drop an alter member together with its remaining points.
    ///
    /// The member leaves the live ring entirely in both directions: a joining
    /// member loses the points it already moved in, a leaving member finishes
    /// its leave at once. The caller owns shutting the member down.
    pub fn detach(&mut self, name: &str, live: &mut KetamaRing<M>) -> Option<M> {
        let member = self.alter.remove(name)?;
        if live.contains(name) {
            live.remove(name);
        }
        Some(member)
    }

    /// Mark the hash range `(start, end]` as migrated.
    ///
    /// Returns the members whose migration finished with this range: joined
    /// members now fully present in the live ring, or left members no longer
    /// in it.
    pub fn migrate_range(&mut self, live: &mut KetamaRing<M>, start: Option<u64>, end: u64) -> Vec<M> {
        let points = self.alter.points_in_range(start, end);
        let mut touched: BTreeMap<String, M> = BTreeMap::new();
        for (position, member) in points {
            let name = member.ring_name().to_string();
            self.alter.remove_at(position, &name);
            match self.kind {
                MigrationType::Join => {
                    live.insert_at(position, member.clone());
                    live.register(member.clone());
                }
                MigrationType::Leave => {
                    live.remove_at(position, &name);
                }
            }
            touched.entry(name).or_insert(member);
        }

        let mut finished = Vec::new();
        for (name, member) in touched {
            if self.alter.holds_any(&member) {
                continue;
            }
            self.alter.unregister(&name);
            if self.kind == MigrationType::Leave {
                live.unregister(&name);
            }
            finished.push(member);
        }
        finished
    }

    /// Member that will own `hash` once the migration completes.
    pub fn owner<'a>(&'a self, live: &'a KetamaRing<M>, hash: u64) -> Option<&'a M> {
        match self.kind {
            MigrationType::Join => {
                let current = live.ceiling(hash);
                let joining = self.alter.ceiling(hash);
                match (current, joining) {
                    (Some((cp, cm)), Some((jp, jm))) => {
                        if clockwise_distance(hash, jp) < clockwise_distance(hash, cp) {
                            Some(jm)
                        } else {
                            Some(cm)
                        }
                    }
                    (Some((_, m)), None) | (None, Some((_, m))) => Some(m),
                    (None, None) => None,
                }
            }
            MigrationType::Leave => live
                .ceiling_where(hash, |m| !self.alter.contains(m.ring_name()))
                .map(|(_, m)| m),
        }
    }
}

fn check_membership<M: RingMember>(kind: MigrationType, member: &M, live: &KetamaRing<M>) -> Result<()> {
    let present = live.contains(member.ring_name());
    match (kind, present) {
        (MigrationType::Join, true) => Err(Error::InvalidArgument(format!(
            "joining member {} is already in the ring",
            member.ring_name()
        ))),
        (MigrationType::Leave, false) => Err(Error::InvalidArgument(format!(
            "leaving member {} is not in the ring",
            member.ring_name()
        ))),
        _ => Ok(()),
    }
}
