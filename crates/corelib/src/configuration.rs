//! Ring construction strategy.
//!
//! A [`KetamaConfiguration`] decides which strings get hashed to place a
//! member's virtual nodes, how many virtual nodes each member gets, and how
//! members that collide on one ring position are ordered.

use std::cmp::Ordering;
use std::fmt::Debug;

use crate::error::{Error, Result};
use crate::hash::POINTS_PER_DIGEST;
use crate::vnode::RingMember;

/// Default number of virtual nodes per member.
pub const DEFAULT_REPETITIONS: usize = 160;

/// Strategy object parameterizing ring construction.
pub trait KetamaConfiguration<M: RingMember>: Send + Sync + Debug {
    /// Virtual nodes per member. Always a positive multiple of 4.
    fn repetitions(&self) -> usize;

    /// Key hashed for digest `repetition` of `member`, `repetition` in
    /// `0..repetitions() / 4`.
    fn key_for(&self, member: &M, repetition: usize) -> String {
        format!("{}-{}", member.ring_name(), repetition)
    }

    /// Total order used to sort members that collide on a ring position.
    fn compare(&self, a: &M, b: &M) -> Ordering {
        a.ring_name().cmp(b.ring_name())
    }

    /// Number of digests computed per member.
    fn digests_per_member(&self) -> usize {
        self.repetitions() / POINTS_PER_DIGEST
    }
}

/// Name based configuration: `"{name}-{i}"` keys, ordering by name.
///
/// Works for plain nodes (named by address) and replica groups (named by
/// group name) alike.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultKetamaConfiguration {
    repetitions: usize,
}

impl DefaultKetamaConfiguration {
    pub fn new(repetitions: usize) -> Result<Self> {
        validate_repetitions(repetitions)?;
        Ok(Self { repetitions })
    }
}

impl Default for DefaultKetamaConfiguration {
    fn default() -> Self {
        Self {
            repetitions: DEFAULT_REPETITIONS,
        }
    }
}

impl<M: RingMember> KetamaConfiguration<M> for DefaultKetamaConfiguration {
    fn repetitions(&self) -> usize {
        self.repetitions
    }
}

/// Repetitions must be a positive multiple of the points per digest.
pub fn validate_repetitions(repetitions: usize) -> Result<()> {
    if repetitions == 0 || repetitions % POINTS_PER_DIGEST != 0 {
        return Err(Error::InvalidArgument(format!(
            "repetitions must be a positive multiple of {}, got {}",
            POINTS_PER_DIGEST, repetitions
        )));
    }
    Ok(())
}
