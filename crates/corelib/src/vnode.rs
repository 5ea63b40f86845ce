//! Virtual node placement.
//!
//! Each ring member gets `repetitions` virtual nodes. They are produced
//! `POINTS_PER_DIGEST` at a time: the configuration names digest `i` of a
//! member, the key is MD5 hashed, and every little-endian 32-bit word of the
//! digest becomes one ring position.
//!
//! More virtual nodes smooth the key distribution but grow the ring:
//! lookup stays `O(log p)` in the number of positions `p`.

use std::fmt::Debug;
use std::sync::Arc;

use crate::configuration::KetamaConfiguration;
use crate::hash::{ketama_digest, ketama_points};
use crate::node::Node;

/// Anything that can own positions on the ring.
///
/// Members are cheap handles (`Arc` nodes, group names). Two members with the
/// same `ring_name` are the same member.
pub trait RingMember: Clone + Send + Sync + Debug + 'static {
    fn ring_name(&self) -> &str;
}

impl<N: Node + ?Sized> RingMember for Arc<N> {
    fn ring_name(&self) -> &str {
        self.name()
    }
}

/// Compute every ring position of `member`, in generation order.
///
/// Positions may repeat if two digests of the same member collide.
pub fn virtual_positions<M, C>(config: &C, member: &M) -> Vec<u64>
where
    M: RingMember,
    C: KetamaConfiguration<M> + ?Sized,
{
    let digests = config.digests_per_member();
    let mut positions = Vec::with_capacity(config.repetitions());
    for repetition in 0..digests {
        let key = config.key_for(member, repetition);
        let digest = ketama_digest(key.as_bytes());
        positions.extend(ketama_points(&digest).iter().map(|p| u64::from(*p)));
    }
    positions
}

/// Clockwise distance from `from` to `to` on the 32-bit Ketama circle.
#[inline]
pub fn clockwise_distance(from: u64, to: u64) -> u64 {
    u64::from((to as u32).wrapping_sub(from as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::DefaultKetamaConfiguration;
    use crate::node::SimpleNode;

    #[test]
    fn test_positions_count() {
        let config = DefaultKetamaConfiguration::new(16).unwrap();
        let node = Arc::new(SimpleNode::new("node1"));
        let positions = virtual_positions(&config, &node);
        assert_eq!(positions.len(), 16);
        assert!(positions.iter().all(|p| *p <= u64::from(u32::MAX)));
    }

    #[test]
    fn test_positions_deterministic() {
        let config = DefaultKetamaConfiguration::new(8).unwrap();
        let a = Arc::new(SimpleNode::new("node1"));
        let b = Arc::new(SimpleNode::new("node1"));
        assert_eq!(virtual_positions(&config, &a), virtual_positions(&config, &b));
    }

    #[test]
    fn test_clockwise_distance_wraps() {
        assert_eq!(clockwise_distance(100, 200), 100);
        assert_eq!(clockwise_distance(200, 100), u64::from(u32::MAX) - 99);
        assert_eq!(clockwise_distance(5, 5), 0);
    }
}
