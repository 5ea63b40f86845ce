//! Native (non-cryptographic) key hash.

use xxhash_rust::xxh3::xxh3_64;

/// Hash raw key bytes with xxh3.
#[inline]
pub fn hash(data: &[u8]) -> u64 {
    xxh3_64(data)
}
