//! Hash algorithms mapping keys to positions.
//!
//! Two families are provided:
//!
//! - **Native**: a fast non-cryptographic string hash (xxh3) used for
//!   array-modulus routing.
//! - **Ketama**: MD5 based. One 16 byte digest yields four independent
//!   32-bit ring points, which is why virtual node generation produces
//!   four positions per digest.
//!
//! All hash values are unsigned. Ketama values always fit in the low 32 bits
//! of the returned `u64`.

pub mod ketama;
pub mod native;

use serde::{Deserialize, Serialize};

pub use ketama::{ketama_digest, ketama_points, POINTS_PER_DIGEST};

/// Selectable key hash algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// xxh3 over the key bytes, full 64 bits.
    Native,
    /// First little-endian 32-bit word of the key's MD5 digest.
    #[default]
    Ketama,
}

impl HashAlgorithm {
    /// Hash a key. Deterministic and pure.
    pub fn hash(&self, key: &str) -> u64 {
        match self {
            HashAlgorithm::Native => native::hash(key.as_bytes()),
            HashAlgorithm::Ketama => u64::from(ketama::hash(key.as_bytes())),
        }
    }

    /// Hash a key combined with a per-try salt (`"{salt}{key}"`).
    ///
    /// Used to advance failover walks around the ring.
    pub fn salted_hash(&self, salt: usize, key: &str) -> u64 {
        self.hash(&format!("{}{}", salt, key))
    }

    /// Returns the name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Native => "native",
            HashAlgorithm::Ketama => "ketama",
        }
    }
}
