//! MD5 based Ketama hashing.

use md5::{Digest, Md5};

/// Number of ring points carved out of one MD5 digest.
pub const POINTS_PER_DIGEST: usize = 4;

/// Compute the 16 byte MD5 digest of `data`.
pub fn ketama_digest(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(data);
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Split a digest into its four little-endian 32-bit words.
pub fn ketama_points(digest: &[u8; 16]) -> [u32; POINTS_PER_DIGEST] {
    let mut points = [0u32; POINTS_PER_DIGEST];
    for (alignment, point) in points.iter_mut().enumerate() {
        let offset = alignment * 4;
        *point = u32::from_le_bytes([
            digest[offset],
            digest[offset + 1],
            digest[offset + 2],
            digest[offset + 3],
        ]);
    }
    points
}

/// Ketama key hash: the first point of the key's digest.
pub fn hash(data: &[u8]) -> u32 {
    ketama_points(&ketama_digest(data))[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        let digest = ketama_digest(b"");
        assert_eq!(digest[0], 0xd4);
        assert_eq!(digest[15], 0x7e);
        assert_eq!(hash(b""), 0xd98c_1dd4);
    }

    #[test]
    fn test_points_are_little_endian_chunks() {
        let mut digest = [0u8; 16];
        digest[0] = 0x01;
        digest[7] = 0x80;
        digest[8] = 0xff;
        digest[15] = 0x10;
        let points = ketama_points(&digest);
        assert_eq!(points, [0x0000_0001, 0x8000_0000, 0x0000_00ff, 0x1000_0000]);
    }

    #[test]
    fn test_points_are_distinct_chunks() {
        let points = ketama_points(&ketama_digest(b"10.0.0.1:11211-0"));
        assert_eq!(points.len(), POINTS_PER_DIGEST);
        assert_eq!(points[0], hash(b"10.0.0.1:11211-0"));
    }
}
