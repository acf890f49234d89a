//! Key hashing
//!
//! Every key is hashed once with XXH3-64. The low bits pick the bucket and
//! bits `[32, 48)` form the 16-bit tag used to tell chain entries apart.

use xxhash_rust::xxh3::xxh3_64;

/// Hash, tag and bucket placement of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyHash {
    pub hash: u64,
    pub tag: u16,
}

impl KeyHash {
    pub fn of(key: &[u8]) -> Self {
        let hash = xxh3_64(key);
        Self {
            hash,
            tag: tag_of(hash),
        }
    }

    /// Bucket index for a table with the given mask
    #[inline]
    pub fn bucket(&self, mask: u32) -> usize {
        (self.hash & u64::from(mask)) as usize
    }
}

#[inline]
pub fn tag_of(hash: u64) -> u16 {
    ((hash >> 32) & 0xffff) as u16
}
