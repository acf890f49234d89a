//! Hash buckets
//!
//! Each bucket is an insertion-ordered chain behind its own `RwLock`:
//! - lookups and StartAccess take a read lock
//! - put/delete take an upgradable read, upgrading only to splice the chain,
//!   so readers keep scanning while an item drains
//! - bucket iterators take the write lock for their whole lifetime

use std::sync::Arc;

use crossbeam::utils::CachePadded;
use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard};

use crate::item::{Item, ItemRef};

pub(crate) type Chain = Vec<Arc<Item>>;

/// One slot of the table
pub(crate) struct Bucket {
    chain: CachePadded<RwLock<Chain>>,
}

impl Bucket {
    pub(crate) fn new() -> Self {
        Self {
            chain: CachePadded::new(RwLock::new(Vec::new())),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Chain> {
        self.chain.read()
    }

    pub(crate) fn upgradable(&self) -> RwLockUpgradableReadGuard<'_, Chain> {
        self.chain.upgradable_read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Chain> {
        self.chain.write()
    }
}

/// Cursor over one bucket's chain.
///
/// Holds the bucket's exclusive lock until dropped, blocking every other
/// operation on that bucket (and only that bucket).
pub struct BucketIter<'t> {
    chain: RwLockWriteGuard<'t, Chain>,
    bucket_index: usize,
    pos: usize,
}

impl<'t> BucketIter<'t> {
    /// Lock `bucket`; `None` if its chain is empty
    pub(crate) fn open(bucket: &'t Bucket, bucket_index: usize) -> Option<Self> {
        let chain = bucket.write();
        if chain.is_empty() {
            return None;
        }
        Some(Self {
            chain,
            bucket_index,
            pos: 0,
        })
    }

    pub fn bucket_index(&self) -> usize {
        self.bucket_index
    }

    /// Position of the cursor in the chain
    pub fn index(&self) -> usize {
        self.pos
    }

    /// Item under the cursor without advancing
    pub fn current(&self) -> Option<ItemRef> {
        self.chain.get(self.pos).map(|item| ItemRef::from(Arc::clone(item)))
    }

    /// Number of items in the locked chain
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }
}

impl std::fmt::Debug for BucketIter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketIter")
            .field("bucket_index", &self.bucket_index)
            .field("pos", &self.pos)
            .field("len", &self.chain.len())
            .finish()
    }
}

impl Iterator for BucketIter<'_> {
    type Item = ItemRef;

    fn next(&mut self) -> Option<ItemRef> {
        let item = self.current()?;
        self.pos += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.chain.len().saturating_sub(self.pos);
        (remaining, Some(remaining))
    }
}
