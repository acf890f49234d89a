//! Hash Table Module
//!
//! Sharded record-of-truth table for the benchmark harness.
//!
//! ## Responsibilities
//! - Key-addressable storage over `2^P` independently locked buckets
//! - Item lifecycle (create, update in place, retire) under the bucket lock
//! - Global memory budget and live item accounting
//! - Mirror every structural change into the tree index for sampling
//!
//! ## Lock Order
//! ```text
//!   bucket lock ──► tree lock        (never the reverse)
//! ```
//!
//! ## Caller Contract
//! A thread must not call `put` or `delete` on a key's bucket while it
//! still pins an item in that bucket that the call would retire: the drain
//! would wait on the caller itself.

mod bucket;
mod reclaim;
mod stats;

pub use bucket::BucketIter;
pub use reclaim::Quiescence;
pub use stats::TableStats;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;
use once_cell::sync::OnceCell;
use parking_lot::{RwLockUpgradableReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, trace, warn};

use crate::config::{Config, KeyMatch, MAX_HASH_POWER};
use crate::error::{Result, TableError};
use crate::hash::KeyHash;
use crate::item::{check_lengths, Item, ItemGuard, ItemRef};
use crate::tree::CompleteBinaryTree;

use bucket::{Bucket, Chain};

/// Numeric put outcome flags reported by the benchmark harness
pub mod put_flags {
    pub const UPDATE_SUCC: u16 = 0x01;
    pub const UPDATE_FAIL_OOM: u16 = 0x02;
    pub const UPDATE_FAIL_MEM_LIMIT: u16 = 0x04;
    pub const NEW_SUCC: u16 = 0x08;
    pub const NEW_FAIL_OOM: u16 = 0x10;
    pub const NEW_FAIL_MEM_LIMIT: u16 = 0x20;
}

/// Successful put result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// A new item was inserted
    Created,

    /// An existing item was rewritten in place
    Updated,
}

impl PutOutcome {
    pub fn flags(&self) -> u16 {
        match self {
            PutOutcome::Created => put_flags::NEW_SUCC,
            PutOutcome::Updated => put_flags::UPDATE_SUCC,
        }
    }
}

/// Bucket arrays above this size are logged at setup
const LARGE_BUCKET_ARRAY: u64 = 1 << 30;

/// Bytes of bucket headers for a table of `2^hash_power` buckets
fn bucket_array_bytes(hash_power: u8) -> u64 {
    (std::mem::size_of::<Bucket>() as u64) << hash_power
}

/// Bucket array, fixed for the lifetime of the table
struct Buckets {
    slots: Box<[Bucket]>,
    mask: u32,
}

impl Buckets {
    fn new(hash_power: u8) -> Self {
        let size = 1usize << hash_power;
        let slots = (0..size)
            .map(|_| Bucket::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            mask: (size - 1) as u32,
        }
    }

    fn slot(&self, kh: &KeyHash) -> &Bucket {
        &self.slots[kh.bucket(self.mask)]
    }
}

/// Sharded hash table with a random-sampling index
///
/// ## Concurrency
/// - Each bucket has its own `RwLock` (see [`BucketIter`] and the bucket module)
/// - The tree index has one mutex, taken only while a bucket lock is held
///   or by sampling
/// - `active` and the reference count are lock-free atomics
/// - Byte and item counters are relaxed atomics: exact after each operation
///   completes, approximate while operations race
pub struct HashTable {
    config: Config,

    /// Set exactly once by `setup`
    buckets: OnceCell<Buckets>,

    /// Secondary index over every chained item
    tree: CompleteBinaryTree,

    /// Drain coordination and teardown flag
    quiescence: Quiescence,

    used_bytes: CachePadded<AtomicU64>,
    live_items: CachePadded<AtomicU64>,
}

impl HashTable {
    /// Create a table and set it up with `config.hash_power` buckets
    pub fn new(config: Config) -> Result<Self> {
        let hash_power = config.hash_power;
        let table = Self::deferred(config)?;
        table.setup(hash_power)?;
        Ok(table)
    }

    /// Create a table that must be set up with [`HashTable::setup`] before use
    pub fn deferred(config: Config) -> Result<Self> {
        config.validate()?;

        let tree = match config.sampler_seed {
            Some(seed) => CompleteBinaryTree::with_seed(seed),
            None => CompleteBinaryTree::new(),
        };

        Ok(Self {
            quiescence: Quiescence::new(config.drain_poll),
            config,
            buckets: OnceCell::new(),
            tree,
            used_bytes: CachePadded::new(AtomicU64::new(0)),
            live_items: CachePadded::new(AtomicU64::new(0)),
        })
    }

    /// Allocate `2^hash_power` empty buckets.
    ///
    /// `hash_power` takes precedence over `config.hash_power`; read the
    /// shape actually in use from [`HashTable::hash_power`]. A second call is
    /// logged and rejected with `SetupMisuse`.
    pub fn setup(&self, hash_power: u8) -> Result<()> {
        if hash_power > MAX_HASH_POWER {
            return Err(TableError::Config(format!(
                "hash_power {} exceeds maximum {}",
                hash_power, MAX_HASH_POWER
            )));
        }
        if self.quiescence.is_tearing_down() {
            return Err(misuse("hash table setup after teardown"));
        }

        let bucket_bytes = bucket_array_bytes(hash_power);
        if bucket_bytes > LARGE_BUCKET_ARRAY {
            warn!(hash_power, bucket_bytes, "bucket array alone exceeds 1 GiB");
        }

        let mut fresh = false;
        let buckets = self.buckets.get_or_init(|| {
            fresh = true;
            Buckets::new(hash_power)
        });
        if !fresh {
            return Err(misuse("hash table has already been set up"));
        }

        info!(buckets = buckets.slots.len(), "hash table setup complete");
        Ok(())
    }

    // =========================================================================
    // Lookups and Access
    // =========================================================================

    /// First chain item whose tag (and, with `KeyMatch::Exact`, key) matches.
    ///
    /// Does not pin the item.
    pub fn lookup(&self, key: &[u8]) -> Result<ItemRef> {
        let buckets = self.buckets()?;
        let kh = KeyHash::of(key);
        let chain = buckets.slot(&kh).read();

        self.find(&chain, &kh, key)
            .map(|pos| ItemRef::from(Arc::clone(&chain[pos])))
            .ok_or(TableError::NotFound)
    }

    /// Look up and pin an item.
    ///
    /// Fails with `NotFound` if no item matches or the match is retiring.
    pub fn start_access(&self, key: &[u8]) -> Result<ItemGuard<'_>> {
        let buckets = self.buckets()?;
        let kh = KeyHash::of(key);
        let chain = buckets.slot(&kh).read();

        let pos = self.find(&chain, &kh, key).ok_or(TableError::NotFound)?;
        let item = &chain[pos];
        if self.quiescence.try_pin(item) {
            Ok(ItemGuard::from_pinned(Arc::clone(item), &self.quiescence))
        } else {
            Err(TableError::NotFound)
        }
    }

    /// Pin an item the caller already holds a handle to, without a lookup
    pub fn start_access_directly(&self, item: &ItemRef) -> ItemGuard<'_> {
        ItemGuard::pin(Arc::clone(item.arc()), &self.quiescence)
    }

    /// Release a pin. Equivalent to dropping the guard.
    pub fn stop_access(&self, guard: ItemGuard<'_>) {
        drop(guard);
    }

    /// Pin a uniformly random live item.
    ///
    /// The pin is unconditional: an item that starts retiring between
    /// selection and pinning is still returned.
    pub fn pick_random_live_item(&self) -> Result<ItemGuard<'_>> {
        self.buckets()?;
        let item = self
            .tree
            .pick_random_live_item()
            .ok_or(TableError::EmptyIndex)?;
        Ok(ItemGuard::pin(item.0, &self.quiescence))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert or update `key`.
    ///
    /// Rejected updates destroy the existing item (see `TableError::destroyed_existing`).
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(ItemRef, PutOutcome)> {
        check_lengths(key, value)?;
        let buckets = self.buckets()?;
        let kh = KeyHash::of(key);
        let chain = buckets.slot(&kh).upgradable();

        match self.find(&chain, &kh, key) {
            None => self.insert_new(chain, key, value, kh),
            Some(pos) => self.update_existing(chain, pos, key, value),
        }
    }

    /// Remove `key`. Returns whether a matching item existed.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        let buckets = self.buckets()?;
        let kh = KeyHash::of(key);
        let chain = buckets.slot(&kh).upgradable();

        match self.find(&chain, &kh, key) {
            Some(pos) => {
                self.unlink(chain, pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Release every item without waiting for readers.
    ///
    /// The table rejects all further use with `SetupMisuse`.
    pub fn teardown(&self) -> Result<()> {
        let buckets = self.buckets()?;
        if !self.quiescence.begin_teardown() {
            return Err(misuse("hash table already torn down"));
        }

        let remaining = self.live_items.load(Ordering::Relaxed);
        for bucket in buckets.slots.iter() {
            let mut chain = bucket.write();
            for item in chain.drain(..) {
                item.deactivate();
            }
        }
        self.tree.clear();
        self.used_bytes.store(0, Ordering::Relaxed);
        self.live_items.store(0, Ordering::Relaxed);

        info!(remaining, "hash table teardown");
        Ok(())
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Lock bucket `index` and iterate its chain. `None` if the bucket is empty.
    pub fn bucket_iter(&self, index: usize) -> Result<Option<BucketIter<'_>>> {
        let buckets = self.buckets()?;
        let bucket = buckets
            .slots
            .get(index)
            .ok_or(TableError::BucketOutOfRange {
                index,
                size: buckets.slots.len(),
            })?;
        Ok(BucketIter::open(bucket, index))
    }

    /// Release a bucket iterator. Equivalent to dropping it.
    pub fn free_bucket_iter(&self, iter: BucketIter<'_>) {
        drop(iter);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of buckets (0 before setup)
    pub fn size(&self) -> usize {
        self.buckets.get().map_or(0, |b| b.slots.len())
    }

    /// Hash power chosen at setup (0 before setup)
    pub fn hash_power(&self) -> u8 {
        self.hash_mask().count_ones() as u8
    }

    pub fn hash_mask(&self) -> u32 {
        self.buckets.get().map_or(0, |b| b.mask)
    }

    pub fn live_item_count(&self) -> u64 {
        self.live_items.load(Ordering::Relaxed)
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes.load(Ordering::Relaxed)
    }

    pub fn memory_limit(&self) -> u64 {
        self.config.memory_limit
    }

    /// Configuration the table was built with. `hash_power` here is the
    /// requested value, which an explicit `setup` call may have overridden.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The sampling index (for inspection)
    pub fn tree(&self) -> &CompleteBinaryTree {
        &self.tree
    }

    /// Level-order position of `item` in the sampling index
    pub fn sequence_of(&self, item: &ItemRef) -> Option<u64> {
        self.tree.sequence_of(item)
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            buckets: self.size(),
            hash_mask: self.hash_mask(),
            live_items: self.live_item_count(),
            tree_len: self.tree.len(),
            used_bytes: self.used_bytes(),
            memory_limit: self.config.memory_limit,
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn buckets(&self) -> Result<&Buckets> {
        if self.quiescence.is_tearing_down() {
            return Err(misuse("hash table used after teardown"));
        }
        self.buckets
            .get()
            .ok_or_else(|| misuse("hash table used before setup"))
    }

    fn find(&self, chain: &[Arc<Item>], kh: &KeyHash, key: &[u8]) -> Option<usize> {
        chain.iter().position(|item| {
            item.tag() == kh.tag
                && match self.config.key_match {
                    KeyMatch::Tag => true,
                    KeyMatch::Exact => item.key_eq(key),
                }
        })
    }

    fn insert_new(
        &self,
        chain: RwLockUpgradableReadGuard<'_, Chain>,
        key: &[u8],
        value: &[u8],
        kh: KeyHash,
    ) -> Result<(ItemRef, PutOutcome)> {
        let requested = Item::footprint(key.len(), value.len());
        let used = self.used_bytes.load(Ordering::Relaxed);
        let limit = self.config.memory_limit;

        if used.saturating_add(requested) >= limit {
            debug!(used, requested, limit, "put rejected: memory limit");
            return Err(TableError::OutOfBudget {
                used,
                requested,
                limit,
            });
        }

        let item = match Item::with_hash(key, value, kh) {
            Ok(item) => ItemRef::new(item),
            Err(bytes) => {
                debug!(bytes, "put rejected: allocation failed");
                return Err(TableError::AllocationFailure { bytes });
            }
        };

        let mut chain = RwLockUpgradableReadGuard::upgrade(chain);
        chain.push(Arc::clone(item.arc()));
        self.tree.insert(&item);
        self.used_bytes.fetch_add(requested, Ordering::Relaxed);
        let items = self.live_items.fetch_add(1, Ordering::Relaxed) + 1;
        drop(chain);

        trace!(used = used + requested, items, "create item");
        Ok((item, PutOutcome::Created))
    }

    fn update_existing(
        &self,
        chain: RwLockUpgradableReadGuard<'_, Chain>,
        pos: usize,
        key: &[u8],
        value: &[u8],
    ) -> Result<(ItemRef, PutOutcome)> {
        let item = Arc::clone(&chain[pos]);
        let old = item.charged_bytes();
        let new = Item::footprint(key.len(), value.len());
        let used = self.used_bytes.load(Ordering::Relaxed);
        let limit = self.config.memory_limit;

        // Signed: a shrinking update is still rejected when usage already sits at the limit.
        if i128::from(used) + i128::from(new) - i128::from(old) >= i128::from(limit) {
            self.unlink(chain, pos);
            debug!(used, old, new, limit, "update rejected: memory limit, entry destroyed");
            return Err(TableError::UpdateRejectedBudget);
        }

        // The chain stays readable: concurrent StartAccess sees the item inactive.
        self.quiescence.retire(&item);

        match item.replace_payload(key, value) {
            Ok(()) => {
                item.activate();
                if new >= old {
                    self.used_bytes.fetch_add(new - old, Ordering::Relaxed);
                } else {
                    self.used_bytes.fetch_sub(old - new, Ordering::Relaxed);
                }
                drop(chain);
                Ok((ItemRef::from(item), PutOutcome::Updated))
            }
            Err(bytes) => {
                self.unlink(chain, pos);
                debug!(bytes, "update rejected: allocation failed, entry destroyed");
                Err(TableError::UpdateRejectedAllocFailure { bytes })
            }
        }
    }

    /// Remove `chain[pos]` from the bucket and the tree, then retire it
    /// while still holding the bucket against other writers.
    fn unlink(&self, chain: RwLockUpgradableReadGuard<'_, Chain>, pos: usize) {
        let mut chain = RwLockUpgradableReadGuard::upgrade(chain);
        let item = chain.remove(pos);
        self.tree.delete(&item);
        let items = self.live_items.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);

        let chain = RwLockWriteGuard::downgrade_to_upgradable(chain);
        if self.quiescence.retire(&item) {
            let freed = item.charged_bytes();
            let used = self
                .used_bytes
                .fetch_sub(freed, Ordering::Relaxed)
                .saturating_sub(freed);
            trace!(used, items, "destroy item");
        }
        drop(chain);
    }
}

fn misuse(msg: &str) -> TableError {
    error!("{}", msg);
    TableError::SetupMisuse(msg.to_string())
}
