//! Item Module
//!
//! The unit of storage shared by the hash table and the tree index.
//!
//! ## Layout
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Item                                         │
//! │ ┌──────────┬────────────────────────────────┐│
//! │ │ payload  │ key bytes | value bytes        ││  (one allocation)
//! │ ├──────────┼────────────────────────────────┤│
//! │ │ hash/tag │ placement + chain disambiguator││
//! │ │ active   │ visible to new readers         ││
//! │ │ refs     │ in-flight readers              ││
//! │ │ node     │ slot in the tree arena         ││
//! │ └──────────┴────────────────────────────────┘│
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//! Items are created only by a table insert and shared through `Arc`. The
//! bucket chain and the tree index each hold one clone while the item is
//! live; readers hold further clones through [`ItemGuard`].

mod handle;

pub use handle::{ItemGuard, ItemRef};

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};

use crate::error::{Result, TableError};
use crate::hash::KeyHash;

/// Keys are stored with a 12-bit length field
pub const MAX_KEY_LEN: usize = (1 << 12) - 1;

/// Values are stored with a 20-bit length field
pub const MAX_VALUE_LEN: usize = (1 << 20) - 1;

/// Marker for "not linked into any tree"
pub(crate) const NO_NODE: usize = usize::MAX;


/// Key and value bytes in one buffer, key first
struct Payload {
    data: Vec<u8>,
    key_len: u16,
    value_len: u32,
}

impl Payload {
    /// Build a payload, reporting the requested size if allocation fails
    fn try_new(key: &[u8], value: &[u8]) -> std::result::Result<Self, usize> {
        let total = key.len() + value.len();
        #[cfg(test)]
        if fault::take_allocation_failure() {
            return Err(total);
        }
        let mut data = Vec::new();
        data.try_reserve_exact(total).map_err(|_| total)?;
        data.extend_from_slice(key);
        data.extend_from_slice(value);

        Ok(Self {
            data,
            key_len: key.len() as u16,
            value_len: value.len() as u32,
        })
    }

    fn key(&self) -> &[u8] {
        &self.data[..self.key_len as usize]
    }

    fn value(&self) -> &[u8] {
        &self.data[self.key_len as usize..]
    }
}

/// A stored key-value pair plus its reclamation state
pub struct Item {
    payload: RwLock<Payload>,
    hash: u64,
    tag: u16,

    /// Cleared before the item is drained and removed or rewritten
    active: AtomicBool,

    /// Readers currently pinning this item
    ref_count: AtomicU32,

    /// Successful pins over the item's lifetime
    requests: AtomicU64,

    /// Arena slot in the tree index. Only touched under the tree lock.
    node: AtomicUsize,
}

impl Item {
    /// Create a standalone active item.
    ///
    /// Fails when either length exceeds its field width or the buffer cannot
    /// be allocated.
    pub fn new(key: &[u8], value: &[u8]) -> Result<Self> {
        check_lengths(key, value)?;
        Self::with_hash(key, value, KeyHash::of(key))
            .map_err(|bytes| TableError::AllocationFailure { bytes })
    }

    /// Create an item whose key has already been hashed. Lengths must have
    /// been checked by the caller.
    pub(crate) fn with_hash(
        key: &[u8],
        value: &[u8],
        kh: KeyHash,
    ) -> std::result::Result<Self, usize> {
        let payload = Payload::try_new(key, value)?;

        Ok(Self {
            payload: RwLock::new(payload),
            hash: kh.hash,
            tag: kh.tag,
            active: AtomicBool::new(true),
            ref_count: AtomicU32::new(0),
            requests: AtomicU64::new(0),
            node: AtomicUsize::new(NO_NODE),
        })
    }

    /// Bytes charged against the memory budget for an entry of this shape
    pub fn footprint(key_len: usize, value_len: usize) -> u64 {
        (mem::size_of::<Item>() + key_len + value_len) as u64
    }

    /// Bytes this item currently charges against the memory budget
    pub fn charged_bytes(&self) -> u64 {
        let payload = self.payload.read();
        Self::footprint(payload.key_len as usize, payload.value_len as usize)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn key(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.payload.read(), |p| p.key())
    }

    pub fn value(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.payload.read(), |p| p.value())
    }

    pub fn key_len(&self) -> usize {
        self.payload.read().key_len as usize
    }

    pub fn value_len(&self) -> usize {
        self.payload.read().value_len as usize
    }

    pub fn tag(&self) -> u16 {
        self.tag
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Compare the stored key against `key` byte for byte
    pub fn key_eq(&self, key: &[u8]) -> bool {
        self.payload.read().key() == key
    }

    // =========================================================================
    // Reclamation State (crate-internal)
    // =========================================================================

    /// Add a reader. Returns the reference count before the increment.
    pub(crate) fn pin(&self) -> u32 {
        self.ref_count.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop a reader. Returns the reference count before the decrement.
    pub(crate) fn unpin(&self) -> u32 {
        self.ref_count.fetch_sub(1, Ordering::SeqCst)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub(crate) fn activate(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    /// Swap in new key/value bytes. On allocation failure the old payload is
    /// left untouched and the requested size is returned.
    pub(crate) fn replace_payload(
        &self,
        key: &[u8],
        value: &[u8],
    ) -> std::result::Result<(), usize> {
        let fresh = Payload::try_new(key, value)?;
        *self.payload.write() = fresh;
        Ok(())
    }

    pub(crate) fn node(&self) -> usize {
        self.node.load(Ordering::Relaxed)
    }

    pub(crate) fn set_node(&self, node: usize) {
        self.node.store(node, Ordering::Relaxed);
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("key_len", &self.key_len())
            .field("value_len", &self.value_len())
            .field("tag", &format_args!("{:#06x}", self.tag))
            .field("hash", &format_args!("{:#018x}", self.hash))
            .field("active", &self.is_active())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Reject keys and values that do not fit their length fields
pub(crate) fn check_lengths(key: &[u8], value: &[u8]) -> Result<()> {
    if key.len() > MAX_KEY_LEN {
        return Err(TableError::KeyTooLong {
            len: key.len(),
            max: MAX_KEY_LEN,
        });
    }
    if value.len() > MAX_VALUE_LEN {
        return Err(TableError::ValueTooLong {
            len: value.len(),
            max: MAX_VALUE_LEN,
        });
    }
    Ok(())
}
