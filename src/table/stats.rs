//! Table statistics snapshot

use std::fmt;

/// Point-in-time view of table metadata.
///
/// Counters are read independently with relaxed ordering, so under
/// concurrent writes the fields may be mutually inconsistent by a few
/// in-flight operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub buckets: usize,
    pub hash_mask: u32,
    pub live_items: u64,
    pub tree_len: u64,
    pub used_bytes: u64,
    pub memory_limit: u64,
}

impl TableStats {
    /// Fraction of the memory budget in use
    pub fn memory_utilization(&self) -> f64 {
        if self.memory_limit == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.memory_limit as f64
    }

    /// Average chain length
    pub fn load_factor(&self) -> f64 {
        if self.buckets == 0 {
            return 0.0;
        }
        self.live_items as f64 / self.buckets as f64
    }
}

impl fmt::Display for TableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "buckets={} items={} tree={} load={:.3} used={}B ({:.2}% of {}B)",
            self.buckets,
            self.live_items,
            self.tree_len,
            self.load_factor(),
            self.used_bytes,
            self.memory_utilization() * 100.0,
            self.memory_limit
        )
    }
}
