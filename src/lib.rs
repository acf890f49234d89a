//! # benchtable
//!
//! The in-memory data engine behind a key-value benchmarking harness:
//! - Sharded hash table with per-bucket locking and 16-bit tag matching
//! - Mark-then-drain item retirement (active flag + reference count)
//! - Complete binary tree index for O(log n) uniform sampling of live keys
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Load Generator / Harness                     │
//! │        (put / delete / start_access / random sample)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      HashTable                               │
//! │          2^P buckets, one RwLock per bucket                  │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ owns                              │ mirrors (bucket → tree)
//!            ▼                                   ▼
//!   ┌─────────────────┐                ┌─────────────────────┐
//!   │      Items      │◄───────────────│ CompleteBinaryTree  │
//!   │ (Arc, refcount) │   node arena   │  (one Mutex)        │
//!   └─────────────────┘                └─────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod hash;

pub mod item;
pub mod protocol;
pub mod table;
pub mod tree;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, KeyMatch};
pub use error::{Result, TableError};
pub use item::{Item, ItemGuard, ItemRef};
pub use table::{HashTable, PutOutcome, TableStats};
pub use tree::CompleteBinaryTree;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of benchtable
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
