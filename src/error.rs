//! Error types for benchtable
//!
//! Provides a unified error type for all table operations.

use thiserror::Error;

use crate::table::put_flags;

/// Result type alias using TableError
pub type Result<T> = std::result::Result<T, TableError>;

/// Unified error type for benchtable operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    /// No matching item, or the matching item is being retired
    #[error("Key not found")]
    NotFound,

    /// Random sampling on a table with no live items
    #[error("Sampling index is empty")]
    EmptyIndex,

    #[error("Bucket {index} out of range (table size {size})")]
    BucketOutOfRange { index: usize, size: usize },

    // -------------------------------------------------------------------------
    // Budget / Allocation Errors
    // -------------------------------------------------------------------------
    /// A new insert would reach the memory limit. Nothing was mutated.
    #[error("Memory budget exceeded: {used} used + {requested} requested >= limit {limit}")]
    OutOfBudget {
        used: u64,
        requested: u64,
        limit: u64,
    },

    /// An update would reach the memory limit. The old item was destroyed.
    #[error("Update rejected by memory budget; previous entry destroyed")]
    UpdateRejectedBudget,

    /// Allocation for a new item failed. Nothing was mutated.
    #[error("Allocation of {bytes} bytes failed")]
    AllocationFailure { bytes: usize },

    /// Allocation for an update failed. The old item was destroyed.
    #[error("Update allocation of {bytes} bytes failed; previous entry destroyed")]
    UpdateRejectedAllocFailure { bytes: usize },

    // -------------------------------------------------------------------------
    // Input Errors
    // -------------------------------------------------------------------------
    #[error("Key length {len} exceeds maximum {max}")]
    KeyTooLong { len: usize, max: usize },

    #[error("Value length {len} exceeds maximum {max}")]
    ValueTooLong { len: usize, max: usize },

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Setup misuse: {0}")]
    SetupMisuse(String),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TableError {
    /// Numeric put flag reported by the benchmark harness, if this error
    /// came out of a put.
    pub fn put_flags(&self) -> Option<u16> {
        match self {
            TableError::OutOfBudget { .. } => Some(put_flags::NEW_FAIL_MEM_LIMIT),
            TableError::AllocationFailure { .. } => Some(put_flags::NEW_FAIL_OOM),
            TableError::UpdateRejectedBudget => Some(put_flags::UPDATE_FAIL_MEM_LIMIT),
            TableError::UpdateRejectedAllocFailure { .. } => Some(put_flags::UPDATE_FAIL_OOM),
            _ => None,
        }
    }

    /// Whether a failed put destroyed the entry that previously held the key
    pub fn destroyed_existing(&self) -> bool {
        matches!(
            self,
            TableError::UpdateRejectedBudget | TableError::UpdateRejectedAllocFailure { .. }
        )
    }
}
