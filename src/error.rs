//! Error type shared by the table engine and the dictionary.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// A caller-supplied argument was rejected before any state changed.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Allocating table storage or a string buffer failed.
    #[error("memory allocation failed")]
    OutOfMemory,
    /// Every record slot is occupied and resizing is disabled.
    #[error("hash table is full ({size} records) and resizing is disabled")]
    Full { size: u32 },
    /// A string's reference count cannot be raised any further.
    #[error("reference count overflow")]
    RefcountOverflow,
    /// The value is not present in the table.
    #[error("value not found")]
    NotFound,
}
