//! rc-dict: a thread-safe, reference-counted string dictionary built on a
//! generic, index-chained hash table.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: store each distinct string once per owning context and hand out
//!   a stable canonical pointer to every caller that interns an equal
//!   string, freeing it when the last holder releases it.
//! - Layers:
//!   - HashTable<V>: structural engine over a fixed-capacity record arena.
//!     Buckets index into the arena; collision chains and the free list are
//!     threaded through the slots by index. Generic over the stored value
//!     and a caller-supplied equality callback.
//!   - Dict: one HashTable of `(Arc<CString>, refcount)` records behind one
//!     mutex. Insert-or-increment and decrement-or-free.
//!   - Interned<'d>: RAII handle over Dict; clone takes a reference, drop
//!     releases one.
//!
//! Constraints
//! - The engine has no internal synchronization; Dict drives it only while
//!   holding its lock. Copying caller bytes happens outside the lock.
//! - `size` is a power of two, never below `MIN_SIZE`; grow at 75% full,
//!   shrink below 25% once the table was at least half full.
//! - Each slot stores its hash. Resizing relinks records by stored hash and
//!   never calls the equality callback, so relocation cannot merge records.
//! - Canonical pointers are `Arc<CString>`: a holder that outlives its
//!   dictionary reference keeps a valid buffer, but the dictionary forgets
//!   the string once its count reaches zero.
//!
//! Failure boundaries
//! - Argument errors are raised before any state changes.
//! - Allocation failures surface as `Error::OutOfMemory`. A resize runs only
//!   after the mutation that triggered it committed; the dictionary undoes a
//!   committed insert whose grow failed.
//! - Removing an absent string is `Error::NotFound`, never a silent no-op.
//! - Strings still referenced at cleanup are logged and returned as `Leak`s.

mod dict;
mod error;
pub mod hash;
pub mod hash_table;
mod hash_table_proptest;
mod interned;

// Public surface
pub use dict::{Dict, Leak, DICT_INITIAL_SIZE};
pub use error::Error;
pub use hash::hash_bytes;
pub use hash_table::{EqMode, HashTable, Insert, ResizeMode, TableConfig, MIN_SIZE};
pub use interned::Interned;
