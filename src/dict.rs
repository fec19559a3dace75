//! Dict: thread-safe, reference-counted string dictionary over `HashTable`.
//!
//! Each distinct string is stored once as a canonical `Arc<CString>`. Every
//! insert of an equal string bumps the record's count and returns the same
//! canonical pointer; every remove drops one count and the record goes away
//! when the count reaches zero. One mutex guards the table; copying the
//! caller's bytes into a fresh buffer happens before the lock is taken.

use crate::error::Error;
use crate::hash::hash_bytes;
use crate::hash_table::{EqMode, HashTable, Insert, ResizeMode, TableConfig, MIN_SIZE};
use crate::interned::Interned;
use parking_lot::Mutex;
use std::ffi::{CStr, CString};
use std::sync::Arc;
use tracing::{debug, warn};

/// Initial table size of a dictionary.
pub const DICT_INITIAL_SIZE: u32 = 1024;

#[derive(Debug)]
struct DictRecord {
    value: Arc<CString>,
    refcount: u32,
}

fn record_eq(a: &DictRecord, b: &DictRecord, _mode: EqMode) -> bool {
    a.value.as_bytes() == b.value.as_bytes()
}

/// A string that was still referenced when its dictionary was cleaned up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leak {
    pub value: Arc<CString>,
    pub refcount: u32,
}

/// Bytes up to (excluding) the first nul, or the whole span.
fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

/// Copy `span` into a freshly allocated, nul-terminated buffer.
fn copy_to_cstring(span: &[u8]) -> Result<CString, Error> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(span.len() + 1)
        .map_err(|_| Error::OutOfMemory)?;
    buf.extend_from_slice(span);
    CString::new(buf).map_err(|_| Error::InvalidArgument("string contains a nul byte"))
}

pub struct Dict {
    table: Mutex<HashTable<DictRecord>>,
}

impl Dict {
    pub fn new() -> Result<Self, Error> {
        Self::with_config(TableConfig {
            initial_size: DICT_INITIAL_SIZE,
            min_size: MIN_SIZE,
            resize: ResizeMode::GrowAndShrink,
        })
    }

    pub fn with_config(config: TableConfig) -> Result<Self, Error> {
        Ok(Self {
            table: Mutex::new(HashTable::with_config(config, record_eq)?),
        })
    }

    /// Number of distinct strings stored.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    /// Current table size (buckets).
    pub fn capacity(&self) -> u32 {
        self.table.lock().size()
    }

    /// Insert a copy of `value`.
    ///
    /// With `len == 0` the string runs to the first nul byte (or the end of
    /// the slice); otherwise exactly `len` bytes are taken, which must not
    /// contain a nul. `None` is accepted and yields `None`.
    pub fn insert(&self, value: Option<&[u8]>, len: usize) -> Result<Option<Arc<CString>>, Error> {
        let Some(value) = value else {
            return Ok(None);
        };
        let span = if len == 0 {
            until_nul(value)
        } else {
            value
                .get(..len)
                .ok_or(Error::InvalidArgument("length exceeds the input"))?
        };
        let copy = copy_to_cstring(span)?;
        self.insert_owned(Arc::new(copy)).map(Some)
    }

    /// Insert a copy of `value`, cut at its first nul like `insert(.., 0)`.
    pub fn insert_str(&self, value: &str) -> Result<Arc<CString>, Error> {
        let copy = copy_to_cstring(until_nul(value.as_bytes()))?;
        self.insert_owned(Arc::new(copy))
    }

    /// Insert an already owned buffer without copying it. If an equal string
    /// is already stored, `value` is dropped and the stored one is returned.
    pub fn insert_zc(&self, value: Option<CString>) -> Result<Option<Arc<CString>>, Error> {
        match value {
            Some(value) => self.insert_owned(Arc::new(value)).map(Some),
            None => Ok(None),
        }
    }

    /// Take one more reference on `value`, storing it as the canonical
    /// buffer if no equal string is present.
    pub(crate) fn insert_owned(&self, value: Arc<CString>) -> Result<Arc<CString>, Error> {
        let hash = hash_bytes(value.as_bytes());
        let mut table = self.table.lock();
        debug!(value = ?value, "inserting into dictionary");

        let rec = DictRecord {
            value: Arc::clone(&value),
            refcount: 1,
        };
        match table.insert(rec, hash) {
            Ok(Insert::Inserted(_)) => Ok(value),
            Ok(Insert::Exists { existing, rejected }) => {
                drop(rejected);
                existing.refcount = existing
                    .refcount
                    .checked_add(1)
                    .ok_or(Error::RefcountOverflow)?;
                Ok(Arc::clone(&existing.value))
            }
            Err(Error::OutOfMemory) => {
                // A grow after linking failed: unlink the new record again so
                // none is left without an owner. When the grow ran before
                // linking there is nothing to unlink and NotFound is expected.
                let _ = table.remove_with(hash, |r| Arc::ptr_eq(&r.value, &value));
                Err(Error::OutOfMemory)
            }
            Err(e) => Err(e),
        }
    }

    /// Take one more reference on the record whose canonical buffer is `value`.
    ///
    /// Unlike `insert_owned` this never stores anything: if the record is gone
    /// or was replaced by an equal string, it is `Error::NotFound`.
    pub(crate) fn retain(&self, value: &Arc<CString>) -> Result<(), Error> {
        let hash = hash_bytes(value.as_bytes());
        let mut table = self.table.lock();
        let rec = table
            .find_with_mut(hash, |r| Arc::ptr_eq(&r.value, value))
            .ok_or(Error::NotFound)?;
        rec.refcount = rec.refcount.checked_add(1).ok_or(Error::RefcountOverflow)?;
        Ok(())
    }

    /// Release one reference on the string equal to `value` (cut at its first nul).
    ///
    /// The record and its buffer are freed when the last reference goes.
    /// Removing a string that is not stored is `Error::NotFound`.
    pub fn remove(&self, value: &[u8]) -> Result<(), Error> {
        let value = until_nul(value);
        let hash = hash_bytes(value);
        let mut table = self.table.lock();
        debug!(value = %String::from_utf8_lossy(value), "removing from dictionary");

        let Some(rec) = table.find_with_mut(hash, |r| r.value.as_bytes() == value) else {
            debug!(value = %String::from_utf8_lossy(value), "value not found in dictionary");
            return Err(Error::NotFound);
        };
        rec.refcount -= 1;
        if rec.refcount == 0 {
            let removed = table.remove_with(hash, |r| r.value.as_bytes() == value)?;
            drop(removed);
        }
        Ok(())
    }

    /// Current reference count of the string equal to `value`, if stored.
    pub fn refcount(&self, value: &[u8]) -> Option<u32> {
        let value = until_nul(value);
        let table = self.table.lock();
        table
            .find_with(hash_bytes(value), |r| r.value.as_bytes() == value)
            .map(|r| r.refcount)
    }

    pub fn contains(&self, value: &[u8]) -> bool {
        self.refcount(value).is_some()
    }

    /// Intern `value` and return a handle that releases its reference on drop.
    pub fn intern(&self, value: &str) -> Result<Interned<'_>, Error> {
        let canonical = self.insert_str(value)?;
        Ok(Interned::new(self, canonical))
    }

    /// Look up `value` and, if stored, take a reference on it.
    pub fn get(&self, value: &CStr) -> Option<Interned<'_>> {
        let bytes = value.to_bytes();
        let hash = hash_bytes(bytes);
        let mut table = self.table.lock();
        let rec = table.find_with_mut(hash, |r| r.value.as_bytes() == bytes)?;
        let Some(refcount) = rec.refcount.checked_add(1) else {
            warn!(value = ?rec.value, "reference count overflow");
            return None;
        };
        rec.refcount = refcount;
        let canonical = Arc::clone(&rec.value);
        drop(table);
        Some(Interned::new(self, canonical))
    }

    /// Shut the dictionary down, reporting every string still referenced.
    pub fn clean(mut self) -> Vec<Leak> {
        self.drain_leaks()
    }

    fn drain_leaks(&mut self) -> Vec<Leak> {
        self.table
            .get_mut()
            .drain()
            .map(|rec| {
                warn!(
                    value = ?rec.value,
                    refcount = rec.refcount,
                    "string not freed from the dictionary"
                );
                Leak {
                    value: rec.value,
                    refcount: rec.refcount,
                }
            })
            .collect()
    }
}

impl Drop for Dict {
    fn drop(&mut self) {
        let _ = self.drain_leaks();
    }
}

impl core::fmt::Debug for Dict {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dict").field("table", &*self.table.lock()).finish()
    }
}
