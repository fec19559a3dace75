//! Interned: RAII handle holding one counted reference in a `Dict`.

use crate::dict::Dict;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;
use std::ffi::{CStr, CString};
use std::sync::Arc;
use tracing::error;

/// A reference to a canonical string inside a `Dict`. Clone takes another
/// dictionary reference; dropping releases one and frees the record when it
/// was the last.
///
/// Handles share their count with `Dict::insert` and `Dict::remove`. A caller
/// that releases a handle's reference through `Dict::remove` detaches it:
/// once its record is gone, clones of the handle hold no reference and
/// dropping them leaves the dictionary alone.
pub struct Interned<'d> {
    dict: &'d Dict,
    value: Arc<CString>,
    counted: bool,
}

impl<'d> Interned<'d> {
    /// Wrap a canonical pointer whose reference was already taken.
    pub(crate) fn new(dict: &'d Dict, value: Arc<CString>) -> Self {
        Self {
            dict,
            value,
            counted: true,
        }
    }

    /// Whether this handle owns a dictionary reference.
    pub fn is_counted(&self) -> bool {
        self.counted
    }

    /// The canonical buffer shared by every equal string in the dictionary.
    pub fn canonical(&self) -> &Arc<CString> {
        &self.value
    }

    pub fn dict(&self) -> &'d Dict {
        self.dict
    }

    /// Borrow as `str` when the stored bytes are UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.value.to_str().ok()
    }
}

impl Deref for Interned<'_> {
    type Target = CStr;

    fn deref(&self) -> &CStr {
        self.value.as_c_str()
    }
}

impl Clone for Interned<'_> {
    fn clone(&self) -> Self {
        let counted = match self.dict.retain(&self.value) {
            Ok(()) => true,
            Err(e) => {
                error!(value = ?self.value, error = %e, "cloned interned string holds no reference");
                false
            }
        };
        Self {
            dict: self.dict,
            value: Arc::clone(&self.value),
            counted,
        }
    }
}

impl Drop for Interned<'_> {
    fn drop(&mut self) {
        if !self.counted {
            return;
        }
        if let Err(e) = self.dict.remove(self.value.as_bytes()) {
            error!(value = ?self.value, error = %e, "releasing interned string failed");
        }
    }
}

impl PartialEq for Interned<'_> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl Eq for Interned<'_> {}

impl Hash for Interned<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.value) as usize).hash(state);
    }
}

impl fmt::Debug for Interned<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.value.as_c_str(), f)
    }
}

impl fmt::Display for Interned<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value.to_string_lossy())
    }
}
