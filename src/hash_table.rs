//! HashTable: index-chained hash table over a fixed-capacity record arena.
//!
//! Buckets hold the first and last slot index of their collision chain;
//! every slot carries its stored hash and the index of the next slot, which
//! continues either a collision chain or the free list. `size` is both the
//! bucket count and the slot count and is always a power of two.

use crate::error::Error;
use core::fmt;
use tracing::{trace, warn};

/// Smallest number of buckets a table ever has.
pub const MIN_SIZE: u32 = 8;

const HUNDRED_PERCENT: u64 = 100;
/// Grow (double) once at least this full.
const ENLARGE_PERCENT: u64 = 75;
/// Shrinking is armed only after the table was once this full.
const FIRST_SHRINK_PERCENT: u64 = 50;
/// Shrink (halve) once less than this full.
const SHRINK_PERCENT: u64 = 25;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResizeMode {
    Disabled,
    Grow,
    GrowAndShrink,
}

impl ResizeMode {
    fn grows(self) -> bool {
        !matches!(self, ResizeMode::Disabled)
    }

    fn shrinks(self) -> bool {
        matches!(self, ResizeMode::GrowAndShrink)
    }
}

/// Why the equality callback is being asked.
///
/// `Modify` is passed for duplicate detection on insert and for locating the
/// record a remove unlinks; `Lookup` is passed by `find`. Relocation during a
/// resize works from stored hashes and never consults the callback.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EqMode {
    Modify,
    Lookup,
}

/// Content-equality predicate: `(probe, stored, mode)`.
pub type ValueEq<V> = dyn Fn(&V, &V, EqMode) -> bool + Send + Sync;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableConfig {
    /// Initial bucket count; rounded up to a power of two.
    pub initial_size: u32,
    /// Floor for shrinking; rounded up to a power of two, never below `MIN_SIZE`.
    pub min_size: u32,
    pub resize: ResizeMode,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_size: MIN_SIZE,
            min_size: MIN_SIZE,
            resize: ResizeMode::GrowAndShrink,
        }
    }
}

#[derive(Debug)]
struct Slot<V> {
    hash: u32,
    next: Option<u32>, // collision chain or free list
    val: Option<V>,
}

#[derive(Copy, Clone, Debug, Default)]
struct Bucket {
    first: Option<u32>,
    last: Option<u32>,
}

/// Outcome of a successful insert call.
#[derive(Debug)]
pub enum Insert<'a, V> {
    /// The value was stored; the reference points at its new home.
    Inserted(&'a mut V),
    /// An equal value was already stored; the probe is handed back untouched.
    Exists { existing: &'a mut V, rejected: V },
}

pub struct HashTable<V> {
    used: u32,
    size: u32,
    min_size: u32,
    resize: ResizeMode,
    shrink_armed: bool,
    first_free: Option<u32>,
    buckets: Vec<Bucket>,
    slots: Vec<Slot<V>>,
    val_equal: Box<ValueEq<V>>,
    #[cfg(test)]
    fail_resizes: bool,
}

fn round_size(n: u32) -> u32 {
    n.max(MIN_SIZE)
        .checked_next_power_of_two()
        .unwrap_or(1 << 31)
}

/// Allocate `size` empty buckets and `size` free slots chained in index order.
fn alloc_arrays<V>(size: u32) -> Result<(Vec<Bucket>, Vec<Slot<V>>), Error> {
    let len = size as usize;
    let mut buckets = Vec::new();
    buckets
        .try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory)?;
    buckets.resize(len, Bucket::default());

    let mut slots = Vec::new();
    slots.try_reserve_exact(len).map_err(|_| Error::OutOfMemory)?;
    slots.extend((0..size).map(|i| Slot {
        hash: 0,
        next: (i + 1 < size).then_some(i + 1),
        val: None,
    }));
    Ok((buckets, slots))
}

impl<V> HashTable<V> {
    pub fn new<F>(initial_size: u32, resize: ResizeMode, val_equal: F) -> Result<Self, Error>
    where
        F: Fn(&V, &V, EqMode) -> bool + Send + Sync + 'static,
    {
        Self::with_config(
            TableConfig {
                initial_size,
                resize,
                ..TableConfig::default()
            },
            val_equal,
        )
    }

    pub fn with_config<F>(config: TableConfig, val_equal: F) -> Result<Self, Error>
    where
        F: Fn(&V, &V, EqMode) -> bool + Send + Sync + 'static,
    {
        let min_size = round_size(config.min_size);
        let size = round_size(config.initial_size).max(min_size);
        let (buckets, slots) = alloc_arrays(size)?;
        Ok(Self {
            used: 0,
            size,
            min_size,
            resize: config.resize,
            shrink_armed: false,
            first_free: Some(0),
            buckets,
            slots,
            val_equal: Box::new(val_equal),
            #[cfg(test)]
            fail_resizes: false,
        })
    }

    pub fn len(&self) -> usize {
        self.used as usize
    }
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Current number of buckets (and record slots).
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn min_size(&self) -> u32 {
        self.min_size
    }

    pub fn resize_mode(&self) -> ResizeMode {
        self.resize
    }

    pub fn set_resize_mode(&mut self, resize: ResizeMode) {
        self.resize = resize;
    }

    #[inline]
    fn bucket_of(&self, hash: u32) -> usize {
        (hash & (self.size - 1)) as usize
    }

    fn fill_percent(&self) -> u64 {
        self.used as u64 * HUNDRED_PERCENT / self.size as u64
    }

    fn value(&self, idx: u32) -> &V {
        self.slots[idx as usize]
            .val
            .as_ref()
            .expect("chained slot must be occupied")
    }

    fn value_mut(&mut self, idx: u32) -> &mut V {
        self.slots[idx as usize]
            .val
            .as_mut()
            .expect("chained slot must be occupied")
    }

    /// Walk the bucket chain for `hash`; returns `(predecessor, index)` of the
    /// first record whose stored hash equals `hash` and that `is_match` accepts.
    fn locate<P>(&self, hash: u32, mut is_match: P) -> Option<(Option<u32>, u32)>
    where
        P: FnMut(&V) -> bool,
    {
        let mut prev = None;
        let mut cur = self.buckets[self.bucket_of(hash)].first;
        while let Some(idx) = cur {
            let slot = &self.slots[idx as usize];
            if slot.hash == hash {
                if let Some(v) = &slot.val {
                    if is_match(v) {
                        return Some((prev, idx));
                    }
                }
            }
            prev = cur;
            cur = slot.next;
        }
        None
    }

    pub fn find(&self, probe: &V, hash: u32) -> Option<&V> {
        let eq = &self.val_equal;
        let (_, idx) = self.locate(hash, |stored| eq(probe, stored, EqMode::Lookup))?;
        Some(self.value(idx))
    }

    pub fn find_mut(&mut self, probe: &V, hash: u32) -> Option<&mut V> {
        let eq = &self.val_equal;
        let (_, idx) = self.locate(hash, |stored| eq(probe, stored, EqMode::Lookup))?;
        Some(self.value_mut(idx))
    }

    /// Find by a borrowed probe: `is_match` sees only records whose stored hash matches.
    pub fn find_with<P>(&self, hash: u32, is_match: P) -> Option<&V>
    where
        P: FnMut(&V) -> bool,
    {
        let (_, idx) = self.locate(hash, is_match)?;
        Some(self.value(idx))
    }

    pub fn find_with_mut<P>(&mut self, hash: u32, is_match: P) -> Option<&mut V>
    where
        P: FnMut(&V) -> bool,
    {
        let (_, idx) = self.locate(hash, is_match)?;
        Some(self.value_mut(idx))
    }

    /// Insert `value` under `hash`, growing afterwards if the table got too full.
    ///
    /// On `Err(Error::OutOfMemory)` from the trailing grow, the value is
    /// already linked and the table keeps its previous size.
    pub fn insert(&mut self, value: V, hash: u32) -> Result<Insert<'_, V>, Error> {
        let existing = {
            let eq = &self.val_equal;
            self.locate(hash, |stored| eq(&value, stored, EqMode::Modify))
        };
        self.insert_at(value, hash, existing.map(|(_, idx)| idx))
    }

    /// Like `insert`, but duplicate detection uses `eq` instead of the
    /// table's own callback.
    pub fn insert_with_eq(
        &mut self,
        value: V,
        hash: u32,
        eq: &ValueEq<V>,
    ) -> Result<Insert<'_, V>, Error> {
        let existing = self.locate(hash, |stored| eq(&value, stored, EqMode::Modify));
        self.insert_at(value, hash, existing.map(|(_, idx)| idx))
    }

    fn insert_at(
        &mut self,
        value: V,
        hash: u32,
        existing: Option<u32>,
    ) -> Result<Insert<'_, V>, Error> {
        if let Some(idx) = existing {
            return Ok(Insert::Exists {
                existing: self.value_mut(idx),
                rejected: value,
            });
        }

        let idx = match self.first_free {
            Some(idx) => idx,
            None => {
                // Only reachable after an earlier grow failed or with resizing disabled.
                if !self.resize.grows() {
                    return Err(Error::Full { size: self.size });
                }
                let doubled = self.size.checked_mul(2).ok_or(Error::OutOfMemory)?;
                self.resize_to(doubled, None)?;
                self.first_free.expect("grown table must have a free slot")
            }
        };

        let slot = &mut self.slots[idx as usize];
        self.first_free = slot.next;
        slot.hash = hash;
        slot.next = None;
        slot.val = Some(value);
        self.link_tail(idx, hash);
        self.used += 1;

        let fill = self.fill_percent();
        if self.resize.shrinks() && fill >= FIRST_SHRINK_PERCENT {
            self.shrink_armed = true;
        }
        let idx = if self.resize.grows() && fill >= ENLARGE_PERCENT {
            let doubled = self.size.checked_mul(2).ok_or(Error::OutOfMemory)?;
            self.resize_to(doubled, Some(idx))?
                .expect("resized table must keep the inserted record")
        } else {
            idx
        };
        Ok(Insert::Inserted(self.value_mut(idx)))
    }

    fn link_tail(&mut self, idx: u32, hash: u32) {
        let b = self.bucket_of(hash);
        match self.buckets[b].last {
            Some(last) => self.slots[last as usize].next = Some(idx),
            None => self.buckets[b].first = Some(idx),
        }
        self.buckets[b].last = Some(idx);
    }

    pub fn remove(&mut self, probe: &V, hash: u32) -> Result<V, Error> {
        let found = {
            let eq = &self.val_equal;
            self.locate(hash, |stored| eq(probe, stored, EqMode::Modify))
        };
        let (prev, idx) = found.ok_or(Error::NotFound)?;
        Ok(self.remove_at(prev, idx))
    }

    /// Remove by a borrowed probe, see `find_with`.
    pub fn remove_with<P>(&mut self, hash: u32, is_match: P) -> Result<V, Error>
    where
        P: FnMut(&V) -> bool,
    {
        let (prev, idx) = self.locate(hash, is_match).ok_or(Error::NotFound)?;
        Ok(self.remove_at(prev, idx))
    }

    fn remove_at(&mut self, prev: Option<u32>, idx: u32) -> V {
        let b = self.bucket_of(self.slots[idx as usize].hash);
        let next = self.slots[idx as usize].next;
        match prev {
            Some(p) => self.slots[p as usize].next = next,
            None => self.buckets[b].first = next,
        }
        if self.buckets[b].last == Some(idx) {
            self.buckets[b].last = prev;
        }

        let slot = &mut self.slots[idx as usize];
        let value = slot.val.take().expect("removed slot must be occupied");
        slot.next = self.first_free;
        self.first_free = Some(idx);
        self.used -= 1;

        if self.resize.shrinks()
            && self.shrink_armed
            && self.fill_percent() < SHRINK_PERCENT
            && self.size > self.min_size
        {
            // The removal is committed; a failed shrink only leaves extra capacity.
            if let Err(e) = self.resize_to(self.size / 2, None) {
                warn!(size = self.size, error = %e, "hash table shrink failed");
            }
        }
        value
    }

    /// Rebuild storage at `new_size`, relinking every record by its stored hash.
    /// Returns the new index of `track` if it named an occupied slot.
    fn resize_to(&mut self, new_size: u32, track: Option<u32>) -> Result<Option<u32>, Error> {
        debug_assert!(new_size.is_power_of_two());
        debug_assert!(self.used <= new_size);
        #[cfg(test)]
        self.injected_resize_failure()?;
        let (buckets, slots) = alloc_arrays::<V>(new_size)?;

        trace!(from = self.size, to = new_size, used = self.used, "resizing hash table");
        let old_slots = core::mem::replace(&mut self.slots, slots);
        self.buckets = buckets;
        self.size = new_size;

        let mut tracked = None;
        let mut n: u32 = 0;
        for (old_idx, old) in old_slots.into_iter().enumerate() {
            let Some(val) = old.val else { continue };
            let slot = &mut self.slots[n as usize];
            slot.hash = old.hash;
            slot.next = None;
            slot.val = Some(val);
            self.link_tail(n, old.hash);
            if track == Some(old_idx as u32) {
                tracked = Some(n);
            }
            n += 1;
        }
        // Slots n.. are still chained in index order from allocation.
        self.first_free = (n < new_size).then_some(n);
        Ok(tracked)
    }

    /// Iterate stored values in bucket/chain order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            table: self,
            bucket: 0,
            cur: None,
        }
    }

    /// Remove and return every stored value; the table keeps its size.
    pub fn drain(&mut self) -> std::vec::IntoIter<V> {
        let mut out = Vec::with_capacity(self.used as usize);
        for b in 0..self.buckets.len() {
            let mut cur = self.buckets[b].first;
            while let Some(idx) = cur {
                let slot = &mut self.slots[idx as usize];
                cur = slot.next;
                out.extend(slot.val.take());
            }
            self.buckets[b] = Bucket::default();
        }
        let size = self.size;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            let i = i as u32;
            slot.next = (i + 1 < size).then_some(i + 1);
        }
        self.first_free = Some(0);
        self.used = 0;
        out.into_iter()
    }

    /// Make every following resize fail as if allocation had failed.
    #[cfg(test)]
    pub(crate) fn fail_resizes(&mut self, on: bool) {
        self.fail_resizes = on;
    }

    #[cfg(test)]
    fn injected_resize_failure(&self) -> Result<(), Error> {
        if self.fail_resizes {
            return Err(Error::OutOfMemory);
        }
        Ok(())
    }

    /// Structural self-check used by tests.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        assert!(self.size.is_power_of_two());
        assert!(self.size >= self.min_size);
        assert_eq!(self.buckets.len(), self.size as usize);
        assert_eq!(self.slots.len(), self.size as usize);

        let mut seen = vec![false; self.size as usize];
        let mut chained = 0u32;
        for (b, bucket) in self.buckets.iter().enumerate() {
            let mut last = None;
            let mut cur = bucket.first;
            while let Some(idx) = cur {
                let slot = &self.slots[idx as usize];
                assert!(!seen[idx as usize], "slot {} linked twice", idx);
                seen[idx as usize] = true;
                assert!(slot.val.is_some(), "chained slot {} is free", idx);
                assert_eq!(self.bucket_of(slot.hash), b, "slot {} in wrong bucket", idx);
                chained += 1;
                last = cur;
                cur = slot.next;
            }
            assert_eq!(bucket.last, last, "bucket {} tail mismatch", b);
        }
        assert_eq!(chained, self.used);

        let mut cur = self.first_free;
        let mut free = 0u32;
        while let Some(idx) = cur {
            assert!(!seen[idx as usize], "free slot {} also linked", idx);
            seen[idx as usize] = true;
            assert!(self.slots[idx as usize].val.is_none());
            free += 1;
            cur = self.slots[idx as usize].next;
        }
        assert_eq!(chained + free, self.size);
    }
}

impl<V> fmt::Debug for HashTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTable")
            .field("used", &self.used)
            .field("size", &self.size)
            .field("min_size", &self.min_size)
            .field("resize", &self.resize)
            .field("shrink_armed", &self.shrink_armed)
            .finish_non_exhaustive()
    }
}

/// Iterator over stored values in bucket/chain order.
pub struct Iter<'a, V> {
    table: &'a HashTable<V>,
    bucket: usize,
    cur: Option<u32>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        let table = self.table;
        loop {
            if let Some(idx) = self.cur {
                self.cur = table.slots[idx as usize].next;
                return Some(table.value(idx));
            }
            if self.bucket >= table.buckets.len() {
                return None;
            }
            self.cur = table.buckets[self.bucket].first;
            self.bucket += 1;
        }
    }
}
