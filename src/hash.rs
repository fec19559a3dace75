//! Jenkins one-at-a-time hash over byte spans.
//!
//! Every dictionary operation hashes the string content with this function,
//! so identical bytes always land in the same bucket regardless of table
//! size. The table itself only ever sees the resulting `u32`.

/// Incremental one-at-a-time hasher.
///
/// Feeding several spans through `update` yields the same hash as feeding
/// their concatenation once.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct OneAtATime {
    state: u32,
}

impl OneAtATime {
    pub const fn new() -> Self {
        Self { state: 0 }
    }

    #[inline]
    pub fn update(mut self, bytes: &[u8]) -> Self {
        let mut h = self.state;
        for &b in bytes {
            h = h.wrapping_add(b as u32);
            h = h.wrapping_add(h << 10);
            h ^= h >> 6;
        }
        self.state = h;
        self
    }

    /// Finalize (avalanche) the accumulated state.
    #[inline]
    pub fn finish(self) -> u32 {
        let mut h = self.state;
        h = h.wrapping_add(h << 3);
        h ^= h >> 11;
        h = h.wrapping_add(h << 15);
        h
    }
}

/// Hash one byte span.
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    OneAtATime::new().update(bytes).finish()
}
