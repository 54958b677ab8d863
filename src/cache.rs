//! Lazily-revalidated key-to-index cache for the ordered store.
//!
//! The cache maps selection keys to their last-known index, paired with a
//! single stale-from marker. Invariant: every cached index strictly below
//! the marker is correct for a key that is still present; entries at or past
//! the marker are unverified. `None` means the whole cache is valid,
//! `Some(0)` means nothing is trusted.
//!
//! Mutations only ever pull the marker down to the first shifted position;
//! lookups heal the cache back up as they scan (see `KeyedList::index_of`).

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub(crate) struct PositionCache<K> {
    positions: HashMap<K, usize>,
    stale_from: Option<usize>,
}

impl<K: Eq + Hash> PositionCache<K> {
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
            stale_from: None,
        }
    }

    /// Record the position of a key. Recording never widens the trusted
    /// region; entries past the marker stay unverified until a scan passes
    /// over them.
    pub fn record(&mut self, key: K, index: usize) {
        self.positions.insert(key, index);
    }

    /// Cached index for `key`, iff it lies strictly below the stale marker.
    pub fn trusted(&self, key: &K) -> Option<usize> {
        let index = *self.positions.get(key)?;
        match self.stale_from {
            None => Some(index),
            Some(stale) if index < stale => Some(index),
            Some(_) => None,
        }
    }

    pub fn stale_from(&self) -> Option<usize> {
        self.stale_from
    }

    /// Mark everything at or past `index` unverified.
    pub fn invalidate_from(&mut self, index: usize) {
        self.stale_from = Some(match self.stale_from {
            Some(stale) => stale.min(index),
            None => index,
        });
    }

    /// Advance the verified region up to (but not including) `index`.
    /// Only ever moves the marker forward.
    pub fn advance_to(&mut self, index: usize) {
        if let Some(stale) = self.stale_from {
            if index > stale {
                self.stale_from = Some(index);
            }
        }
    }

    /// A full scan reached the end: the whole cache is verified again.
    pub fn mark_all_valid(&mut self) {
        self.stale_from = None;
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.stale_from = None;
    }
}
