//! Instance-owned slot table
//!
//! Every host instance owns one `Slots`. An accessor finds its slot by
//! `AccessorId`, so accessors sharing a label never share a slot.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use ahash::RandomState;

use crate::accessor::AccessorId;
use crate::stats::CacheStats;

/// Types that own a slot table for their cached accessors
pub trait CacheHost {
    /// The instance's slot table
    fn slots(&self) -> &Slots;
}

/// Per-instance cache slots, at most one value per accessor
pub struct Slots {
    values: RefCell<HashMap<AccessorId, Box<dyn Any>, RandomState>>,
    stats: CacheStats,
}

impl Slots {
    /// Create an empty slot table
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty slot table sized for `capacity` accessors
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: RefCell::new(HashMap::with_capacity_and_hasher(capacity, RandomState::new())),
            stats: CacheStats::new(),
        }
    }

    /// Clone of the value held for `id`, if any
    pub(crate) fn get<V: Clone + 'static>(&self, id: AccessorId) -> Option<V> {
        self.values
            .borrow()
            .get(&id)
            .and_then(|value| value.downcast_ref::<V>())
            .cloned()
    }

    pub(crate) fn insert<V: 'static>(&self, id: AccessorId, value: V) {
        // Replaced values drop after the borrow is released.
        let _old = self.values.borrow_mut().insert(id, Box::new(value));
    }

    /// Clear the slot for `id`. Returns whether a value was held.
    pub(crate) fn invalidate(&self, id: AccessorId) -> bool {
        let old = self.values.borrow_mut().remove(&id);
        let had_value = old.is_some();
        if had_value {
            self.stats.record_invalidation();
        }
        had_value
    }

    /// Whether the slot for `id` holds a value
    pub fn contains(&self, id: AccessorId) -> bool {
        self.values.borrow().contains_key(&id)
    }

    /// Number of non-empty slots
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    /// Check if every slot is empty
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Empty every slot, counting one invalidation per discarded value
    pub fn clear(&self) {
        let old = std::mem::take(&mut *self.values.borrow_mut());
        for _ in 0..old.len() {
            self.stats.record_invalidation();
        }
    }

    /// Hit/miss statistics for this instance
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl Default for Slots {
    fn default() -> Self {
        Self::new()
    }
}

/// Cached values are derivable, so a clone starts empty.
impl Clone for Slots {
    fn clone(&self) -> Self {
        Self::with_capacity(self.len())
    }
}

impl fmt::Debug for Slots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slots")
            .field("len", &self.len())
            .field("stats", &self.stats)
            .finish()
    }
}
