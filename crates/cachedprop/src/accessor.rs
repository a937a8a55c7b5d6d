//! Accessor: lazily computed, per-instance cached attribute
//!
//! An `Accessor` is shared by every instance of a host type and never holds
//! instance state. The cached value lives in the instance's `Slots`.
//!
//! Slot lifecycle:
//! - `read` on an empty slot computes once and stores the result
//! - `write` and `remove` run the bound function, then clear the slot
//!
//! Mutating backing state without going through `write` leaves the slot
//! stale until `write`, `remove` or `invalidate` is called.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::slots::CacheHost;

static NEXT_ACCESSOR_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity keying an accessor's slot in each instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccessorId(u64);

impl AccessorId {
    pub(crate) fn next() -> Self {
        AccessorId(NEXT_ACCESSOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id
    pub fn get(self) -> u64 {
        self.0
    }
}

accessor_bindings! {
    /// Cached attribute of host type `T` with value type `V`
    pub struct Accessor {
        compute: [Fn(&T) -> V],
        write: [Fn(&mut T, V)],
        remove: [Fn(&mut T)],
    }
}

impl<T, V> Accessor<T, V>
where
    T: CacheHost,
    V: Clone + 'static,
{
    /// Create a read-only accessor
    ///
    /// # Arguments
    /// * `label` - Name reported in errors and logs
    /// * `compute` - Derives the value from the instance
    pub fn new<F>(label: &'static str, compute: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        Self {
            compute: Some(Arc::new(compute)),
            ..Self::unbound(label)
        }
    }

    /// Read the value, computing it only if the instance's slot is empty
    ///
    /// # Returns
    /// * `Result<V>` - Cached or freshly computed value
    pub fn read(&self, obj: &T) -> Result<V> {
        let compute = self.compute.as_ref().ok_or(Error::Unreadable(self.label))?;
        let slots = obj.slots();

        if let Some(value) = slots.get::<V>(self.id) {
            slots.stats().record_hit();
            trace!(label = self.label, "cached read");
            return Ok(value);
        }

        slots.stats().record_miss();
        trace!(label = self.label, "computing");
        // No borrow of the slot table is held here, so compute may read
        // other accessors on the same instance.
        let value = compute(obj);
        slots.insert(self.id, value.clone());
        Ok(value)
    }

    /// Run the write function, then clear the instance's slot
    ///
    /// The value is not stored; the next `read` recomputes it.
    pub fn write(&self, obj: &mut T, value: V) -> Result<()> {
        let write = self.write.as_ref().ok_or(Error::Unwritable(self.label))?;
        write(obj, value);
        self.invalidate(obj);
        Ok(())
    }

    /// Run the remove function, then clear the instance's slot
    pub fn remove(&self, obj: &mut T) -> Result<()> {
        let remove = self.remove.as_ref().ok_or(Error::Undeletable(self.label))?;
        remove(obj);
        self.invalidate(obj);
        Ok(())
    }

    /// Clear the instance's slot without calling any bound function
    ///
    /// Needed after backing state changed behind the accessor's back.
    pub fn invalidate(&self, obj: &T) {
        let had_value = obj.slots().invalidate(self.id);
        debug!(label = self.label, had_value, "slot invalidated");
    }

    /// Whether the instance's slot currently holds a value
    pub fn is_cached(&self, obj: &T) -> bool {
        obj.slots().contains(self.id)
    }
}
