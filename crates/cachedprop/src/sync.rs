//! Locked accessors for instances shared across threads
//!
//! Each instance+accessor pair gets its own mutex. A read holds it across
//! check, compute and store; a write or remove holds it across the bound
//! function and the clear. Compute therefore runs at most once per
//! invalidation cycle, and a clear never races with a store.
//!
//! Inspection (`contains`, `len`, `is_cached`, `Debug`) reads a per-cell flag
//! without locking, so it never waits on an in-flight compute. Anything that
//! takes the slot lock (`read`/`write`/`remove`/`invalidate` of the same
//! accessor, `SyncSlots::clear`) deadlocks when called from inside that
//! accessor's own compute.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ahash::RandomState;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::accessor::AccessorId;
use crate::error::{Error, Result};
use crate::stats::CacheStats;

/// One slot: the value under its lock, plus an occupancy flag kept in step
/// with it for lock-free inspection.
#[derive(Default)]
struct SlotCell {
    occupied: AtomicBool,
    value: Mutex<Option<Box<dyn Any + Send>>>,
}

impl SlotCell {
    fn is_occupied(&self) -> bool {
        self.occupied.load(Ordering::Acquire)
    }
}

/// Types that own a thread-safe slot table
pub trait SyncCacheHost {
    /// The instance's slot table
    fn sync_slots(&self) -> &SyncSlots;
}

/// Thread-safe per-instance cache slots
pub struct SyncSlots {
    cells: RwLock<HashMap<AccessorId, Arc<SlotCell>, RandomState>>,
    stats: CacheStats,
}

impl SyncSlots {
    /// Create an empty slot table
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty slot table sized for `capacity` accessors
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: RwLock::new(HashMap::with_capacity_and_hasher(capacity, RandomState::new())),
            stats: CacheStats::new(),
        }
    }

    /// Cell for `id`, created empty on first use
    fn cell(&self, id: AccessorId) -> Arc<SlotCell> {
        if let Some(cell) = self.cells.read().get(&id) {
            return Arc::clone(cell);
        }
        Arc::clone(self.cells.write().entry(id).or_default())
    }

    /// Whether the slot for `id` holds a value
    pub fn contains(&self, id: AccessorId) -> bool {
        self.cells.read().get(&id).is_some_and(|cell| cell.is_occupied())
    }

    /// Number of non-empty slots
    pub fn len(&self) -> usize {
        self.cells.read().values().filter(|cell| cell.is_occupied()).count()
    }

    /// Check if every slot is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty every slot, counting one invalidation per discarded value
    ///
    /// Waits for in-flight computes to finish.
    pub fn clear(&self) {
        let cells: Vec<Arc<SlotCell>> = self.cells.read().values().cloned().collect();
        for cell in cells {
            let mut value = cell.value.lock();
            cell.occupied.store(false, Ordering::Release);
            if value.take().is_some() {
                self.stats.record_invalidation();
            }
        }
    }

    /// Hit/miss statistics for this instance
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl Default for SyncSlots {
    fn default() -> Self {
        Self::new()
    }
}

/// Cached values are derivable, so a clone starts empty.
impl Clone for SyncSlots {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl fmt::Debug for SyncSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSlots")
            .field("len", &self.len())
            .field("stats", &self.stats)
            .finish()
    }
}

accessor_bindings! {
    /// Cached attribute of a thread-shared host type `T`
    ///
    /// Bound functions take the instance by shared reference; the host keeps its
    /// backing state behind its own locks or atomics.
    pub struct SyncAccessor {
        compute: [Fn(&T) -> V],
        write: [Fn(&T, V)],
        remove: [Fn(&T)],
    }
}

impl<T, V> SyncAccessor<T, V>
where
    T: SyncCacheHost,
    V: Clone + Send + 'static,
{
    /// Create a read-only accessor
    pub fn new<F>(label: &'static str, compute: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        Self {
            compute: Some(Arc::new(compute)),
            ..Self::unbound(label)
        }
    }

    /// Read the value, computing it under the slot lock if empty
    pub fn read(&self, obj: &T) -> Result<V> {
        let compute = self.compute.as_ref().ok_or(Error::Unreadable(self.label))?;
        let slots = obj.sync_slots();
        let cell = slots.cell(self.id);
        let mut slot = cell.value.lock();

        if let Some(value) = slot.as_deref().and_then(|value| value.downcast_ref::<V>()) {
            slots.stats().record_hit();
            trace!(label = self.label, "cached read");
            return Ok(value.clone());
        }

        slots.stats().record_miss();
        trace!(label = self.label, "computing");
        let value = compute(obj);
        *slot = Some(Box::new(value.clone()));
        cell.occupied.store(true, Ordering::Release);
        Ok(value)
    }

    /// Run the write function and clear the slot, under the slot lock
    pub fn write(&self, obj: &T, value: V) -> Result<()> {
        let write = self.write.as_ref().ok_or(Error::Unwritable(self.label))?;
        self.locked_clear(obj, |obj| write(obj, value));
        Ok(())
    }

    /// Run the remove function and clear the slot, under the slot lock
    pub fn remove(&self, obj: &T) -> Result<()> {
        let remove = self.remove.as_ref().ok_or(Error::Undeletable(self.label))?;
        self.locked_clear(obj, |obj| remove(obj));
        Ok(())
    }

    /// Clear the instance's slot without calling any bound function
    pub fn invalidate(&self, obj: &T) {
        self.locked_clear(obj, |_| {});
    }

    /// Whether the instance's slot currently holds a value
    pub fn is_cached(&self, obj: &T) -> bool {
        obj.sync_slots().contains(self.id)
    }

    fn locked_clear(&self, obj: &T, update: impl FnOnce(&T)) {
        let slots = obj.sync_slots();
        let cell = slots.cell(self.id);
        let mut slot = cell.value.lock();

        update(obj);
        cell.occupied.store(false, Ordering::Release);
        let old = slot.take();
        drop(slot);

        let had_value = old.is_some();
        if had_value {
            slots.stats().record_invalidation();
        }
        debug!(label = self.label, had_value, "slot invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, AtomicU32, AtomicUsize};
    use std::sync::mpsc;
    use std::thread;

    #[derive(Default)]
    struct Counter {
        p: AtomicI64,
        computes: AtomicU32,
        slots: SyncSlots,
    }

    impl SyncCacheHost for Counter {
        fn sync_slots(&self) -> &SyncSlots {
            &self.slots
        }
    }

    fn counter(p: i64) -> Counter {
        let c = Counter::default();
        c.p.store(p, Ordering::SeqCst);
        c
    }

    fn property() -> SyncAccessor<Counter, i64> {
        SyncAccessor::new("p", |c: &Counter| {
            c.computes.fetch_add(1, Ordering::SeqCst);
            c.p.load(Ordering::SeqCst)
        })
        .with_write(|c, value| c.p.store(value, Ordering::SeqCst))
    }

    #[test]
    fn test_sync_scenario() {
        let p = property();
        let c = counter(10);

        assert_eq!(p.read(&c).unwrap(), 10);
        assert_eq!(p.read(&c).unwrap(), 10);
        assert_eq!(c.computes.load(Ordering::SeqCst), 1);

        p.write(&c, 20).unwrap();
        assert!(!p.is_cached(&c));
        assert_eq!(p.read(&c).unwrap(), 20);
        assert_eq!(c.computes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_sync_concurrent_reads_compute_once() {
        let p = property();
        let c = counter(5);

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..100 {
                        assert_eq!(p.read(&c).unwrap(), 5);
                    }
                });
            }
        });

        assert_eq!(c.computes.load(Ordering::SeqCst), 1);
        assert_eq!(c.slots.stats().misses(), 1);
        assert_eq!(c.slots.stats().hits(), 799);
    }

    #[test]
    fn test_sync_write_never_leaves_stale_value() {
        let p = property();
        let c = Counter::default();

        thread::scope(|s| {
            s.spawn(|| {
                for i in 1..=200 {
                    p.write(&c, i).unwrap();
                }
            });
            s.spawn(|| {
                for _ in 0..200 {
                    p.read(&c).unwrap();
                }
            });
        });

        assert_eq!(p.read(&c).unwrap(), 200);
    }

    #[test]
    fn test_sync_read_only_errors() {
        let p: SyncAccessor<Counter, i64> = SyncAccessor::new("p", |c: &Counter| c.p.load(Ordering::SeqCst));
        let c = Counter::default();

        assert_eq!(p.write(&c, 1), Err(Error::Unwritable("p")));
        assert_eq!(p.remove(&c), Err(Error::Undeletable("p")));
        assert_eq!(SyncAccessor::<Counter, i64>::unbound("q").read(&c), Err(Error::Unreadable("q")));
    }

    #[test]
    fn test_sync_remove_and_siblings() {
        let p = property().with_remove(|c| c.p.store(0, Ordering::SeqCst));
        let c = counter(3);

        assert_eq!(p.read(&c).unwrap(), 3);
        p.remove(&c).unwrap();
        assert_eq!(p.read(&c).unwrap(), 0);

        let rebound = p.with_write(|c, value| c.p.store(value + 1, Ordering::SeqCst));
        assert!(rebound.is_deletable());
        rebound.write(&c, 4).unwrap();
        assert_eq!(p.read(&c).unwrap(), 5);
    }

    #[test]
    fn test_sync_stale_until_invalidate() {
        let p = property();
        let c = counter(10);

        assert_eq!(p.read(&c).unwrap(), 10);
        c.p.fetch_add(1, Ordering::SeqCst);
        assert_eq!(p.read(&c).unwrap(), 10);

        p.invalidate(&c);
        assert!(!p.is_cached(&c));
        assert_eq!(p.read(&c).unwrap(), 11);
        assert_eq!(c.slots.stats().invalidations(), 1);
    }

    #[test]
    fn test_sync_with_read_gets_new_slot() {
        let p = property();
        let doubled = p.with_read(|c: &Counter| c.p.load(Ordering::SeqCst) * 2);
        let c = counter(3);

        assert_ne!(p.id(), doubled.id());
        assert!(doubled.is_writable());
        assert_eq!(p.read(&c).unwrap(), 3);
        assert_eq!(doubled.read(&c).unwrap(), 6);
        assert_eq!(c.slots.len(), 2);
    }

    #[test]
    fn test_sync_rebinds_carry_doc() {
        let p = property().with_doc("current p");

        let rebound = p
            .with_read(|c: &Counter| c.p.load(Ordering::SeqCst))
            .with_write(|c, value| c.p.store(value, Ordering::SeqCst))
            .with_remove(|c| c.p.store(0, Ordering::SeqCst));

        assert_eq!(p.doc(), Some("current p"));
        assert_eq!(rebound.doc(), Some("current p"));
        assert!(rebound.is_deletable());
        assert!(!p.is_deletable());
    }

    #[test]
    fn test_sync_inspect_inside_compute() {
        let seen = Arc::new(AtomicUsize::new(usize::MAX));
        let p = {
            let seen = Arc::clone(&seen);
            SyncAccessor::new("p", move |c: &Counter| {
                seen.store(c.sync_slots().len(), Ordering::SeqCst);
                assert!(format!("{:?}", c.sync_slots()).contains("SyncSlots"));
                c.p.load(Ordering::SeqCst)
            })
        };
        let c = counter(8);

        assert_eq!(p.read(&c).unwrap(), 8);
        assert!(p.is_cached(&c));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sync_inspect_during_compute() {
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let started_tx = Mutex::new(started_tx);
        let release_rx = Mutex::new(release_rx);

        let p = SyncAccessor::new("slow", move |c: &Counter| {
            started_tx.lock().send(()).unwrap();
            release_rx.lock().recv().unwrap();
            c.p.load(Ordering::SeqCst)
        });
        let c = counter(4);

        thread::scope(|s| {
            let reader = s.spawn(|| p.read(&c).unwrap());

            started_rx.recv().unwrap();
            // Compute is parked on the release channel while these run.
            assert_eq!(c.slots.len(), 0);
            assert!(!p.is_cached(&c));
            assert!(format!("{:?}", c.slots).contains("len: 0"));
            release_tx.send(()).unwrap();

            assert_eq!(reader.join().unwrap(), 4);
        });

        assert!(p.is_cached(&c));
        assert_eq!(c.slots.len(), 1);
    }

    #[test]
    fn test_sync_slots_clear() {
        let p = property();
        let c = Counter::default();

        p.read(&c).unwrap();
        assert_eq!(c.slots.len(), 1);
        c.slots.clear();
        assert!(c.slots.is_empty());
        assert!(!p.is_cached(&c));
        assert_eq!(c.slots.stats().invalidations(), 1);
    }
}
