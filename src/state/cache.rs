//! Weak-reference deduplication cache for immutable state objects.
//!
//! The cache never keeps a state alive. It maps each descriptor to a weak
//! reference to the one live object built from it; the object removes its own
//! entry when its last strong reference is dropped.
//!
//! Every cached object carries a dense [`StateId`]. IDs of destroyed objects
//! are parked in a retired list and only become reusable after an explicit
//! [`StateCache::reclaim_ids`], so an ID observed by a consumer can never be
//! silently recycled under it.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Dense per-kind identifier of a cached state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub(crate) u32);

impl StateId {
    /// Raw index, suitable for addressing per-state side tables.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Default)]
struct IdAllocator {
    next: u32,
    free: Vec<u32>,
    retired: Vec<u32>,
}

impl IdAllocator {
    fn allocate(&mut self) -> StateId {
        if let Some(id) = self.free.pop() {
            return StateId(id);
        }
        let id = self.next;
        self.next += 1;
        StateId(id)
    }

    /// Returns an ID that was allocated but never handed out.
    fn give_back(&mut self, id: StateId) {
        self.free.push(id.0);
    }

    fn retire(&mut self, id: StateId) {
        self.retired.push(id.0);
    }

    fn reclaim(&mut self) -> usize {
        let count = self.retired.len();
        self.free.append(&mut self.retired);
        // Hand out low IDs first.
        self.free.sort_unstable_by(|a, b| b.cmp(a));
        count
    }
}

struct CacheInner<D, S> {
    entries: FxHashMap<D, Weak<S>>,
    ids: IdAllocator,
}

/// Snapshot of one cache's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Objects constructed over the cache's lifetime.
    pub created: u64,
    /// Descriptors with a live object right now.
    pub live: usize,
}

/// Descriptor-keyed cache of weakly referenced state objects.
pub struct StateCache<D, S> {
    inner: Mutex<CacheInner<D, S>>,
    created: AtomicU64,
}

impl<D: Eq + Hash + Clone, S> StateCache<D, S> {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(CacheInner {
                entries: FxHashMap::default(),
                ids: IdAllocator::default(),
            }),
            created: AtomicU64::new(0),
        })
    }

    /// Returns the live object for `desc`, or builds one with `make`.
    ///
    /// `make` receives the ID assigned to the new object and a weak handle
    /// back to this cache, which the object uses to unregister itself.
    pub fn get_or_create<E>(
        self: &Arc<Self>,
        desc: &D,
        make: impl FnOnce(StateId, Weak<Self>) -> Result<S, E>,
    ) -> Result<Arc<S>, E> {
        let mut inner = self.inner.lock();

        if let Some(existing) = inner.entries.get(desc).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let id = inner.ids.allocate();
        match make(id, Arc::downgrade(self)) {
            Ok(state) => {
                let state = Arc::new(state);
                inner.entries.insert(desc.clone(), Arc::downgrade(&state));
                self.created.fetch_add(1, Ordering::Relaxed);
                Ok(state)
            }
            Err(err) => {
                inner.ids.give_back(id);
                Err(err)
            }
        }
    }

    /// Called from the object's `Drop`.
    ///
    /// The entry is only removed if it still points at `object`; a newer
    /// object for the same descriptor may already have replaced it.
    pub(crate) fn release(&self, desc: &D, id: StateId, object: *const S) {
        let mut inner = self.inner.lock();
        if inner
            .entries
            .get(desc)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), object))
        {
            inner.entries.remove(desc);
        }
        inner.ids.retire(id);
    }

    /// Makes IDs of destroyed objects available again. Returns how many.
    pub fn reclaim_ids(&self) -> usize {
        self.inner.lock().ids.reclaim()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            created: self.created.load(Ordering::Relaxed),
            live: inner.entries.values().filter(|w| w.strong_count() > 0).count(),
        }
    }
}

/// A cache plus the lazily created default object of one state kind.
pub struct StateSlot<D, S> {
    pub(crate) cache: Arc<StateCache<D, S>>,
    pub(crate) default: OnceLock<Arc<S>>,
}

impl<D: Eq + Hash + Clone, S> Default for StateSlot<D, S> {
    fn default() -> Self {
        Self {
            cache: StateCache::new(),
            default: OnceLock::new(),
        }
    }
}
