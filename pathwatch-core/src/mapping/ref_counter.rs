//! Reference-counted derived values.
//!
//! [`RefCountedCache`] maps source keys to derived values. The first request
//! for a key creates the value, later requests share it, and the value is
//! evicted once every request has been released.
//!
//! One derived value may be produced for several keys. A value is only
//! evicted when no remaining key maps to it.
//!
//! # Refresh transactions
//!
//! Rebuilding a mapping after a bulk change would otherwise evict and
//! recreate every value. Inside [`RefCountedCache::refresh`] requests are
//! recorded in a fresh table, reusing values from the previous one; when
//! the transaction ends only the values nobody asked for again are evicted.

use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;

use indexmap::map::Entry;
use indexmap::IndexMap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, trace};

use crate::path::Identity;

struct CacheEntry<V> {
    value: V,
    ref_count: usize,
}

type Table<K, V> = IndexMap<K, CacheEntry<V>>;

struct CacheState<K, V> {
    main: Table<K, V>,
    /// Requests recorded by the active refresh transaction.
    side: Option<Table<K, V>>,
    depth: usize,
}

impl<K, V> CacheState<K, V>
where
    K: Eq + Hash + Clone,
    V: Identity + Clone,
{
    fn active(&self) -> &Table<K, V> {
        self.side.as_ref().unwrap_or(&self.main)
    }

    /// Take another reference on an existing value, if any.
    fn acquire(&mut self, key: &K) -> Option<V> {
        if let Some(side) = self.side.as_mut() {
            if let Some(entry) = side.get_mut(key) {
                entry.ref_count += 1;
                return Some(entry.value.clone());
            }
            let value = self.main.get(key)?.value.clone();
            side.insert(
                key.clone(),
                CacheEntry {
                    value: value.clone(),
                    ref_count: 1,
                },
            );
            return Some(value);
        }

        let entry = self.main.get_mut(key)?;
        entry.ref_count += 1;
        Some(entry.value.clone())
    }

    fn insert(&mut self, key: &K, value: V) -> V {
        let table = match self.side.as_mut() {
            Some(side) => side,
            None => &mut self.main,
        };
        match table.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.ref_count += 1;
                entry.value.clone()
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry {
                    value: value.clone(),
                    ref_count: 1,
                });
                value
            }
        }
    }

    /// Release one reference. Returns whether the key went away.
    fn release(&mut self, key: &K) -> bool {
        let table = match self.side.as_mut() {
            Some(side) if side.contains_key(key) => side,
            _ => &mut self.main,
        };
        let Some(entry) = table.get_mut(key) else {
            return false;
        };
        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count > 0 {
            return false;
        }
        table.shift_remove(key);
        true
    }

    fn maps_to(&self, value: &V) -> bool {
        let in_main = self.main.values().any(|entry| entry.value.same(value));
        in_main
            || self
                .side
                .as_ref()
                .is_some_and(|side| side.values().any(|entry| entry.value.same(value)))
    }
}

fn push_distinct<V: Identity>(values: &mut Vec<V>, value: V) {
    if !values.iter().any(|existing| existing.same(&value)) {
        values.push(value);
    }
}

type CreateFn<K, V> = Box<dyn Fn(&K) -> V + Send + Sync>;
type EvictFn<V> = Box<dyn Fn(&V) + Send + Sync>;

/// A keyed, reference-counted table of derived values.
///
/// Access is serialised by a reentrant lock: the creation and eviction
/// callbacks, and the owner of a [`RefreshTransaction`], may call back into
/// the cache on the same thread, while other threads wait.
pub struct RefCountedCache<K, V> {
    state: ReentrantMutex<RefCell<CacheState<K, V>>>,
    create: CreateFn<K, V>,
    on_evict: EvictFn<V>,
}

impl<K, V> RefCountedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Identity + Clone,
{
    pub fn new<C, E>(create: C, on_evict: E) -> Self
    where
        C: Fn(&K) -> V + Send + Sync + 'static,
        E: Fn(&V) + Send + Sync + 'static,
    {
        Self {
            state: ReentrantMutex::new(RefCell::new(CacheState {
                main: IndexMap::new(),
                side: None,
                depth: 0,
            })),
            create: Box::new(create),
            on_evict: Box::new(on_evict),
        }
    }

    /// Get the value for `key`, creating it on first request.
    ///
    /// Every call takes one reference that must be given back with
    /// [`remove`](Self::remove).
    pub fn get_or_create(&self, key: &K) -> V {
        let guard = self.state.lock();
        if let Some(value) = guard.borrow_mut().acquire(key) {
            return value;
        }

        let value = (self.create)(key);
        trace!("created cache value");
        let stored = guard.borrow_mut().insert(key, value);
        stored
    }

    /// Release one reference on `key`.
    ///
    /// When the last reference goes, the key is dropped and `value` is
    /// evicted unless another key still maps to it. Returns whether
    /// `value` was evicted.
    pub fn remove(&self, key: &K, value: &V) -> bool {
        let guard = self.state.lock();
        let evict = {
            let mut state = guard.borrow_mut();
            state.release(key) && !state.maps_to(value)
        };
        if evict {
            debug!("evicting cache value");
            (self.on_evict)(value);
        }
        evict
    }

    /// Begin a refresh transaction. Requests made until the returned guard
    /// is dropped form the new contents of the cache.
    ///
    /// Transactions nest; only the outermost one commits.
    pub fn refresh(&self) -> RefreshTransaction<'_, K, V> {
        let guard = self.state.lock();
        {
            let mut state = guard.borrow_mut();
            state.depth += 1;
            if state.side.is_none() {
                state.side = Some(IndexMap::new());
                debug!(entries = state.main.len(), "began cache refresh");
            }
        }
        RefreshTransaction { cache: self, guard }
    }

    fn commit(&self, cell: &RefCell<CacheState<K, V>>) {
        let evicted = {
            let mut state = cell.borrow_mut();
            state.depth = state.depth.saturating_sub(1);
            if state.depth > 0 {
                return;
            }
            let Some(side) = state.side.take() else {
                return;
            };
            let previous = std::mem::replace(&mut state.main, side);

            let mut evicted = Vec::new();
            for (key, entry) in previous {
                if state.main.contains_key(&key) || state.maps_to(&entry.value) {
                    continue;
                }
                push_distinct(&mut evicted, entry.value);
            }
            debug!(
                entries = state.main.len(),
                evicted = evicted.len(),
                "committed cache refresh"
            );
            evicted
        };

        for value in &evicted {
            (self.on_evict)(value);
        }
    }

    /// Evict every value and empty the cache.
    pub fn clear(&self) {
        let guard = self.state.lock();
        let evicted = {
            let mut state = guard.borrow_mut();
            let main = std::mem::take(&mut state.main);
            let side = state.side.as_mut().map(std::mem::take).unwrap_or_default();

            let mut evicted = Vec::new();
            for (_, entry) in main.into_iter().chain(side) {
                push_distinct(&mut evicted, entry.value);
            }
            evicted
        };
        debug!(evicted = evicted.len(), "cleared cache");
        for value in &evicted {
            (self.on_evict)(value);
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.state.lock().borrow().active().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &K) -> bool {
        self.state.lock().borrow().active().contains_key(key)
    }

    /// Outstanding references on `key`, 0 if it is absent.
    pub fn ref_count(&self, key: &K) -> usize {
        self.state
            .lock()
            .borrow()
            .active()
            .get(key)
            .map_or(0, |entry| entry.ref_count)
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.lock().borrow().side.is_some()
    }
}

impl<K, V> fmt::Debug for RefCountedCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Identity + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.state.lock();
        let state = guard.borrow();
        let keys: Vec<&K> = state.active().keys().collect();
        f.debug_struct("RefCountedCache")
            .field("keys", &keys)
            .field("refreshing", &state.side.is_some())
            .finish()
    }
}

/// Scope of a refresh. Holds the cache lock; commits when dropped.
#[must_use = "the refresh commits as soon as the transaction is dropped"]
pub struct RefreshTransaction<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Identity + Clone,
{
    cache: &'a RefCountedCache<K, V>,
    guard: ReentrantMutexGuard<'a, RefCell<CacheState<K, V>>>,
}

impl<K, V> RefreshTransaction<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Identity + Clone,
{
    /// Shorthand for [`RefCountedCache::get_or_create`] within the
    /// transaction.
    pub fn get_or_create(&self, key: &K) -> V {
        self.cache.get_or_create(key)
    }

    /// End the transaction now.
    pub fn commit(self) {
        drop(self);
    }
}

impl<K, V> Drop for RefreshTransaction<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Identity + Clone,
{
    fn drop(&mut self) {
        self.cache.commit(&self.guard);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
