//! Items Synchronisation
//!
//! `ItemsCore` keeps one watch per distinct item of a live collection and
//! turns per-item notifications into one event stream tagged with the
//! originating item. The public trackers in `items_tracker` are thin typed
//! front-ends over it.
//!
//! # Watches
//!
//! - For a one-link path the watch is a single subscription on the item's
//!   own property-changed event (the "simple" case).
//! - For longer paths the watch is a full [`PathTracker`] rooted at the item
//!   whose aggregated event is forwarded (the "nested" case).
//!
//! # Keeping Up With the Collection
//!
//! Items are keyed by identity and reference counted, so an instance that
//! appears twice holds one watch with a count of two.
//!
//! | Action  | Effect |
//! |---------|--------|
//! | Add     | count up, create the watch on first occurrence, report the value |
//! | Remove  | count down, release the watch on last occurrence, report "no value" |
//! | Replace | no-op if one slot was overwritten by the same item, otherwise remove + add |
//! | Move    | no-op |
//! | Reset   | diff the tracked set against a fresh snapshot of the collection |
//!
//! All bookkeeping happens under the state lock; released watches are
//! dropped and events are raised after the lock is released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::path_tracker::{PathTracker, RawChange};
use crate::notify::{
    CollectionAction, CollectionChangedArgs, Event, Item, NotifyCollectionChanged,
    NotifyPropertyChanged, Subscription,
};
use crate::path::{AnyValue, ByIdentity, Link, RawPath};

/// A per-item notification, value erased.
pub(crate) struct RawItemChange<I> {
    pub(crate) item: Option<Arc<I>>,
    pub(crate) value: Option<AnyValue>,
}

impl<I> RawItemChange<I> {
    fn absent(item: Option<Arc<I>>) -> Self {
        Self { item, value: None }
    }
}

enum ItemWatch {
    Simple(Option<Subscription>),
    Nested {
        tracker: PathTracker,
        _forward: Subscription,
    },
}

struct ItemEntry {
    count: usize,
    watch: ItemWatch,
}

struct ItemsState<I> {
    entries: IndexMap<ByIdentity<I>, ItemEntry>,
    collection_subscription: Option<Subscription>,
}

struct ItemsInner<I> {
    path: Arc<RawPath>,
    collection: Arc<dyn NotifyCollectionChanged<I>>,
    state: Mutex<ItemsState<I>>,
    changed: Event<RawItemChange<I>>,
    disposed: AtomicBool,
    read_values: bool,
}

fn erase<I: NotifyPropertyChanged>(item: &Arc<I>) -> AnyValue {
    Arc::new(Arc::clone(item))
}

fn same_slot<I>(args: &CollectionChangedArgs<I>) -> bool {
    match (args.old_items.as_slice(), args.new_items.as_slice()) {
        ([Some(old)], [Some(new)]) => Arc::ptr_eq(old, new),
        ([None], [None]) => true,
        _ => false,
    }
}

impl<I: NotifyPropertyChanged> ItemsInner<I> {
    fn is_simple(&self) -> bool {
        self.path.len() == 1
    }

    fn watch(self: &Arc<Self>, item: &Arc<I>) -> ItemWatch {
        let weak_inner = Arc::downgrade(self);
        let weak_item = Arc::downgrade(item);

        if self.is_simple() {
            let link = &self.path.links()[0];
            let subscription = link.subscribe(
                &erase(item),
                Box::new(move || {
                    if let (Some(inner), Some(item)) = (weak_inner.upgrade(), weak_item.upgrade()) {
                        inner.on_item_changed(item);
                    }
                }),
            );
            ItemWatch::Simple(subscription)
        } else {
            let tracker = PathTracker::new(erase(item), Arc::clone(&self.path));
            let forward = tracker.subscribe(move |change: &RawChange| {
                if let (Some(inner), Some(item)) = (weak_inner.upgrade(), weak_item.upgrade()) {
                    inner.forward(item, change.new.clone());
                }
            });
            ItemWatch::Nested {
                tracker,
                _forward: forward,
            }
        }
    }

    fn current_value(&self, item: &Arc<I>, watch: &ItemWatch) -> Option<AnyValue> {
        match watch {
            ItemWatch::Simple(_) if self.read_values => self.path.links()[0].read(&erase(item)),
            ItemWatch::Simple(_) => None,
            ItemWatch::Nested { tracker, .. } => tracker.terminal(),
        }
    }

    fn on_item_changed(&self, item: Arc<I>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if !self
            .state
            .lock()
            .entries
            .contains_key(&ByIdentity::new(Arc::clone(&item)))
        {
            trace!("dropping notification from an item no longer tracked");
            return;
        }
        let value = if self.read_values {
            self.path.links()[0].read(&erase(&item))
        } else {
            None
        };
        self.raise(&RawItemChange {
            item: Some(item),
            value,
        });
    }

    fn forward(&self, item: Arc<I>, value: Option<AnyValue>) {
        self.raise(&RawItemChange {
            item: Some(item),
            value,
        });
    }

    fn raise(&self, change: &RawItemChange<I>) {
        if !self.disposed.load(Ordering::SeqCst) {
            self.changed.raise(change);
        }
    }

    fn add(
        self: &Arc<Self>,
        state: &mut ItemsState<I>,
        items: &[Item<I>],
        changes: &mut Vec<RawItemChange<I>>,
    ) {
        for item in items {
            let Some(item) = item else {
                changes.push(RawItemChange::absent(None));
                continue;
            };

            let value = match state.entries.entry(ByIdentity::new(Arc::clone(item))) {
                Entry::Occupied(mut occupied) => {
                    let entry = occupied.get_mut();
                    entry.count += 1;
                    self.current_value(item, &entry.watch)
                }
                Entry::Vacant(vacant) => {
                    let watch = self.watch(item);
                    let value = self.current_value(item, &watch);
                    vacant.insert(ItemEntry { count: 1, watch });
                    trace!(tracked = state.entries.len(), "started tracking item");
                    value
                }
            };
            changes.push(RawItemChange {
                item: Some(Arc::clone(item)),
                value,
            });
        }
    }

    fn remove(
        &self,
        state: &mut ItemsState<I>,
        items: &[Item<I>],
        changes: &mut Vec<RawItemChange<I>>,
        released: &mut Vec<ItemEntry>,
    ) {
        for item in items {
            let Some(item) = item else {
                changes.push(RawItemChange::absent(None));
                continue;
            };

            let key = ByIdentity::new(Arc::clone(item));
            let remaining = match state.entries.get_mut(&key) {
                Some(entry) => {
                    entry.count -= 1;
                    entry.count
                }
                None => continue,
            };
            if remaining == 0 {
                if let Some(entry) = state.entries.shift_remove(&key) {
                    released.push(entry);
                }
                trace!(tracked = state.entries.len(), "stopped tracking item");
                changes.push(RawItemChange::absent(Some(Arc::clone(item))));
            }
        }
    }

    fn reset(
        self: &Arc<Self>,
        state: &mut ItemsState<I>,
        snapshot: Vec<Item<I>>,
        changes: &mut Vec<RawItemChange<I>>,
        released: &mut Vec<ItemEntry>,
    ) {
        let mut counts: IndexMap<ByIdentity<I>, usize> = IndexMap::new();
        for item in snapshot.into_iter().flatten() {
            *counts.entry(ByIdentity::new(item)).or_insert(0) += 1;
        }

        let gone: Vec<ByIdentity<I>> = state
            .entries
            .keys()
            .filter(|key| !counts.contains_key(*key))
            .cloned()
            .collect();
        for key in gone {
            if let Some(entry) = state.entries.shift_remove(&key) {
                released.push(entry);
            }
            changes.push(RawItemChange::absent(Some(key.into_inner())));
        }

        for (key, count) in counts {
            let item = Arc::clone(key.get());
            match state.entries.entry(key) {
                Entry::Occupied(mut occupied) => occupied.get_mut().count = count,
                Entry::Vacant(vacant) => {
                    let watch = self.watch(&item);
                    let value = self.current_value(&item, &watch);
                    vacant.insert(ItemEntry { count, watch });
                    changes.push(RawItemChange {
                        item: Some(item),
                        value,
                    });
                }
            }
        }
        debug!(tracked = state.entries.len(), "resynchronised items after reset");
    }

    fn on_collection_changed(self: &Arc<Self>, args: &CollectionChangedArgs<I>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let snapshot = (args.action == CollectionAction::Reset).then(|| self.collection.items());

        let mut changes = Vec::new();
        let mut released = Vec::new();
        {
            let mut state = self.state.lock();
            if self.disposed.load(Ordering::SeqCst) {
                return;
            }
            match args.action {
                CollectionAction::Add => self.add(&mut state, &args.new_items, &mut changes),
                CollectionAction::Remove => {
                    self.remove(&mut state, &args.old_items, &mut changes, &mut released)
                }
                CollectionAction::Replace if same_slot(args) => {}
                CollectionAction::Replace => {
                    self.remove(&mut state, &args.old_items, &mut changes, &mut released);
                    self.add(&mut state, &args.new_items, &mut changes);
                }
                CollectionAction::Move => {}
                CollectionAction::Reset => self.reset(
                    &mut state,
                    snapshot.unwrap_or_default(),
                    &mut changes,
                    &mut released,
                ),
            }
        }

        drop(released);
        for change in &changes {
            self.raise(change);
        }
    }

    fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let (subscription, entries) = {
            let mut state = self.state.lock();
            (
                state.collection_subscription.take(),
                std::mem::take(&mut state.entries),
            )
        };
        drop(subscription);
        for (_, entry) in entries {
            if let ItemWatch::Nested { tracker, .. } = &entry.watch {
                tracker.dispose();
            }
        }
        self.changed.clear();
        true
    }
}

/// Untyped items tracker shared by the public front-ends.
pub(crate) struct ItemsCore<I: NotifyPropertyChanged> {
    inner: Arc<ItemsInner<I>>,
}

impl<I: NotifyPropertyChanged> ItemsCore<I> {
    pub(crate) fn new(
        collection: Arc<dyn NotifyCollectionChanged<I>>,
        path: Arc<RawPath>,
        read_values: bool,
    ) -> Self {
        let inner = Arc::new(ItemsInner {
            path,
            collection,
            state: Mutex::new(ItemsState {
                entries: IndexMap::new(),
                collection_subscription: None,
            }),
            changed: Event::new(),
            disposed: AtomicBool::new(false),
            read_values,
        });

        {
            let mut state = inner.state.lock();
            let weak = Arc::downgrade(&inner);
            state.collection_subscription = Some(inner.collection.collection_changed().subscribe(
                move |args: &CollectionChangedArgs<I>| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_collection_changed(args);
                    }
                },
            ));

            // Nobody can be subscribed yet, so the initial population is silent.
            let snapshot = inner.collection.items();
            let mut ignored = Vec::new();
            inner.add(&mut state, &snapshot, &mut ignored);
            debug!(
                path = ?inner.path,
                tracked = state.entries.len(),
                "created items tracker"
            );
        }

        Self { inner }
    }

    pub(crate) fn is_simple(&self) -> bool {
        self.inner.is_simple()
    }

    pub(crate) fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&RawItemChange<I>) + Send + Sync + 'static,
    {
        self.inner.changed.subscribe(handler)
    }

    /// `None` when `item` is not tracked.
    pub(crate) fn value_of(&self, item: &Arc<I>) -> Option<Option<AnyValue>> {
        let state = self.inner.state.lock();
        state
            .entries
            .get(&ByIdentity::new(Arc::clone(item)))
            .map(|entry| self.inner.current_value(item, &entry.watch))
    }

    pub(crate) fn occurrences(&self, item: &Arc<I>) -> usize {
        self.inner
            .state
            .lock()
            .entries
            .get(&ByIdentity::new(Arc::clone(item)))
            .map_or(0, |entry| entry.count)
    }

    pub(crate) fn tracked_count(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn dispose(&self) {
        if self.inner.dispose() {
            debug!(path = ?self.inner.path, "disposed items tracker");
        }
    }
}

impl<I: NotifyPropertyChanged> Drop for ItemsCore<I> {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
