//! Trackers over every item of a live collection.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::items::{ItemsCore, RawItemChange};
use super::observable::{ItemChanged, ItemValueChanged, ObservableItemValue};
use super::path_tracker::downcast;
use crate::error::{Error, Result};
use crate::notify::{NotifyCollectionChanged, NotifyPropertyChanged, Subscription};
use crate::path::{NotifyingPath, PathValue};

/// How an items tracker watches each item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerKind {
    /// One-link path: the item's own property-changed event is watched.
    Simple,
    /// Longer path: each item gets its own path tracker.
    Nested,
}

impl TrackerKind {
    fn of(simple: bool) -> Self {
        if simple {
            Self::Simple
        } else {
            Self::Nested
        }
    }
}

/// Tracks `path` from every item of a collection and reports each item's
/// terminal value as it changes.
///
/// Items joining the collection are reported with their current value,
/// items leaving it (last occurrence) with `None`. `None` slots are reported
/// with `None` as both item and value.
pub struct ItemsTracker<I: NotifyPropertyChanged, P> {
    core: ItemsCore<I>,
    path: NotifyingPath<I, P>,
}

impl<I, P> ItemsTracker<I, P>
where
    I: NotifyPropertyChanged,
    P: PathValue,
{
    pub fn new<C>(collection: Arc<C>, path: &NotifyingPath<I, P>) -> Self
    where
        C: NotifyCollectionChanged<I>,
    {
        let collection: Arc<dyn NotifyCollectionChanged<I>> = collection;
        Self {
            core: ItemsCore::new(collection, Arc::clone(path.raw()), true),
            path: path.clone(),
        }
    }

    pub fn kind(&self) -> TrackerKind {
        TrackerKind::of(self.core.is_simple())
    }

    pub fn path(&self) -> &NotifyingPath<I, P> {
        &self.path
    }

    pub fn subscribe<F>(&self, handler: F) -> Result<Subscription>
    where
        F: Fn(&ItemValueChanged<I, P>) + Send + Sync + 'static,
    {
        self.ensure_live()?;
        Ok(self.core.subscribe(move |change: &RawItemChange<I>| {
            handler(&ItemValueChanged {
                item: change.item.clone(),
                value: downcast(change.value.clone()),
            });
        }))
    }

    /// Current terminal value of a tracked item; `None` if the item is not
    /// in the collection or its path has no value.
    pub fn value_of(&self, item: &Arc<I>) -> Result<Option<P>> {
        self.ensure_live()?;
        Ok(downcast(self.core.value_of(item).flatten()))
    }

    /// How many times `item` currently occurs in the collection.
    pub fn occurrences(&self, item: &Arc<I>) -> usize {
        self.core.occurrences(item)
    }

    /// Number of distinct items being watched.
    pub fn tracked_count(&self) -> usize {
        self.core.tracked_count()
    }

    pub fn dispose(&self) {
        self.core.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.core.is_disposed() {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }
}

impl<I, P> ObservableItemValue<I, P> for ItemsTracker<I, P>
where
    I: NotifyPropertyChanged,
    P: PathValue,
{
    fn subscribe<F>(&self, handler: F) -> Result<Subscription>
    where
        F: Fn(&ItemValueChanged<I, P>) + Send + Sync + 'static,
    {
        ItemsTracker::subscribe(self, handler)
    }
}

impl<I: NotifyPropertyChanged, P> fmt::Debug for ItemsTracker<I, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemsTracker")
            .field("path", &self.path)
            .field("tracked", &self.core.tracked_count())
            .field("disposed", &self.core.is_disposed())
            .finish()
    }
}

/// Like [`ItemsTracker`], but only reports which item changed.
///
/// One-link paths are never read, which makes this the cheaper choice when
/// the consumer re-reads items itself.
pub struct ItemsTrackerSlim<I: NotifyPropertyChanged> {
    core: ItemsCore<I>,
    _marker: PhantomData<fn() -> I>,
}

impl<I: NotifyPropertyChanged> ItemsTrackerSlim<I> {
    pub fn new<C, P>(collection: Arc<C>, path: &NotifyingPath<I, P>) -> Self
    where
        C: NotifyCollectionChanged<I>,
        P: PathValue,
    {
        let collection: Arc<dyn NotifyCollectionChanged<I>> = collection;
        Self {
            core: ItemsCore::new(collection, Arc::clone(path.raw()), false),
            _marker: PhantomData,
        }
    }

    pub fn kind(&self) -> TrackerKind {
        TrackerKind::of(self.core.is_simple())
    }

    pub fn subscribe<F>(&self, handler: F) -> Result<Subscription>
    where
        F: Fn(&ItemChanged<I>) + Send + Sync + 'static,
    {
        if self.core.is_disposed() {
            return Err(Error::Disposed);
        }
        Ok(self.core.subscribe(move |change: &RawItemChange<I>| {
            handler(&ItemChanged {
                item: change.item.clone(),
            });
        }))
    }

    pub fn occurrences(&self, item: &Arc<I>) -> usize {
        self.core.occurrences(item)
    }

    pub fn tracked_count(&self) -> usize {
        self.core.tracked_count()
    }

    pub fn dispose(&self) {
        self.core.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

impl<I: NotifyPropertyChanged> fmt::Debug for ItemsTrackerSlim<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemsTrackerSlim")
            .field("kind", &self.kind())
            .field("tracked", &self.core.tracked_count())
            .field("disposed", &self.core.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Level;
    use crate::notify::ObservableCollection;
    use crate::path::{Chain, Interner};
    use parking_lot::Mutex;

    type Seen = Arc<Mutex<Vec<(Option<usize>, Option<i32>)>>>;

    fn key(item: &Option<Arc<Level>>) -> Option<usize> {
        item.as_ref().map(|item| Arc::as_ptr(item) as usize)
    }

    fn record(tracker: &ItemsTracker<Level, i32>) -> (Seen, Subscription) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let subscription = tracker
            .subscribe(move |change| seen_clone.lock().push((key(&change.item), change.value)))
            .unwrap();
        (seen, subscription)
    }

    #[test]
    fn kind_follows_path_length() {
        let interner = Interner::new();
        let collection = Arc::new(ObservableCollection::<Level>::new());
        let simple = interner.path(Chain::new(Level::value_property())).unwrap();
        let nested = interner
            .path(Chain::new(Level::next_property()).then(Level::value_property()))
            .unwrap();

        assert_eq!(ItemsTracker::new(collection.clone(), &simple).kind(), TrackerKind::Simple);
        assert_eq!(ItemsTracker::new(collection, &nested).kind(), TrackerKind::Nested);
    }

    #[test]
    fn simple_tracker_reports_item_changes() {
        let interner = Interner::new();
        let path = interner.path(Chain::new(Level::value_property())).unwrap();
        let a = Level::new(1);
        let collection = Arc::new(ObservableCollection::from_items(vec![Some(a.clone())]));
        let tracker = ItemsTracker::new(collection, &path);
        let (seen, _subscription) = record(&tracker);

        a.set_value(7);
        a.set_next(None);

        assert_eq!(*seen.lock(), vec![(key(&Some(a.clone())), Some(7))]);
        assert_eq!(tracker.value_of(&a).unwrap(), Some(7));
    }

    #[test]
    fn add_and_remove_are_reported() {
        let interner = Interner::new();
        let path = interner.path(Chain::new(Level::value_property())).unwrap();
        let collection = Arc::new(ObservableCollection::new());
        let tracker = ItemsTracker::new(collection.clone(), &path);
        let (seen, _subscription) = record(&tracker);

        let a = Level::new(3);
        collection.push(Some(a.clone()));
        collection.push(None);
        collection.remove(&a);

        assert_eq!(
            *seen.lock(),
            vec![
                (key(&Some(a.clone())), Some(3)),
                (None, None),
                (key(&Some(a.clone())), None),
            ]
        );
        assert_eq!(tracker.tracked_count(), 0);
    }

    #[test]
    fn nested_tracker_forwards_terminal_changes() {
        let interner = Interner::new();
        let path = interner
            .path(Chain::new(Level::next_property()).then(Level::value_property()))
            .unwrap();
        let item = Level::new(0);
        let collection = Arc::new(ObservableCollection::from_items(vec![Some(item.clone())]));
        let tracker = ItemsTracker::new(collection, &path);
        let (seen, _subscription) = record(&tracker);

        let inner = Level::new(4);
        item.set_next(Some(inner.clone()));
        inner.set_value(5);

        assert_eq!(
            *seen.lock(),
            vec![(key(&Some(item.clone())), Some(4)), (key(&Some(item.clone())), Some(5))]
        );
    }

    #[test]
    fn slim_tracker_reports_items_only() {
        let interner = Interner::new();
        let path = interner.path(Chain::new(Level::value_property())).unwrap();
        let a = Level::new(1);
        let collection = Arc::new(ObservableCollection::from_items(vec![Some(a.clone())]));
        let tracker = ItemsTrackerSlim::new(collection, &path);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _subscription = tracker
            .subscribe(move |change: &ItemChanged<Level>| seen_clone.lock().push(key(&change.item)))
            .unwrap();

        a.set_value(2);
        assert_eq!(*seen.lock(), vec![key(&Some(a.clone()))]);
    }

    #[test]
    fn dispose_in_first_handler_silences_the_rest() {
        let interner = Interner::new();
        let path = interner
            .path(Chain::new(Level::next_property()).then(Level::value_property()))
            .unwrap();
        let collection = Arc::new(ObservableCollection::new());
        let tracker = Arc::new(ItemsTracker::new(collection.clone(), &path));

        let weak = Arc::downgrade(&tracker);
        let _first = tracker
            .subscribe(move |_| {
                if let Some(tracker) = weak.upgrade() {
                    tracker.dispose();
                }
            })
            .unwrap();
        let (seen, _second) = record(&tracker);

        let item = Level::with_next(Some(Level::new(1)), 0);
        collection.push(Some(item.clone()));
        collection.push(Some(Level::new(2)));

        assert!(tracker.is_disposed());
        assert!(seen.lock().is_empty());
        assert_eq!(item.handler_count(), 0);
        assert_eq!(collection.collection_changed().handler_count(), 0);
    }

    #[test]
    fn disposed_tracker_rejects_calls() {
        let interner = Interner::new();
        let path = interner.path(Chain::new(Level::value_property())).unwrap();
        let a = Level::new(1);
        let collection = Arc::new(ObservableCollection::from_items(vec![Some(a.clone())]));
        let tracker = ItemsTracker::new(collection, &path);

        tracker.dispose();
        assert_eq!(tracker.subscribe(|_| {}).unwrap_err(), Error::Disposed);
        assert_eq!(tracker.value_of(&a).unwrap_err(), Error::Disposed);
        assert_eq!(a.handler_count(), 0);
    }
}
