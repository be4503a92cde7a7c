//! Property Path Tracker
//!
//! A tracker keeps one subscription per link of a path, starting at a fixed
//! root, and raises a single aggregated event whenever the chain changes.
//!
//! # How Tracking Works
//!
//! Each link is in one of two states:
//!
//! - `Unsubscribed`: an earlier link is `None`, so this link has no source.
//! - `Subscribed`: the link watches its source for notifications concerning
//!   its property and remembers the value it last read (possibly `None`).
//!
//! When a link's source notifies:
//!
//! 1. The link re-reads its value. If it is the same (see
//!    [`Identity`](crate::path::Identity)) as the remembered one, nothing
//!    happens.
//!
//! 2. Otherwise every downstream link is torn down and subscribed again
//!    against the new value, and the tracker raises one `ValueChanged` for
//!    the whole chain.
//!
//! # Locking
//!
//! Link state lives behind a `Mutex`. A notification computes the new chain
//! under the lock and raises the consumer event after releasing it, so a
//! consumer may dispose the tracker from inside its handler.
//!
//! Every subscription carries the generation number it was created with.
//! A notification arriving through a subscription that has since been
//! replaced finds a newer generation in the slot and is dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::observable::{ObservableValue, ValueChanged};
use crate::error::{Error, Result};
use crate::notify::{Event, NotifyPropertyChanged, Subscription};
use crate::path::{AnyValue, Link, NotifyingPath, PathValue, RawPath, SourceAndValue};

/// Terminal values before and after a chain update, erased.
#[derive(Clone)]
pub(crate) struct RawChange {
    pub(crate) old: Option<AnyValue>,
    pub(crate) new: Option<AnyValue>,
}

enum LinkSlot {
    Unsubscribed,
    Subscribed {
        source: AnyValue,
        value: Option<AnyValue>,
        generation: u64,
        _subscription: Option<Subscription>,
    },
}

struct TrackerState {
    links: Vec<LinkSlot>,
    next_generation: u64,
}

impl TrackerState {
    fn terminal(&self) -> Option<AnyValue> {
        match self.links.last() {
            Some(LinkSlot::Subscribed { value, .. }) => value.clone(),
            _ => None,
        }
    }

    fn source(&self, depth: usize) -> Option<(usize, AnyValue)> {
        self.links[..=depth]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, slot)| match slot {
                LinkSlot::Subscribed { source, .. } => Some((index, source.clone())),
                LinkSlot::Unsubscribed => None,
            })
    }
}

struct TrackerInner {
    path: Arc<RawPath>,
    state: Mutex<TrackerState>,
    changed: Event<RawChange>,
    disposed: AtomicBool,
}

impl TrackerInner {
    /// Rebuild links `start..` reading from `source`.
    ///
    /// Subscribes before reading so a change landing in between is not lost.
    /// Replaced slots go to `released`; the caller drops them once the state
    /// lock is gone, since unsubscribing waits for a running handler.
    fn resubscribe_from(
        self: &Arc<Self>,
        state: &mut TrackerState,
        start: usize,
        mut source: Option<AnyValue>,
        released: &mut Vec<LinkSlot>,
    ) {
        for index in start..state.links.len() {
            let slot = match source.take() {
                None => LinkSlot::Unsubscribed,
                Some(current) => {
                    let link = &self.path.links()[index];
                    let generation = state.next_generation;
                    state.next_generation += 1;

                    let weak = Arc::downgrade(self);
                    let subscription = link.subscribe(
                        &current,
                        Box::new(move || {
                            if let Some(inner) = Weak::upgrade(&weak) {
                                inner.on_link_changed(index, generation);
                            }
                        }),
                    );
                    let value = link.read(&current);
                    trace!(
                        link = index,
                        property = %link.property(),
                        has_value = value.is_some(),
                        "subscribed link"
                    );

                    source = value.clone();
                    LinkSlot::Subscribed {
                        source: current,
                        value,
                        generation,
                        _subscription: subscription,
                    }
                }
            };
            released.push(std::mem::replace(&mut state.links[index], slot));
        }
    }

    fn on_link_changed(self: &Arc<Self>, index: usize, generation: u64) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let mut released = Vec::new();
        let change = {
            let mut state = self.state.lock();
            if self.disposed.load(Ordering::SeqCst) {
                return;
            }

            let link = &self.path.links()[index];
            let (current, previous) = match &state.links[index] {
                LinkSlot::Subscribed {
                    source,
                    value,
                    generation: live,
                    ..
                } if *live == generation => (link.read(source), value.clone()),
                _ => {
                    trace!(link = index, "dropping notification from a replaced subscription");
                    return;
                }
            };

            let unchanged = match (&previous, &current) {
                (Some(a), Some(b)) => link.same(a, b),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                trace!(link = index, "link value unchanged");
                return;
            }

            let old = state.terminal();
            if let LinkSlot::Subscribed { value, .. } = &mut state.links[index] {
                *value = current.clone();
            }
            self.resubscribe_from(&mut state, index + 1, current, &mut released);
            RawChange {
                old,
                new: state.terminal(),
            }
        };
        drop(released);

        if !self.disposed.load(Ordering::SeqCst) {
            self.changed.raise(&change);
        }
    }

    fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let released: Vec<LinkSlot> = {
            let mut state = self.state.lock();
            state
                .links
                .iter_mut()
                .map(|slot| std::mem::replace(slot, LinkSlot::Unsubscribed))
                .collect()
        };
        drop(released);
        self.changed.clear();
        true
    }
}

/// Untyped tracker core, shared by the typed tracker and the items trackers.
pub(crate) struct PathTracker {
    inner: Arc<TrackerInner>,
}

impl PathTracker {
    pub(crate) fn new(root: AnyValue, path: Arc<RawPath>) -> Self {
        let links = (0..path.len()).map(|_| LinkSlot::Unsubscribed).collect();
        let inner = Arc::new(TrackerInner {
            path,
            state: Mutex::new(TrackerState {
                links,
                next_generation: 0,
            }),
            changed: Event::new(),
            disposed: AtomicBool::new(false),
        });

        let mut released = Vec::new();
        {
            let mut state = inner.state.lock();
            inner.resubscribe_from(&mut state, 0, Some(root), &mut released);
        }
        drop(released);
        debug!(path = ?inner.path, "created property path tracker");

        Self { inner }
    }

    pub(crate) fn terminal(&self) -> Option<AnyValue> {
        self.inner.state.lock().terminal()
    }

    /// `None` once disposed: the root link is only unsubscribed then.
    pub(crate) fn deepest_source(&self) -> Option<(usize, AnyValue, Option<AnyValue>)> {
        let state = self.inner.state.lock();
        let last = state.links.len() - 1;
        let (depth, source) = state.source(last)?;
        let value = match &state.links[depth] {
            LinkSlot::Subscribed { value, .. } if depth == last => value.clone(),
            _ => None,
        };
        Some((depth, source, value))
    }

    pub(crate) fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&RawChange) + Send + Sync + 'static,
    {
        self.inner.changed.subscribe(handler)
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn dispose(&self) {
        if self.inner.dispose() {
            debug!(path = ?self.inner.path, "disposed property path tracker");
        }
    }

    #[cfg(test)]
    fn active_subscriptions(&self) -> usize {
        self.inner
            .state
            .lock()
            .links
            .iter()
            .filter(|slot| matches!(slot, LinkSlot::Subscribed { _subscription: Some(_), .. }))
            .count()
    }
}

impl Drop for PathTracker {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Tracks the terminal value of a [`NotifyingPath`] from one root.
///
/// # Example
///
/// ```rust,ignore
/// let tracker = path.create_tracker(fake.clone());
/// let _subscription = tracker.subscribe(|change| {
///     println!("{:?} -> {:?}", change.old, change.new);
/// })?;
///
/// fake.set_next(Some(level)); // handler runs once
/// ```
pub struct PropertyPathTracker<S, P> {
    core: PathTracker,
    root: Arc<S>,
    path: NotifyingPath<S, P>,
}

impl<S, P> PropertyPathTracker<S, P>
where
    S: NotifyPropertyChanged,
    P: PathValue,
{
    pub fn new(root: Arc<S>, path: &NotifyingPath<S, P>) -> Self {
        let erased: AnyValue = Arc::new(Arc::clone(&root));
        Self {
            core: PathTracker::new(erased, Arc::clone(path.raw())),
            root,
            path: path.clone(),
        }
    }

    pub fn root(&self) -> &Arc<S> {
        &self.root
    }

    pub fn path(&self) -> &NotifyingPath<S, P> {
        &self.path
    }

    /// The current terminal value, `None` if any link is `None`.
    pub fn value(&self) -> Result<Option<P>> {
        self.ensure_live()?;
        Ok(downcast(self.core.terminal()))
    }

    /// The deepest live source and the terminal value, as currently tracked.
    pub fn source_and_value(&self) -> Result<SourceAndValue<P>> {
        let (depth, source, value) = self.core.deepest_source().ok_or(Error::Disposed)?;
        Ok(SourceAndValue::new(depth, source, downcast(value)))
    }

    /// Register a handler for terminal value changes.
    pub fn subscribe<F>(&self, handler: F) -> Result<Subscription>
    where
        F: Fn(&ValueChanged<P>) + Send + Sync + 'static,
    {
        self.ensure_live()?;
        Ok(self.core.subscribe(move |change: &RawChange| {
            handler(&ValueChanged {
                old: downcast(change.old.clone()),
                new: downcast(change.new.clone()),
            });
        }))
    }

    /// Like [`subscribe`](Self::subscribe), but first calls the handler once
    /// with the current value as `new` and `None` as `old`.
    pub fn subscribe_with_initial<F>(&self, handler: F) -> Result<Subscription>
    where
        F: Fn(&ValueChanged<P>) + Send + Sync + 'static,
    {
        let current = self.value()?;
        handler(&ValueChanged {
            old: None,
            new: current,
        });
        self.subscribe(handler)
    }

    /// Release every link subscription. Calling it again does nothing.
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

impl<S, P> ObservableValue<P> for PropertyPathTracker<S, P>
where
    S: NotifyPropertyChanged,
    P: PathValue,
{
    fn value(&self) -> Result<Option<P>> {
        PropertyPathTracker::value(self)
    }

    fn subscribe<F>(&self, handler: F) -> Result<Subscription>
    where
        F: Fn(&ValueChanged<P>) + Send + Sync + 'static,
    {
        PropertyPathTracker::subscribe(self, handler)
    }
}

impl<S, P> fmt::Debug for PropertyPathTracker<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyPathTracker")
            .field("path", &self.path)
            .field("disposed", &self.core.is_disposed())
            .finish()
    }
}

pub(crate) fn downcast<P: Clone + 'static>(value: Option<AnyValue>) -> Option<P> {
    value.and_then(|value| value.downcast_ref::<P>().cloned())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Fake, Level};
    use crate::path::{Chain, Interner};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn next_value(interner: &Interner) -> NotifyingPath<Fake, i32> {
        interner
            .path(Chain::new(Fake::next_property()).then(Level::value_property()))
            .unwrap()
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&ValueChanged<i32>) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        (count, move |_: &ValueChanged<i32>| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn null_link_yields_no_value() {
        let interner = Interner::new();
        let fake = Fake::new(None);
        let tracker = next_value(&interner).create_tracker(fake.clone());

        assert_eq!(tracker.value().unwrap(), None);
        // Only the root link has a source.
        assert_eq!(tracker.core.active_subscriptions(), 1);
    }

    #[test]
    fn setting_the_null_link_raises_once() {
        let interner = Interner::new();
        let fake = Fake::new(None);
        let tracker = next_value(&interner).create_tracker(fake.clone());
        let (count, handler) = counter();
        let _subscription = tracker.subscribe(handler).unwrap();

        fake.set_next(Some(Level::new(5)));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.value().unwrap(), Some(5));
        assert_eq!(tracker.core.active_subscriptions(), 2);
    }

    #[test]
    fn reassigning_the_same_instance_is_silent() {
        let interner = Interner::new();
        let level = Level::new(1);
        let fake = Fake::new(Some(level.clone()));
        let tracker = next_value(&interner).create_tracker(fake.clone());
        let (count, handler) = counter();
        let _subscription = tracker.subscribe(handler).unwrap();

        fake.set_next(Some(level.clone()));
        level.set_value(1);
        level.notify_all();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(level.handler_count(), 1);
    }

    #[test]
    fn old_link_targets_are_released() {
        let interner = Interner::new();
        let first = Level::new(1);
        let fake = Fake::new(Some(first.clone()));
        let tracker = next_value(&interner).create_tracker(fake.clone());
        assert_eq!(first.handler_count(), 1);

        let second = Level::new(2);
        fake.set_next(Some(second.clone()));
        assert_eq!(first.handler_count(), 0);
        assert_eq!(second.handler_count(), 1);

        // The detached level no longer drives the tracker.
        let (count, handler) = counter();
        let _subscription = tracker.subscribe(handler).unwrap();
        first.set_value(10);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.value().unwrap(), Some(2));
    }

    #[test]
    fn change_event_carries_old_and_new() {
        let interner = Interner::new();
        let level = Level::new(1);
        let fake = Fake::new(Some(level.clone()));
        let tracker = next_value(&interner).create_tracker(fake.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _subscription = tracker
            .subscribe(move |change| seen_clone.lock().push(change.clone()))
            .unwrap();

        level.set_value(2);
        fake.set_next(None);

        assert_eq!(
            *seen.lock(),
            vec![
                ValueChanged { old: Some(1), new: Some(2) },
                ValueChanged { old: Some(2), new: None },
            ]
        );
    }

    #[test]
    fn source_and_value_reports_deepest_live_source() {
        let interner = Interner::new();
        let fake = Fake::new(None);
        let tracker = next_value(&interner).create_tracker(fake.clone());

        let snapshot = tracker.source_and_value().unwrap();
        assert_eq!(snapshot.depth(), 0);
        assert!(Arc::ptr_eq(&snapshot.source_as::<Fake>().unwrap(), &fake));

        let level = Level::new(3);
        fake.set_next(Some(level.clone()));
        let snapshot = tracker.source_and_value().unwrap();
        assert_eq!(snapshot.depth(), 1);
        assert_eq!(snapshot.value(), Some(&3));
        assert!(Arc::ptr_eq(&snapshot.source_as::<Level>().unwrap(), &level));
    }

    #[test]
    fn subscribe_with_initial_reports_current_value() {
        let interner = Interner::new();
        let fake = Fake::new(Some(Level::new(8)));
        let tracker = next_value(&interner).create_tracker(fake);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _subscription = tracker
            .subscribe_with_initial(move |change| seen_clone.lock().push(change.new))
            .unwrap();

        assert_eq!(*seen.lock(), vec![Some(8)]);
    }

    #[test]
    fn dispose_is_idempotent_and_releases_links() {
        let interner = Interner::new();
        let level = Level::new(1);
        let fake = Fake::new(Some(level.clone()));
        let tracker = next_value(&interner).create_tracker(fake.clone());

        tracker.dispose();
        tracker.dispose();

        assert!(tracker.is_disposed());
        assert_eq!(fake.handler_count(), 0);
        assert_eq!(level.handler_count(), 0);
        assert_eq!(tracker.value(), Err(Error::Disposed));
        assert!(matches!(tracker.subscribe(|_| {}), Err(Error::Disposed)));
    }

    #[test]
    fn dispose_in_first_handler_silences_the_rest() {
        let interner = Interner::new();
        let fake = Fake::new(None);
        let tracker = Arc::new(next_value(&interner).create_tracker(fake.clone()));

        let weak = Arc::downgrade(&tracker);
        let _first = tracker
            .subscribe(move |_| {
                if let Some(tracker) = weak.upgrade() {
                    tracker.dispose();
                }
            })
            .unwrap();
        let (count, handler) = counter();
        let _second = tracker.subscribe(handler).unwrap();

        fake.set_next(Some(Level::new(1)));

        assert!(tracker.is_disposed());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(fake.handler_count(), 0);
    }

    #[test]
    fn dropping_the_tracker_unsubscribes() {
        let interner = Interner::new();
        let fake = Fake::new(Some(Level::new(1)));
        let tracker = next_value(&interner).create_tracker(fake.clone());
        assert_eq!(fake.handler_count(), 1);

        drop(tracker);
        assert_eq!(fake.handler_count(), 0);
    }
}
