//! Contracts trackers expose to their consumers.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::notify::Subscription;

/// The terminal value of a tracked path changed.
///
/// `None` means "no value": some link along the path is currently `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChanged<T> {
    pub old: Option<T>,
    pub new: Option<T>,
}

/// A tracked item's value changed, or the item joined or left the
/// collection.
pub struct ItemValueChanged<I, P> {
    /// The originating item, `None` for a null collection slot.
    pub item: Option<Arc<I>>,
    /// The item's current terminal value, `None` once it left.
    pub value: Option<P>,
}

impl<I, P: Clone> Clone for ItemValueChanged<I, P> {
    fn clone(&self) -> Self {
        Self {
            item: self.item.clone(),
            value: self.value.clone(),
        }
    }
}

impl<I, P: fmt::Debug> fmt::Debug for ItemValueChanged<I, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemValueChanged")
            .field("item", &self.item.as_ref().map(Arc::as_ptr))
            .field("value", &self.value)
            .finish()
    }
}

/// Something about a tracked item changed. Raised by the slim trackers,
/// which do not carry values.
pub struct ItemChanged<I> {
    pub item: Option<Arc<I>>,
}

impl<I> Clone for ItemChanged<I> {
    fn clone(&self) -> Self {
        Self {
            item: self.item.clone(),
        }
    }
}

impl<I> fmt::Debug for ItemChanged<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemChanged")
            .field("item", &self.item.as_ref().map(Arc::as_ptr))
            .finish()
    }
}

/// A current value (or "no value") plus a change event.
pub trait ObservableValue<T> {
    fn value(&self) -> Result<Option<T>>;

    fn subscribe<F>(&self, handler: F) -> Result<Subscription>
    where
        F: Fn(&ValueChanged<T>) + Send + Sync + 'static;
}

/// A change event tagged with the originating item.
pub trait ObservableItemValue<I, P> {
    fn subscribe<F>(&self, handler: F) -> Result<Subscription>
    where
        F: Fn(&ItemValueChanged<I, P>) + Send + Sync + 'static;
}
