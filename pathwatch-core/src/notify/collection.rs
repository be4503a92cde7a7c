//! Collection change notifications.
//!
//! A live collection raises [`CollectionChangedArgs`] after each mutation.
//! Items are shared `Arc<T>` values and may be `None`; identity, not value
//! equality, is what trackers key on.
//!
//! [`ObservableCollection`] is a ready-made thread-safe implementation of
//! [`NotifyCollectionChanged`] for callers that do not bring their own.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Event;

/// A collection slot: an item or a null entry.
pub type Item<T> = Option<Arc<T>>;

/// The kind of mutation a collection reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionAction {
    Add,
    Remove,
    Replace,
    Move,
    /// The contents changed wholesale; re-read the collection.
    Reset,
}

/// Arguments of a collection-changed notification.
pub struct CollectionChangedArgs<T> {
    pub action: CollectionAction,
    pub old_items: Vec<Item<T>>,
    pub new_items: Vec<Item<T>>,
    pub old_index: Option<usize>,
    pub new_index: Option<usize>,
}

impl<T> CollectionChangedArgs<T> {
    pub fn add(items: Vec<Item<T>>, index: usize) -> Self {
        Self {
            action: CollectionAction::Add,
            old_items: Vec::new(),
            new_items: items,
            old_index: None,
            new_index: Some(index),
        }
    }

    pub fn remove(items: Vec<Item<T>>, index: usize) -> Self {
        Self {
            action: CollectionAction::Remove,
            old_items: items,
            new_items: Vec::new(),
            old_index: Some(index),
            new_index: None,
        }
    }

    pub fn replace(old_items: Vec<Item<T>>, new_items: Vec<Item<T>>, index: usize) -> Self {
        Self {
            action: CollectionAction::Replace,
            old_items,
            new_items,
            old_index: Some(index),
            new_index: Some(index),
        }
    }

    pub fn moved(items: Vec<Item<T>>, old_index: usize, new_index: usize) -> Self {
        Self {
            action: CollectionAction::Move,
            old_items: items.clone(),
            new_items: items,
            old_index: Some(old_index),
            new_index: Some(new_index),
        }
    }

    pub fn reset() -> Self {
        Self {
            action: CollectionAction::Reset,
            old_items: Vec::new(),
            new_items: Vec::new(),
            old_index: None,
            new_index: None,
        }
    }
}

impl<T> Clone for CollectionChangedArgs<T> {
    fn clone(&self) -> Self {
        Self {
            action: self.action,
            old_items: self.old_items.clone(),
            new_items: self.new_items.clone(),
            old_index: self.old_index,
            new_index: self.new_index,
        }
    }
}

impl<T> fmt::Debug for CollectionChangedArgs<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionChangedArgs")
            .field("action", &self.action)
            .field("old_items", &self.old_items.len())
            .field("new_items", &self.new_items.len())
            .field("old_index", &self.old_index)
            .field("new_index", &self.new_index)
            .finish()
    }
}

/// A collection that raises collection-changed notifications.
pub trait NotifyCollectionChanged<T>: Send + Sync + 'static {
    /// Snapshot of the current contents, in order.
    fn items(&self) -> Vec<Item<T>>;

    /// The event raised after the contents changed.
    fn collection_changed(&self) -> &Event<CollectionChangedArgs<T>>;
}

/// A thread-safe list of shared items that reports its own mutations.
///
/// Notifications are raised after the internal lock is released, so a
/// handler may read or mutate the collection again.
pub struct ObservableCollection<T> {
    items: RwLock<Vec<Item<T>>>,
    changed: Event<CollectionChangedArgs<T>>,
}

impl<T: Send + Sync + 'static> ObservableCollection<T> {
    pub fn new() -> Self {
        Self::from_items(Vec::new())
    }

    pub fn from_items(items: Vec<Item<T>>) -> Self {
        Self {
            items: RwLock::new(items),
            changed: Event::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Item<T>> {
        self.items.read().get(index).cloned()
    }

    /// Append an item.
    pub fn push(&self, item: Item<T>) {
        let index = {
            let mut items = self.items.write();
            items.push(item.clone());
            items.len() - 1
        };
        self.changed.raise(&CollectionChangedArgs::add(vec![item], index));
    }

    /// Insert an item at `index`, clamped to the current length.
    pub fn insert(&self, index: usize, item: Item<T>) {
        let index = {
            let mut items = self.items.write();
            let index = index.min(items.len());
            items.insert(index, item.clone());
            index
        };
        self.changed.raise(&CollectionChangedArgs::add(vec![item], index));
    }

    /// Remove the item at `index`. Returns `None` when out of range.
    pub fn remove_at(&self, index: usize) -> Option<Item<T>> {
        let removed = {
            let mut items = self.items.write();
            if index >= items.len() {
                return None;
            }
            items.remove(index)
        };
        self.changed
            .raise(&CollectionChangedArgs::remove(vec![removed.clone()], index));
        Some(removed)
    }

    /// Remove the first occurrence of `item` (by identity).
    pub fn remove(&self, item: &Arc<T>) -> bool {
        let position = self
            .items
            .read()
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|existing| Arc::ptr_eq(existing, item)));
        match position {
            Some(index) => self.remove_at(index).is_some(),
            None => false,
        }
    }

    /// Overwrite the slot at `index`. Returns the previous item.
    pub fn replace(&self, index: usize, item: Item<T>) -> Option<Item<T>> {
        let previous = {
            let mut items = self.items.write();
            let slot = items.get_mut(index)?;
            std::mem::replace(slot, item.clone())
        };
        self.changed.raise(&CollectionChangedArgs::replace(
            vec![previous.clone()],
            vec![item],
            index,
        ));
        Some(previous)
    }

    /// Move the item at `from` so it ends up at `to`.
    pub fn move_item(&self, from: usize, to: usize) -> bool {
        let moved = {
            let mut items = self.items.write();
            if from >= items.len() || to >= items.len() {
                return false;
            }
            let item = items.remove(from);
            items.insert(to, item.clone());
            item
        };
        self.changed
            .raise(&CollectionChangedArgs::moved(vec![moved], from, to));
        true
    }

    /// Remove everything. Reported as a reset.
    pub fn clear(&self) {
        self.items.write().clear();
        self.changed.raise(&CollectionChangedArgs::reset());
    }

    /// Swap in new contents. Reported as a reset.
    pub fn reset_with(&self, items: Vec<Item<T>>) {
        *self.items.write() = items;
        self.changed.raise(&CollectionChangedArgs::reset());
    }
}

impl<T: Send + Sync + 'static> Default for ObservableCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> NotifyCollectionChanged<T> for ObservableCollection<T> {
    fn items(&self) -> Vec<Item<T>> {
        self.items.read().clone()
    }

    fn collection_changed(&self) -> &Event<CollectionChangedArgs<T>> {
        &self.changed
    }
}

impl<T> fmt::Debug for ObservableCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableCollection")
            .field("len", &self.items.read().len())
            .field("changed", &self.changed)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
