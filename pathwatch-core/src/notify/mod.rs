//! Change Notification Primitives
//!
//! This module holds the raw notification streams that trackers consume:
//! property-changed events raised by individual objects and
//! collection-changed events raised by live collections.
//!
//! # Concepts
//!
//! ## Events
//!
//! An [`Event`] is a handler list. Raising an event calls every handler that
//! was registered at that moment, outside of any lock.
//!
//! ## Subscriptions
//!
//! Registering a handler returns a [`Subscription`]. Dropping it removes the
//! handler, so ownership of the guard is ownership of the subscription.
//!
//! ## Property and collection notifications
//!
//! [`NotifyPropertyChanged`] and [`NotifyCollectionChanged`] are the two
//! capabilities collaborators provide. [`ObservableCollection`] is a
//! ready-made implementation of the latter.

mod collection;
mod event;
mod property;
mod subscriber;

pub use collection::{
    CollectionAction, CollectionChangedArgs, Item, NotifyCollectionChanged, ObservableCollection,
};
pub use event::{Event, Subscription};
pub use property::{NotifyPropertyChanged, PropertyChangedArgs};
pub use subscriber::SubscriberId;
