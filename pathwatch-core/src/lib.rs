//! Pathwatch Core
//!
//! This crate tracks changes along chains of properties, such as
//! `fake.next.next.value`, across objects that announce their own property
//! changes. It implements:
//!
//! - Interned property getters and paths
//! - Trackers that follow a path from one root object
//! - Trackers that follow a path from every item of a live collection
//! - A reference-counted cache for derived collection values
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `notify`: Events, subscriptions and the notification contracts
//! - `path`: Getters, typed chains and the interning tables
//! - `tracker`: Path trackers and items trackers
//! - `mapping`: Reference-counted derived values with refresh transactions
//!
//! # Example
//!
//! ```rust,ignore
//! use pathwatch_core::path::{Chain, NotifyingPath};
//!
//! let path = NotifyingPath::get_or_create(
//!     Chain::new(Fake::next_property())
//!         .then(Level::next_property())
//!         .then(Level::value_property()),
//! )?;
//!
//! let tracker = path.create_tracker(fake.clone());
//! let _subscription = tracker.subscribe(|change| {
//!     println!("{:?} -> {:?}", change.old, change.new);
//! })?;
//!
//! fake.set_next(Some(Level::with_next(Some(Level::new(1)), 0)));
//! // prints: "None -> Some(1)"
//! ```

pub mod error;
pub mod mapping;
pub mod notify;
pub mod path;
pub mod tracker;

#[cfg(test)]
mod fixtures;

pub use error::{Error, Result};
pub use mapping::{RefCountedCache, RefreshTransaction};
pub use notify::{
    CollectionAction, CollectionChangedArgs, Event, NotifyCollectionChanged,
    NotifyPropertyChanged, ObservableCollection, PropertyChangedArgs, Subscription,
};
pub use path::{Chain, Getter, Interner, NotifyingPath, Property};
pub use tracker::{
    ItemsTracker, ItemsTrackerSlim, ObservableItemValue, ObservableValue, PropertyPathTracker,
    ValueChanged,
};
