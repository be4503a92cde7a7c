//! Trackers
//!
//! Live objects that mirror a [`NotifyingPath`](crate::path::NotifyingPath)
//! with subscriptions and raise one aggregated event when the path's value
//! changes.
//!
//! # Concepts
//!
//! ## Path trackers
//!
//! A [`PropertyPathTracker`] follows one path from one root. It keeps a
//! subscription on every live link and re-subscribes the tail of the chain
//! whenever an intermediate link switches to another object.
//!
//! ## Items trackers
//!
//! [`ItemsTracker`] and [`ItemsTrackerSlim`] follow one path from every item
//! of a live collection, keeping up with additions, removals and resets.
//!
//! ## Disposal
//!
//! Every tracker can be disposed explicitly and disposes itself on drop.
//! Once `dispose` returns no further event is delivered, even when it was
//! called from inside one of the tracker's own handlers.

mod items;
mod items_tracker;
mod observable;
mod path_tracker;

pub use items_tracker::{ItemsTracker, ItemsTrackerSlim, TrackerKind};
pub use observable::{
    ItemChanged, ItemValueChanged, ObservableItemValue, ObservableValue, ValueChanged,
};
pub use path_tracker::PropertyPathTracker;

pub(crate) use path_tracker::downcast;
