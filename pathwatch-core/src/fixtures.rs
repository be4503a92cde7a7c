//! Notifying test objects shared by the unit tests.
//!
//! Setters always raise, even when the new value equals the old one, so
//! tests can check that trackers filter same-value notifications.
//!
//! `tests/common` carries its own `Fake` and `Level`: integration tests only
//! see the public API and cannot reach this `cfg(test)` module. This copy
//! additionally has `notify_all` for the "all properties" notification.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::notify::{Event, NotifyPropertyChanged, PropertyChangedArgs};
use crate::path::Property;

pub struct Level {
    next: RwLock<Option<Arc<Level>>>,
    value: RwLock<i32>,
    changed: Event<PropertyChangedArgs>,
}

impl Level {
    pub fn new(value: i32) -> Arc<Self> {
        Self::with_next(None, value)
    }

    pub fn with_next(next: Option<Arc<Level>>, value: i32) -> Arc<Self> {
        Arc::new(Self {
            next: RwLock::new(next),
            value: RwLock::new(value),
            changed: Event::new(),
        })
    }

    pub fn next(&self) -> Option<Arc<Level>> {
        self.next.read().clone()
    }

    pub fn set_next(&self, next: Option<Arc<Level>>) {
        *self.next.write() = next;
        self.changed.raise(&PropertyChangedArgs::new("next"));
    }

    pub fn value(&self) -> i32 {
        *self.value.read()
    }

    pub fn set_value(&self, value: i32) {
        *self.value.write() = value;
        self.changed.raise(&PropertyChangedArgs::new("value"));
    }

    pub fn notify_all(&self) {
        self.changed.raise(&PropertyChangedArgs::all());
    }

    pub fn handler_count(&self) -> usize {
        self.changed.handler_count()
    }

    pub fn next_property() -> Property<Level, Arc<Level>> {
        Property::new("next", Level::next)
    }

    pub fn value_property() -> Property<Level, i32> {
        Property::new("value", |level: &Level| Some(level.value()))
    }
}

impl NotifyPropertyChanged for Level {
    fn property_changed(&self) -> &Event<PropertyChangedArgs> {
        &self.changed
    }
}

pub struct Fake {
    next: RwLock<Option<Arc<Level>>>,
    changed: Event<PropertyChangedArgs>,
}

impl Fake {
    pub fn new(next: Option<Arc<Level>>) -> Arc<Self> {
        Arc::new(Self {
            next: RwLock::new(next),
            changed: Event::new(),
        })
    }

    pub fn next(&self) -> Option<Arc<Level>> {
        self.next.read().clone()
    }

    pub fn set_next(&self, next: Option<Arc<Level>>) {
        *self.next.write() = next;
        self.changed.raise(&PropertyChangedArgs::new("next"));
    }

    pub fn next_property() -> Property<Fake, Arc<Level>> {
        Property::new("next", Fake::next)
    }

    pub fn handler_count(&self) -> usize {
        self.changed.handler_count()
    }
}

impl NotifyPropertyChanged for Fake {
    fn property_changed(&self) -> &Event<PropertyChangedArgs> {
        &self.changed
    }
}
