//! Notifying objects used by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use pathwatch_core::path::Property;
use pathwatch_core::{Event, NotifyPropertyChanged, PropertyChangedArgs};

/// A link in a chain of levels, each carrying a value.
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

/// The root of a chain.
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

    pub fn handler_count(&self) -> usize {
        self.changed.handler_count()
    }

    pub fn next_property() -> Property<Fake, Arc<Level>> {
        Property::new("next", Fake::next)
    }
}

impl NotifyPropertyChanged for Fake {
    fn property_changed(&self) -> &Event<PropertyChangedArgs> {
        &self.changed
    }
}

/// Collects every value a handler is called with.
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sink(&self) -> impl Fn(T) + Send + Sync + 'static {
        let seen = self.seen.clone();
        move |value| seen.lock().push(value)
    }

    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.seen.lock())
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }
}
