//! Event Implementation
//!
//! An `Event<A>` is a list of handlers that all receive the same `&A` when
//! the event is raised. It is the one notification primitive used across
//! the crate: objects raise property-changed events, collections raise
//! collection-changed events and trackers raise their aggregated
//! value-changed events through it.
//!
//! # How Events Work
//!
//! 1. `subscribe` stores the handler under a fresh [`SubscriberId`] and
//!    returns a [`Subscription`] guard.
//!
//! 2. `raise` takes a snapshot of the handler list, releases the lock and
//!    only then invokes the handlers. A handler may therefore subscribe,
//!    unsubscribe or raise again without deadlocking.
//!
//! 3. Dropping the `Subscription` removes the handler. The guard only holds
//!    a weak reference to the handler list, so it never keeps the event
//!    owner alive.
//!
//! # Gates
//!
//! Each handler sits behind a gate that is open while it is subscribed.
//! `raise` enters the gate before every call and skips handlers whose gate
//! was closed in the meantime, so a handler removed by an earlier handler of
//! the same `raise` is not called.
//!
//! Closing a gate waits for a call in progress on another thread. Once
//! unsubscription returns, the handler is not running and will not run
//! again. The gate is reentrant: a handler may drop its own subscription.
//!
//! # Thread Safety
//!
//! The handler list is protected by a `parking_lot::RwLock`. Raising takes
//! the read lock just long enough to clone the handler `Arc`s.

use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{ReentrantMutex, RwLock};
use smallvec::SmallVec;

use super::SubscriberId;

type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Open while the handler is subscribed.
type Gate = Arc<ReentrantMutex<Cell<bool>>>;

struct Registration<A> {
    id: SubscriberId,
    gate: Gate,
    handler: Handler<A>,
}

type HandlerList<A> = RwLock<Vec<Registration<A>>>;

fn close(gate: &Gate) {
    gate.lock().set(false);
}

/// A multicast notification source carrying arguments of type `A`.
pub struct Event<A> {
    handlers: Arc<HandlerList<A>>,
}

impl<A: 'static> Event<A> {
    /// Create an event with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a handler.
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// dropped or [`Event::clear`] is called.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = SubscriberId::next();
        let gate: Gate = Arc::new(ReentrantMutex::new(Cell::new(true)));
        self.handlers.write().push(Registration {
            id,
            gate: Arc::clone(&gate),
            handler: Arc::new(handler),
        });

        let list: Weak<HandlerList<A>> = Arc::downgrade(&self.handlers);
        Subscription::new(id, move || {
            close(&gate);
            if let Some(list) = list.upgrade() {
                list.write().retain(|registration| registration.id != id);
            }
        })
    }

    /// Invoke every handler registered at the time of the call that is
    /// still subscribed when its turn comes.
    pub fn raise(&self, args: &A) {
        let snapshot: SmallVec<[(Gate, Handler<A>); 4]> = self
            .handlers
            .read()
            .iter()
            .map(|registration| {
                (
                    Arc::clone(&registration.gate),
                    Arc::clone(&registration.handler),
                )
            })
            .collect();

        for (gate, handler) in snapshot {
            let open = gate.lock();
            if open.get() {
                handler(args);
            }
        }
    }

    /// Remove all handlers. Outstanding subscriptions become no-ops.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.handlers.write());
        for registration in &removed {
            close(&registration.gate);
        }
    }

    /// Get the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Check whether a handler with the given ID is still registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.handlers
            .read()
            .iter()
            .any(|registration| registration.id == id)
    }
}

impl<A: 'static> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("handler_count", &self.handlers.read().len())
            .finish()
    }
}

/// Guard for a registered handler.
///
/// Dropping the guard unregisters the handler. Unsubscription has happened
/// by the time `drop` (or [`Subscription::unsubscribe`]) returns.
#[must_use = "dropping a Subscription immediately unregisters its handler"]
pub struct Subscription {
    id: SubscriberId,
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new<F>(id: SubscriberId, remove: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            id,
            remove: Some(Box::new(remove)),
        }
    }

    /// Get the ID of the handler this guard owns.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Unregister the handler now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.remove.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
