//! Handler identity for event subscriptions.
//!
//! Every handler registered on an [`Event`](super::Event) gets a
//! `SubscriberId`. The id is what a [`Subscription`](super::Subscription)
//! uses to find and remove its handler again.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ids are handed out process-wide, starting at 1.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
