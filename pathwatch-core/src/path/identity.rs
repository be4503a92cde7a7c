//! Identity comparison for link values.
//!
//! Deciding whether a link "changed" is an identity question. Shared objects
//! (`Arc<T>`) are compared by pointer, so a new instance with equal fields is
//! still a change. Plain values are compared by value, and floats by bit
//! pattern so that `NaN` re-assigned over `NaN` is not reported.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Equality as seen by trackers and the refcounted cache.
pub trait Identity {
    /// Whether `self` and `other` are the same value for change detection.
    fn same(&self, other: &Self) -> bool;
}

/// A value that can flow along a property path.
pub trait PathValue: Identity + Clone + Send + Sync + 'static {}

impl<T> PathValue for T where T: Identity + Clone + Send + Sync + 'static {}

impl<T: ?Sized> Identity for Arc<T> {
    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: Identity> Identity for Option<T> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        }
    }
}

macro_rules! identity_by_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Identity for $ty {
                fn same(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

identity_by_value!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    String,
    &'static str,
);

impl Identity for f32 {
    fn same(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl Identity for f64 {
    fn same(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

/// An `Arc<T>` hashed and compared by pointer.
///
/// Used as the key of identity-keyed tables: two distinct instances with
/// equal contents are two keys.
pub struct ByIdentity<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized> ByIdentity<T> {
    pub fn new(value: Arc<T>) -> Self {
        Self(value)
    }

    pub fn get(&self) -> &Arc<T> {
        &self.0
    }

    pub fn into_inner(self) -> Arc<T> {
        self.0
    }

    fn address(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl<T: ?Sized> Clone for ByIdentity<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for ByIdentity<T> {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl<T: ?Sized> Eq for ByIdentity<T> {}

impl<T: ?Sized> Hash for ByIdentity<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for ByIdentity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ByIdentity").field(&self.address()).finish()
    }
}

impl<T: ?Sized> From<Arc<T>> for ByIdentity<T> {
    fn from(value: Arc<T>) -> Self {
        Self(value)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
