//! Error types for path construction and tracker access.
//!
//! Null links are not errors: a `None` anywhere along a chain simply
//! collapses the terminal value to "no value". The variants here cover
//! programming errors caught while building a path and calls made on a
//! tracker after it was disposed.

use thiserror::Error;

use crate::path::PropertyId;

/// Result type alias for pathwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The tracker was disposed before the call.
    #[error("tracker has already been disposed")]
    Disposed,

    /// A path must contain at least one link.
    #[error("a property path needs at least one link")]
    EmptyPath,

    /// Link `index` expects a source type other than what the previous link
    /// (or the root) produces.
    #[error("link {index} expects source `{expected}` but receives `{found}`")]
    LinkTypeMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// The same property identity was registered with two value types.
    #[error("property {property} is registered as `{existing}`, requested as `{requested}`")]
    PropertyTypeConflict {
        property: PropertyId,
        existing: &'static str,
        requested: &'static str,
    },
}

impl Error {
    pub(crate) fn mismatch(index: usize, expected: &'static str, found: &'static str) -> Self {
        Self::LinkTypeMismatch {
            index,
            expected,
            found,
        }
    }
}
