//! Property Paths
//!
//! This module turns a resolved chain of property accessors into an
//! interned, typed [`NotifyingPath`].
//!
//! # Concepts
//!
//! ## Properties and getters
//!
//! A [`Property`] names one readable property of a type. Interning it yields
//! a [`Getter`], which the rest of the crate drives through the type-erased
//! [`Link`] trait.
//!
//! ## Paths
//!
//! A [`NotifyingPath`] is an ordered list of links where every link reads
//! from the value the previous one produced. Paths are interned by the
//! sequence of property identities, so equal chains share one instance.
//!
//! ## Identity
//!
//! Whether a link changed is decided by [`Identity`]: pointer identity for
//! shared objects, value equality for plain values.

mod getter;
mod identity;
mod interner;
mod notifying_path;

pub use getter::{AnyValue, Getter, Link, Property, PropertyId};
pub use identity::{ByIdentity, Identity, PathValue};
pub use interner::Interner;
pub use notifying_path::{Chain, NotifyingPath, SourceAndValue};

pub(crate) use notifying_path::RawPath;
