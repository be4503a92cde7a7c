//! Getter and path interning.
//!
//! The interner owns two tables:
//!
//! - getters, keyed by [`PropertyId`], so a property accessor is built once
//! - paths, keyed by the ordered property identities of a chain, so two
//!   callers asking for "the same path" share one [`NotifyingPath`] body
//!
//! Entries are populated on demand and never evicted. Both tables are
//! `DashMap`s; insertion goes through `entry().or_insert_with`, which holds
//! the shard lock while deciding, so concurrent callers may each build a
//! candidate but all of them observe the first one stored.
//!
//! A process-wide instance is available through [`Interner::global`]. Tests
//! and embedders that want isolation can create their own.

use std::any::TypeId;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::debug;

use super::getter::{Getter, Link, Property, PropertyId};
use super::identity::PathValue;
use super::notifying_path::{Chain, LinkList, NotifyingPath, PathKey, RawPath};
use crate::error::{Error, Result};
use crate::notify::NotifyPropertyChanged;

static GLOBAL: OnceLock<Interner> = OnceLock::new();

/// Interning tables for getters and paths.
#[derive(Default)]
pub struct Interner {
    getters: DashMap<PropertyId, Arc<dyn Link>>,
    paths: DashMap<PathKey, Arc<RawPath>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide interner.
    pub fn global() -> &'static Interner {
        GLOBAL.get_or_init(Interner::new)
    }

    /// Get the canonical getter for `property`.
    pub fn getter<S, P>(&self, property: Property<S, P>) -> Result<Arc<Getter<S, P>>>
    where
        S: NotifyPropertyChanged,
        P: PathValue,
    {
        let link = self.intern(Arc::new(Getter::from_property(property)))?;
        let requested = std::any::type_name::<P>();
        link.clone()
            .as_any()
            .downcast::<Getter<S, P>>()
            .map_err(|_| Error::PropertyTypeConflict {
                property: *link.property(),
                existing: link.value_type_name(),
                requested,
            })
    }

    /// Get the canonical path for a typed chain.
    pub fn path<S, P>(&self, chain: Chain<S, P>) -> Result<NotifyingPath<S, P>>
    where
        S: NotifyPropertyChanged,
        P: PathValue,
    {
        self.path_from_links(chain.into_links().into_iter().collect())
    }

    /// Get the canonical path for an already resolved list of links.
    ///
    /// The list is validated before anything is interned: it must not be
    /// empty, the first link must read from `Arc<S>`, every link must read
    /// from what the previous one produces and the last must produce `P`.
    pub fn path_from_links<S, P>(&self, links: Vec<Arc<dyn Link>>) -> Result<NotifyingPath<S, P>>
    where
        S: NotifyPropertyChanged,
        P: PathValue,
    {
        validate::<S, P>(&links)?;

        let mut interned = LinkList::new();
        for link in links {
            interned.push(self.intern(link)?);
        }
        let key: PathKey = interned.iter().map(|link| *link.property()).collect();

        let raw = self
            .paths
            .entry(key)
            .or_insert_with(|| {
                debug!(path = ?interned, "interning property path");
                Arc::new(RawPath::new(interned))
            })
            .clone();
        Ok(NotifyingPath::from_raw(raw))
    }

    /// Number of interned getters.
    pub fn getter_count(&self) -> usize {
        self.getters.len()
    }

    /// Number of interned paths.
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    fn intern(&self, link: Arc<dyn Link>) -> Result<Arc<dyn Link>> {
        let existing = self
            .getters
            .entry(*link.property())
            .or_insert_with(|| Arc::clone(&link))
            .clone();
        if existing.value_type() != link.value_type() {
            return Err(Error::PropertyTypeConflict {
                property: *link.property(),
                existing: existing.value_type_name(),
                requested: link.value_type_name(),
            });
        }
        Ok(existing)
    }
}

impl std::fmt::Debug for Interner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interner")
            .field("getters", &self.getters.len())
            .field("paths", &self.paths.len())
            .finish()
    }
}

fn validate<S: 'static, P: 'static>(links: &[Arc<dyn Link>]) -> Result<()> {
    let first = links.first().ok_or(Error::EmptyPath)?;

    if first.source_type() != TypeId::of::<Arc<S>>() {
        return Err(Error::mismatch(
            0,
            first.source_type_name(),
            std::any::type_name::<Arc<S>>(),
        ));
    }

    for (index, pair) in links.windows(2).enumerate() {
        let (previous, next) = (&pair[0], &pair[1]);
        if next.source_type() != previous.value_type() {
            return Err(Error::mismatch(
                index + 1,
                next.source_type_name(),
                previous.value_type_name(),
            ));
        }
    }

    let last = &links[links.len() - 1];
    if last.value_type() != TypeId::of::<P>() {
        return Err(Error::mismatch(
            links.len(),
            std::any::type_name::<P>(),
            last.value_type_name(),
        ));
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
