//! Property paths.
//!
//! A [`NotifyingPath<S, P>`] is an interned, immutable chain of links
//! leading from a root of type `S` to a terminal value of type `P`, for
//! example `Fake.next -> Level.next -> Level.value`.
//!
//! Typed paths are assembled with [`Chain`]:
//!
//! ```rust,ignore
//! let path = NotifyingPath::get_or_create(
//!     Chain::new(Fake::next_property())
//!         .then(Level::next_property())
//!         .then(Level::value_property()),
//! )?;
//! ```
//!
//! `then` only exists while the chain so far yields `Arc<T>` for a notifying
//! `T`, so a hop that does not fit the previous one does not compile.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Index;
use std::sync::Arc;

use smallvec::SmallVec;

use super::getter::{AnyValue, Getter, Link, Property, PropertyId};
use super::identity::PathValue;
use super::interner::Interner;
use crate::error::Result;
use crate::notify::NotifyPropertyChanged;
use crate::tracker::{downcast, PropertyPathTracker};

pub(crate) type LinkList = SmallVec<[Arc<dyn Link>; 4]>;

/// Structural identity of a chain: the ordered property identities.
pub(crate) type PathKey = SmallVec<[PropertyId; 4]>;

/// The shared, untyped body of an interned path.
pub(crate) struct RawPath {
    links: LinkList,
}

impl RawPath {
    pub(crate) fn new(links: LinkList) -> Self {
        Self { links }
    }

    pub(crate) fn links(&self) -> &[Arc<dyn Link>] {
        &self.links
    }

    pub(crate) fn len(&self) -> usize {
        self.links.len()
    }

    /// Walk the chain from `root` until a link yields `None` or the end is
    /// reached. Returns the index of the last evaluated link, its source and
    /// its value.
    pub(crate) fn walk(&self, root: AnyValue) -> (usize, AnyValue, Option<AnyValue>) {
        let mut source = root;
        let last = self.links.len() - 1;
        for (index, link) in self.links.iter().enumerate() {
            match link.read(&source) {
                Some(value) if index < last => source = value,
                value => return (index, source, value),
            }
        }
        (last, source, None)
    }
}

impl fmt::Debug for RawPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.links.iter().map(|link| link.property().to_string()))
            .finish()
    }
}

/// Builder for a typed chain from `S` to `P`.
pub struct Chain<S, P> {
    links: LinkList,
    _marker: PhantomData<fn(&S) -> P>,
}

impl<S, P> Chain<S, P>
where
    S: NotifyPropertyChanged,
    P: PathValue,
{
    /// Start a chain with its first hop.
    pub fn new(property: Property<S, P>) -> Self {
        let mut links = LinkList::new();
        links.push(Arc::new(Getter::from_property(property)) as Arc<dyn Link>);
        Self {
            links,
            _marker: PhantomData,
        }
    }
}

impl<S, T> Chain<S, Arc<T>>
where
    S: NotifyPropertyChanged,
    T: NotifyPropertyChanged,
{
    /// Append a hop reading from the value the chain currently yields.
    pub fn then<Q: PathValue>(mut self, property: Property<T, Q>) -> Chain<S, Q> {
        self.links
            .push(Arc::new(Getter::from_property(property)) as Arc<dyn Link>);
        Chain {
            links: self.links,
            _marker: PhantomData,
        }
    }
}

impl<S, P> Chain<S, P> {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub(crate) fn into_links(self) -> LinkList {
        self.links
    }
}

impl<S, P> fmt::Debug for Chain<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.links.iter().map(|link| link.property().to_string()))
            .finish()
    }
}

/// An interned chain of links from `S` to `P`.
///
/// Cloning is cheap; all clones, and every path obtained from the same
/// [`Interner`] for a structurally equal chain, share one body.
pub struct NotifyingPath<S, P> {
    raw: Arc<RawPath>,
    _marker: PhantomData<fn(&S) -> P>,
}

impl<S, P> NotifyingPath<S, P>
where
    S: NotifyPropertyChanged,
    P: PathValue,
{
    /// Get the canonical path for `chain` from the global interner.
    pub fn get_or_create(chain: Chain<S, P>) -> Result<Self> {
        Interner::global().path(chain)
    }

    /// Start tracking this path from `root`.
    pub fn create_tracker(&self, root: Arc<S>) -> PropertyPathTracker<S, P> {
        PropertyPathTracker::new(root, self)
    }

    /// Evaluate the path once, without subscribing to anything.
    pub fn source_and_value(&self, root: &Arc<S>) -> SourceAndValue<P> {
        let (depth, source, value) = self.raw.walk(Arc::new(Arc::clone(root)));
        SourceAndValue::new(depth, source, downcast(value))
    }
}

impl<S, P> NotifyingPath<S, P> {
    pub(crate) fn from_raw(raw: Arc<RawPath>) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub(crate) fn raw(&self) -> &Arc<RawPath> {
        &self.raw
    }

    /// Number of links. Always at least one.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, index: usize) -> Option<&dyn Link> {
        self.raw.links.get(index).map(|link| &**link)
    }

    pub fn last(&self) -> &dyn Link {
        &*self.raw.links[self.raw.len() - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Link> + '_ {
        self.raw.links.iter().map(|link| &**link)
    }

    /// Whether `self` and `other` are the same interned instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.raw, &other.raw)
    }
}

impl<S, P> Index<usize> for NotifyingPath<S, P> {
    type Output = dyn Link;

    fn index(&self, index: usize) -> &Self::Output {
        &*self.raw.links[index]
    }
}

impl<S, P> Clone for NotifyingPath<S, P> {
    fn clone(&self) -> Self {
        Self::from_raw(Arc::clone(&self.raw))
    }
}

impl<S, P> fmt::Debug for NotifyingPath<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NotifyingPath").field(&self.raw).finish()
    }
}

/// Result of a one-shot evaluation of a path.
pub struct SourceAndValue<P> {
    depth: usize,
    source: AnyValue,
    value: Option<P>,
}

impl<P> SourceAndValue<P> {
    pub(crate) fn new(depth: usize, source: AnyValue, value: Option<P>) -> Self {
        Self {
            depth,
            source,
            value,
        }
    }

    /// Index of the deepest link that had a live source.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The deepest live source, erased.
    pub fn source(&self) -> &AnyValue {
        &self.source
    }

    /// The deepest live source, if it is an `Arc<T>`.
    pub fn source_as<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.source.downcast_ref::<Arc<T>>().cloned()
    }

    /// The terminal value, `None` if any link on the way was `None`.
    pub fn value(&self) -> Option<&P> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<P> {
        self.value
    }
}

impl<P: fmt::Debug> fmt::Debug for SourceAndValue<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceAndValue")
            .field("depth", &self.depth)
            .field("value", &self.value)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Fake, Level};

    fn deep_path(interner: &Interner) -> NotifyingPath<Fake, i32> {
        interner
            .path(
                Chain::new(Fake::next_property())
                    .then(Level::next_property())
                    .then(Level::value_property()),
            )
            .expect("chain is well typed")
    }

    #[test]
    fn path_exposes_links_in_order() {
        let interner = Interner::new();
        let path = deep_path(&interner);

        assert_eq!(path.len(), 3);
        assert_eq!(path[0].property().name(), "next");
        assert_eq!(path[1].property().name(), "next");
        assert_eq!(path.last().property().name(), "value");
        assert!(path.get(3).is_none());
        assert_eq!(path.iter().count(), 3);
    }

    #[test]
    fn source_and_value_stops_at_first_none() {
        let interner = Interner::new();
        let path = deep_path(&interner);
        let fake = Fake::new(None);

        let result = path.source_and_value(&fake);
        assert_eq!(result.depth(), 0);
        assert!(result.value().is_none());
        let source = result.source_as::<Fake>().expect("root is the source");
        assert!(Arc::ptr_eq(&source, &fake));
    }

    #[test]
    fn source_and_value_reaches_terminal() {
        let interner = Interner::new();
        let path = deep_path(&interner);
        let last = Level::new(9);
        let fake = Fake::new(Some(Level::with_next(Some(last.clone()), 0)));

        let result = path.source_and_value(&fake);
        assert_eq!(result.depth(), 2);
        assert_eq!(result.value(), Some(&9));
        let source = result.source_as::<Level>().expect("deepest source is a level");
        assert!(Arc::ptr_eq(&source, &last));
    }

    #[test]
    fn chain_reports_length() {
        let chain = Chain::new(Fake::next_property()).then(Level::value_property());
        assert_eq!(chain.len(), 2);
        assert!(!chain.is_empty());
    }
}
