//! Property accessors.
//!
//! A [`Property`] describes one hop of a chain: its owner type, its name and
//! a plain function reading the value. A [`Getter`] is the interned form of
//! a property (see [`Interner`](super::Interner)); it also implements the
//! type-erased [`Link`] trait so that a path can hold hops of different
//! types side by side.
//!
//! # Erased values
//!
//! Inside a path every value travels as an [`AnyValue`], an
//! `Arc<dyn Any + Send + Sync>` wrapping a value of the link's value type.
//! A link whose owner type is `S` expects its source wrapped as `Arc<S>`,
//! which is exactly what the previous link produces when its value type is
//! `Arc<S>`.

use std::any::{self, Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::trace;

use super::identity::PathValue;
use super::interner::Interner;
use crate::error::Result;
use crate::notify::{NotifyPropertyChanged, PropertyChangedArgs, Subscription};

/// A type-erased value flowing along a path.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Identity of a property: owning type plus property name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyId {
    owner: TypeId,
    owner_name: &'static str,
    name: &'static str,
}

impl PropertyId {
    pub fn of<S: 'static>(name: &'static str) -> Self {
        Self {
            owner: TypeId::of::<S>(),
            owner_name: any::type_name::<S>(),
            name,
        }
    }

    pub fn owner(&self) -> TypeId {
        self.owner
    }

    pub fn owner_name(&self) -> &'static str {
        self.owner_name
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner_name, self.name)
    }
}

/// Describes a readable property `name` of type `P` on owner `S`.
///
/// `read` returns `None` when the property currently holds no value.
///
/// ```rust,ignore
/// let next = Property::new("next", Level::next);
/// let value = Property::new("value", |level: &Level| Some(level.value()));
/// ```
pub struct Property<S, P> {
    name: &'static str,
    read: fn(&S) -> Option<P>,
}

impl<S, P> Property<S, P> {
    pub const fn new(name: &'static str, read: fn(&S) -> Option<P>) -> Self {
        Self { name, read }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<S: 'static, P> Property<S, P> {
    pub fn id(&self) -> PropertyId {
        PropertyId::of::<S>(self.name)
    }
}

impl<S, P> Clone for Property<S, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, P> Copy for Property<S, P> {}

impl<S, P> fmt::Debug for Property<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("owner", &any::type_name::<S>())
            .field("name", &self.name)
            .finish()
    }
}

/// One hop of a path, with its types erased.
///
/// Implemented by [`Getter`]. Code that resolves chains elsewhere can hand
/// a `Vec<Arc<dyn Link>>` to
/// [`Interner::path_from_links`](super::Interner::path_from_links), which
/// checks that consecutive links fit together.
pub trait Link: Send + Sync + 'static {
    fn property(&self) -> &PropertyId;

    /// `TypeId` of the wrapped source, `Arc<S>`.
    fn source_type(&self) -> TypeId;

    fn source_type_name(&self) -> &'static str;

    /// `TypeId` of the produced value, `P`.
    fn value_type(&self) -> TypeId;

    fn value_type_name(&self) -> &'static str;

    /// Read the property from an erased `Arc<S>`.
    fn read(&self, source: &AnyValue) -> Option<AnyValue>;

    /// Watch `source` for notifications that concern this property.
    ///
    /// Returns `None` when `source` is not an `Arc<S>`.
    fn subscribe(
        &self,
        source: &AnyValue,
        on_change: Box<dyn Fn() + Send + Sync>,
    ) -> Option<Subscription>;

    /// Identity comparison of two erased values of type `P`.
    fn same(&self, a: &AnyValue, b: &AnyValue) -> bool;

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl fmt::Debug for dyn Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("property", &format_args!("{}", self.property()))
            .field("value_type", &self.value_type_name())
            .finish()
    }
}

/// An interned property accessor.
pub struct Getter<S, P> {
    id: PropertyId,
    read: fn(&S) -> Option<P>,
    _marker: PhantomData<fn(&S) -> P>,
}

impl<S: 'static, P> Getter<S, P> {
    pub(crate) fn from_property(property: Property<S, P>) -> Self {
        Self {
            id: property.id(),
            read: property.read,
            _marker: PhantomData,
        }
    }

    pub fn property(&self) -> &PropertyId {
        &self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.name
    }

    /// Read the property. A `None` instance yields `None`.
    pub fn get(&self, instance: Option<&S>) -> Option<P> {
        instance.and_then(self.read)
    }
}

impl<S, P> Getter<S, P>
where
    S: NotifyPropertyChanged,
    P: PathValue,
{
    /// Get the canonical getter for `property` from the global interner.
    pub fn get_or_create(property: Property<S, P>) -> Result<Arc<Self>> {
        Interner::global().getter(property)
    }
}

impl<S, P> Link for Getter<S, P>
where
    S: NotifyPropertyChanged,
    P: PathValue,
{
    fn property(&self) -> &PropertyId {
        &self.id
    }

    fn source_type(&self) -> TypeId {
        TypeId::of::<Arc<S>>()
    }

    fn source_type_name(&self) -> &'static str {
        any::type_name::<Arc<S>>()
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<P>()
    }

    fn value_type_name(&self) -> &'static str {
        any::type_name::<P>()
    }

    fn read(&self, source: &AnyValue) -> Option<AnyValue> {
        let source = source.downcast_ref::<Arc<S>>()?;
        (self.read)(source).map(|value| Arc::new(value) as AnyValue)
    }

    fn subscribe(
        &self,
        source: &AnyValue,
        on_change: Box<dyn Fn() + Send + Sync>,
    ) -> Option<Subscription> {
        let source = source.downcast_ref::<Arc<S>>()?;
        let name = self.id.name;
        Some(
            source
                .property_changed()
                .subscribe(move |args: &PropertyChangedArgs| {
                    if args.affects(name) {
                        on_change();
                    } else {
                        trace!(
                            property = name,
                            changed = ?args.property(),
                            "ignoring unrelated notification"
                        );
                    }
                }),
        )
    }

    fn same(&self, a: &AnyValue, b: &AnyValue) -> bool {
        match (a.downcast_ref::<P>(), b.downcast_ref::<P>()) {
            (Some(a), Some(b)) => a.same(b),
            _ => false,
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<S, P> fmt::Debug for Getter<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Getter")
            .field("property", &format_args!("{}", self.id))
            .field("value_type", &any::type_name::<P>())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
