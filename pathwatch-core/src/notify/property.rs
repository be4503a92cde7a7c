//! Property change notifications.
//!
//! Objects that take part in a tracked chain implement
//! [`NotifyPropertyChanged`] and raise a [`PropertyChangedArgs`] naming the
//! property that changed, or [`PropertyChangedArgs::all`] when every
//! property should be considered changed.

use std::borrow::Cow;

use super::Event;

/// Arguments of a property-changed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChangedArgs {
    property: Option<Cow<'static, str>>,
}

impl PropertyChangedArgs {
    /// A notification for a single named property.
    pub fn new(property: impl Into<Cow<'static, str>>) -> Self {
        Self {
            property: Some(property.into()),
        }
    }

    /// A notification meaning "all properties changed".
    pub fn all() -> Self {
        Self { property: None }
    }

    /// The changed property's name, `None` for "all properties".
    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }

    /// Whether this notification can concern the named property.
    ///
    /// An absent or empty name is the "all properties changed" signal.
    pub fn affects(&self, name: &str) -> bool {
        match self.property.as_deref() {
            None | Some("") => true,
            Some(changed) => changed == name,
        }
    }
}

/// An object that raises property-changed notifications.
pub trait NotifyPropertyChanged: Send + Sync + 'static {
    /// The event raised after one of this object's properties changed.
    fn property_changed(&self) -> &Event<PropertyChangedArgs>;
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_notification_affects_only_its_property() {
        let args = PropertyChangedArgs::new("next");
        assert!(args.affects("next"));
        assert!(!args.affects("value"));
        assert_eq!(args.property(), Some("next"));
    }

    #[test]
    fn all_and_empty_affect_everything() {
        assert!(PropertyChangedArgs::all().affects("value"));
        assert!(PropertyChangedArgs::new("").affects("value"));
    }
}
