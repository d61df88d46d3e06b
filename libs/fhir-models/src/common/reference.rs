//! References between resources

use super::element::{Element, Value};
use super::resource::{LocalId, Resource};
use super::type_key::TypeKey;
use std::sync::Arc;

/// Type key used by [`Reference::new`]. Registries for the earliest version name the
/// reference datatype differently; use [`Reference::of_type`] there.
pub const REFERENCE_TYPE: &str = "Reference";

/// In-memory link carried by a [`Reference`]. Never written to the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceLink {
    /// A resource object that has not been turned into a reference string yet
    Resource(Arc<Resource>),
    /// An entry of the enclosing resource's contained set
    Contained(LocalId),
}

/// A reference datatype instance: its wire children plus an optional in-memory link.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub element: Element,
    pub target: Option<ResourceLink>,
}

impl Reference {
    /// A string-only reference (`Patient/123`, `#1`, an absolute URL).
    pub fn new(reference: impl Into<String>) -> Self {
        let mut r = Self::of_type(REFERENCE_TYPE);
        r.set_reference(reference);
        r
    }

    /// An empty reference instantiating the given datatype.
    pub fn of_type(type_key: impl Into<TypeKey>) -> Self {
        Self {
            element: Element::new(type_key),
            target: None,
        }
    }

    /// A reference to an in-memory resource, resolved to a string at encode time.
    pub fn to_resource(resource: Arc<Resource>) -> Self {
        Self {
            element: Element::new(REFERENCE_TYPE),
            target: Some(ResourceLink::Resource(resource)),
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.element.set("display", Value::string(display));
        self
    }

    pub fn reference(&self) -> Option<&str> {
        self.element.first("reference").and_then(Value::as_str)
    }

    pub fn set_reference(&mut self, reference: impl Into<String>) {
        self.element.set("reference", Value::string(reference));
    }

    pub fn clear_reference(&mut self) {
        self.element.take("reference");
    }

    pub fn display(&self) -> Option<&str> {
        self.element.first("display").and_then(Value::as_str)
    }

    /// Token of a local reference string (`#tok` gives `tok`).
    pub fn local_token(&self) -> Option<&str> {
        self.reference().and_then(|r| r.strip_prefix('#'))
    }

    /// The linked resource object, if the link has not been resolved to a contained entry.
    pub fn linked_resource(&self) -> Option<&Arc<Resource>> {
        match &self.target {
            Some(ResourceLink::Resource(r)) => Some(r),
            _ => None,
        }
    }
}
