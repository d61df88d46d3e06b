//! Extension slot synthesis
//!
//! The children of an `extension` element are not declared anywhere: there is one
//! `value<Type>` attribute per datatype in the catalog. This module derives that map
//! once per registry build, plus its inverse for picking the attribute on encode.

use crate::catalog::{ElementTypeDescriptor, Max, PrimitiveKind, TypeCatalog, TypeKind};
use crate::error::{ConfigurationError, Result};
use crate::version::VersionCapabilities;
use ferrum_models::{Extension, ExtensionChild, ExtensionItem, TypeKey};
use std::collections::HashMap;

pub const EXTENSION_ELEMENT: &str = "extension";
pub const MODIFIER_EXTENSION_ELEMENT: &str = "modifierExtension";
/// Reference-valued attribute of the earliest version.
pub const VALUE_RESOURCE: &str = "valueResource";
pub const VALUE_REFERENCE: &str = "valueReference";

/// One synthesized attribute and the datatype it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChild {
    pub name: String,
    pub type_key: TypeKey,
}

/// The open-content definition shared by every `extension` element of a registry.
#[derive(Debug, Clone)]
pub struct ExtensionSlotDefinition {
    children: Vec<SlotChild>,
    by_name: HashMap<String, usize>,
    by_lowercase: HashMap<String, usize>,
    by_datatype: HashMap<TypeKey, usize>,
    /// Specialization → the type it narrows
    narrows: HashMap<TypeKey, TypeKey>,
    reference_type: TypeKey,
    reference_attribute: &'static str,
}

/// `"string"` → `"String"`
pub(crate) fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

/// Datatypes that get a `value<Type>` attribute of their own.
fn has_own_slot(d: &ElementTypeDescriptor) -> bool {
    if d.is_specialization() || d.is_abstract() {
        return false;
    }
    match d.kind() {
        TypeKind::Primitive(PrimitiveKind::Xhtml) => false,
        TypeKind::Primitive(_) => true,
        TypeKind::Complex => d.name() != "Narrative",
        // References use the two fixed attributes
        TypeKind::Reference
        | TypeKind::Extension
        | TypeKind::Backbone
        | TypeKind::Resource => false,
    }
}

impl ExtensionSlotDefinition {
    pub fn build(catalog: &TypeCatalog, capabilities: &impl VersionCapabilities) -> Result<Self> {
        let reference_name = capabilities.resource_reference_type();
        let reference_type = catalog
            .iter()
            .find(|d| d.kind() == TypeKind::Reference && d.name() == reference_name)
            .map(|d| d.key().clone())
            .ok_or_else(|| ConfigurationError::MissingReferenceType(reference_name.to_string()))?;

        let reference_attribute = if capabilities.is_earliest_version() {
            VALUE_RESOURCE
        } else {
            VALUE_REFERENCE
        };

        let mut slot = Self {
            children: Vec::new(),
            by_name: HashMap::new(),
            by_lowercase: HashMap::new(),
            by_datatype: HashMap::new(),
            narrows: HashMap::new(),
            reference_type: reference_type.clone(),
            reference_attribute,
        };

        for d in catalog.iter() {
            if let Some(of) = d.specialization_of() {
                slot.narrows.insert(d.key().clone(), of.clone());
                continue;
            }
            if has_own_slot(d) {
                let name = format!("value{}", capitalize_first(d.name()));
                slot.register(name, d.key().clone(), true)?;
            }
        }

        for attribute in [VALUE_RESOURCE, VALUE_REFERENCE] {
            let canonical = attribute == reference_attribute;
            slot.register(attribute.to_string(), reference_type.clone(), canonical)?;
        }

        tracing::debug!(
            attributes = slot.children.len(),
            reference_attribute,
            "synthesized extension slot"
        );
        Ok(slot)
    }

    fn register(&mut self, name: String, type_key: TypeKey, inverse: bool) -> Result<()> {
        let lower = name.to_lowercase();
        let existing = self
            .by_name
            .get(&name)
            .or_else(|| self.by_lowercase.get(&lower));
        if let Some(&i) = existing {
            return Err(ConfigurationError::DuplicateAttributeName {
                attribute: name,
                first: self.children[i].type_key.clone(),
                second: type_key,
            });
        }

        let index = self.children.len();
        if inverse {
            self.by_datatype.insert(type_key.clone(), index);
        }
        self.by_name.insert(name.clone(), index);
        self.by_lowercase.insert(lower, index);
        self.children.push(SlotChild { name, type_key });
        Ok(())
    }

    /// Wire name of the slot element.
    pub fn element_name(&self) -> &'static str {
        EXTENSION_ELEMENT
    }

    pub fn min(&self) -> u32 {
        0
    }

    /// At the child-name level there is one slot; its content repeats.
    pub fn max(&self) -> Max {
        Max::Bounded(1)
    }

    /// Attribute lookup, exact first, then case-insensitive.
    pub fn child_by_name(&self, attribute: &str) -> Option<&SlotChild> {
        self.by_name
            .get(attribute)
            .or_else(|| self.by_lowercase.get(&attribute.to_lowercase()))
            .map(|&i| &self.children[i])
    }

    /// Attribute to use when encoding a value of this datatype.
    ///
    /// Specializations use the attribute of the type they narrow.
    pub fn child_name_by_datatype(&self, type_key: &TypeKey) -> Option<&str> {
        self.definition_by_datatype(type_key).map(|c| c.name.as_str())
    }

    pub fn definition_by_datatype(&self, type_key: &TypeKey) -> Option<&SlotChild> {
        let mut key = type_key;
        // Bounded by the number of specializations
        for _ in 0..=self.narrows.len() {
            if let Some(&i) = self.by_datatype.get(key) {
                return Some(&self.children[i]);
            }
            key = self.narrows.get(key)?;
        }
        None
    }

    /// Every exact attribute name, in synthesis order.
    pub fn valid_child_names(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|c| c.name.as_str())
    }

    pub fn reference_type(&self) -> &TypeKey {
        &self.reference_type
    }

    /// The reference attribute written on encode for this version.
    pub fn reference_attribute(&self) -> &'static str {
        self.reference_attribute
    }

    pub fn is_reference_attribute(&self, attribute: &str) -> bool {
        attribute.eq_ignore_ascii_case(VALUE_RESOURCE) || attribute.eq_ignore_ascii_case(VALUE_REFERENCE)
    }

    /// The single value of `owner` if set, otherwise its nested extensions.
    pub fn values<'a>(&self, owner: &'a Extension) -> Vec<ExtensionItem<'a>> {
        owner.values()
    }

    /// Plain values replace the current value, nested extensions are appended.
    pub fn add_value(&self, owner: &mut Extension, child: impl Into<ExtensionChild>) {
        owner.add(child);
    }
}
