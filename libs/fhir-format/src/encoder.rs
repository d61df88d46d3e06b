//! Resource graph to wire tree
//!
//! Children are emitted in registry declaration order, whatever order the element map
//! holds them in. Anything the registry cannot place is an error: the encoder never
//! drops content silently.

use crate::containment::{self, ordered_extensions};
use crate::error::{Result, StructureError};
use crate::metadata::{self, ENTRY_TYPE};
use crate::options::ParserOptions;
use crate::tree::{Scalar, WireNode};
use ferrum_context::{
    ChildDefinition, ChildRole, PrimitiveKind, Registry, StructuralDefinition, TypeKind,
    EXTENSION_ELEMENT, MODIFIER_EXTENSION_ELEMENT,
};
use ferrum_models::{
    ContainedResources, Element, Extension, ExtensionContent, LocalId, Primitive,
    PrimitiveValue, Reference, Resource, TypeKey, Value,
};
use std::borrow::Cow;

/// Build the wire tree of a resource whose containment pass has already run.
pub(crate) fn encode_resource(
    registry: &Registry,
    options: &ParserOptions,
    resource: &Resource,
) -> Result<WireNode> {
    EncodeRun { registry, options }.resource(resource, &resource.contained, None)
}

struct EncodeRun<'a> {
    registry: &'a Registry,
    options: &'a ParserOptions,
}

impl EncodeRun<'_> {
    /// `scope` is the contained set `#tok` references are written against; `local_id`
    /// is set when writing a contained copy.
    fn resource(
        &self,
        resource: &Resource,
        scope: &ContainedResources,
        local_id: Option<&LocalId>,
    ) -> Result<WireNode> {
        let definition = self
            .registry
            .lookup_by_name(&resource.resource_type)
            .filter(|d| d.kind() == TypeKind::Resource && !d.is_abstract())
            .ok_or_else(|| StructureError::UnknownResourceType(resource.resource_type.clone()))?;
        self.check_children(definition, &resource.body)?;

        let mut node = WireNode::resource(definition.name());
        let id = match local_id {
            Some(local) => Some(local.token()),
            None => resource.id.as_deref(),
        };

        for child in definition.children() {
            match child.role() {
                ChildRole::ResourceId => {
                    if let Some(id) = id {
                        node.children.push(WireNode::primitive(
                            child.name(),
                            Some(Scalar::Text(id.to_string())),
                        ));
                    }
                }
                ChildRole::Meta => {
                    if let Some(meta) = metadata::meta_element(self.registry, &resource.meta) {
                        node.children.push(self.element(child.name(), &meta, scope)?);
                    }
                }
                ChildRole::Contained => {
                    for entry in &resource.contained {
                        let inner = self.resource(&entry.resource, scope, Some(&entry.local_id))?;
                        node.children
                            .push(WireNode::wrapper(child.name(), inner).repeating(true));
                    }
                }
                ChildRole::Narrative
                    if local_id.is_some() && self.options.suppress_contained_narrative => {}
                ChildRole::Extension { modifier } => {
                    self.extensions(&resource.body.extensions, modifier, scope, &mut node)?;
                }
                ChildRole::Narrative | ChildRole::Declared => {
                    self.declared(definition, child, &resource.body, scope, &mut node)?;
                }
            }
        }
        Ok(node)
    }

    fn element(&self, name: &str, element: &Element, scope: &ContainedResources) -> Result<WireNode> {
        let definition = self
            .registry
            .lookup_by_value_type(&element.type_key)
            .ok_or_else(|| StructureError::UnknownType(element.type_key.clone()))?;

        let element = if definition.name() == ENTRY_TYPE {
            metadata::with_entry_annotations(element).map_or(Cow::Borrowed(element), Cow::Owned)
        } else {
            Cow::Borrowed(element)
        };
        self.check_children(definition, &element)?;

        let mut node = WireNode::complex(name);
        node.id = element.id.clone();
        for child in definition.children() {
            match child.role() {
                ChildRole::Extension { modifier } => {
                    self.extensions(&element.extensions, modifier, scope, &mut node)?;
                }
                ChildRole::Narrative | ChildRole::Declared => {
                    self.declared(definition, child, &element, scope, &mut node)?;
                }
                ChildRole::ResourceId | ChildRole::Meta | ChildRole::Contained => {}
            }
        }
        Ok(node)
    }

    /// Reject element content the definition has no place for.
    fn check_children(&self, definition: &StructuralDefinition, element: &Element) -> Result<()> {
        let unknown = |child: &str| StructureError::UnknownElement {
            owner: definition.name().to_string(),
            child: child.to_string(),
        };

        for (name, values) in element.children() {
            let declared = definition.children().iter().any(|c| {
                matches!(c.role(), ChildRole::Declared | ChildRole::Narrative)
                    && c.element_key() == name
            });
            if !declared && !values.is_empty() {
                return Err(unknown(name).into());
            }
        }
        for ext in &element.extensions {
            let allowed = definition
                .children()
                .iter()
                .any(|c| c.role() == ChildRole::Extension { modifier: ext.modifier });
            if !allowed {
                return Err(unknown(extension_element(ext.modifier)).into());
            }
        }
        Ok(())
    }

    fn declared(
        &self,
        definition: &StructuralDefinition,
        child: &ChildDefinition,
        element: &Element,
        scope: &ContainedResources,
        out: &mut WireNode,
    ) -> Result<()> {
        let values = element.get(child.element_key());
        if values.len() > 1 && !child.is_repeating() {
            return Err(StructureError::TooManyValues {
                owner: definition.name().to_string(),
                child: child.name().to_string(),
                count: values.len(),
            }
            .into());
        }

        for value in values {
            let type_key = value.type_key();
            let wire_name = self
                .wire_name(child, &type_key)
                .filter(|_| self.registry.accepts(child, &type_key))
                .ok_or_else(|| StructureError::TypeMismatch {
                    owner: definition.name().to_string(),
                    child: child.name().to_string(),
                    type_key: type_key.clone(),
                })?;
            let node = self.value(wire_name, value, scope)?;
            out.children.push(node.repeating(child.is_repeating()));
        }
        Ok(())
    }

    /// Choice children are written as `<stem><Type>`; subtypes use the choice they derive from.
    fn wire_name<'d>(&self, child: &'d ChildDefinition, type_key: &TypeKey) -> Option<&'d str> {
        child.wire_name_for(type_key).or_else(|| {
            child
                .choices()
                .find(|(_, t)| self.registry.is_subtype_of(type_key, t))
                .map(|(name, _)| name)
        })
    }

    fn value(&self, name: &str, value: &Value, scope: &ContainedResources) -> Result<WireNode> {
        match value {
            Value::Primitive(p) => self.primitive(name, p, scope),
            Value::Element(e) => self.element(name, e, scope),
            Value::Reference(r) => self.reference(name, r, scope),
            // An inline resource writes references against its own contained set
            Value::Resource(inline) => Ok(WireNode::wrapper(
                name,
                self.resource(inline, &inline.contained, None)?,
            )),
        }
    }

    fn primitive(&self, name: &str, primitive: &Primitive, scope: &ContainedResources) -> Result<WireNode> {
        let kind = self
            .registry
            .primitive_kind(&primitive.type_key)
            .ok_or_else(|| StructureError::UnknownType(primitive.type_key.clone()))?;

        let mut node = WireNode::primitive(name, None);
        node.id = primitive.id.clone();
        match (kind, &primitive.value) {
            (_, None) => {}
            (PrimitiveKind::Xhtml, Some(value)) => node.xhtml = Some(value.to_lexical()),
            (PrimitiveKind::Boolean, Some(value)) => {
                node.value = Some(match value {
                    PrimitiveValue::Boolean(b) => Scalar::Boolean(*b),
                    other => Scalar::Text(other.to_lexical()),
                });
            }
            (PrimitiveKind::Integer | PrimitiveKind::Decimal, Some(value)) => {
                node.value = Some(match value {
                    PrimitiveValue::Integer(_) | PrimitiveValue::Decimal(_) => {
                        Scalar::Number(value.to_lexical())
                    }
                    other => Scalar::Text(other.to_lexical()),
                });
            }
            (PrimitiveKind::String, Some(value)) => {
                node.value = Some(Scalar::Text(value.to_lexical()));
            }
        }

        for ext in ordered_extensions(&primitive.extensions) {
            node.children.push(self.extension(ext, scope)?);
        }
        Ok(node)
    }

    fn reference(&self, name: &str, reference: &Reference, scope: &ContainedResources) -> Result<WireNode> {
        let target = containment::reference_string(reference, scope)?;
        let target = match target {
            Some(s) if self.options.strip_versions_from_references => {
                match s.find("/_history/") {
                    Some(at) => Some(s[..at].to_string()),
                    None => Some(s),
                }
            }
            other => other,
        };

        match target {
            Some(s) if reference.reference() != Some(s.as_str()) => {
                let mut rewritten = reference.clone();
                containment::set_reference_string(&mut rewritten, s);
                self.element(name, &rewritten.element, scope)
            }
            _ => self.element(name, &reference.element, scope),
        }
    }

    fn extensions(
        &self,
        extensions: &[Extension],
        modifier: bool,
        scope: &ContainedResources,
        out: &mut WireNode,
    ) -> Result<()> {
        for ext in extensions.iter().filter(|e| e.modifier == modifier) {
            out.children.push(self.extension(ext, scope)?.repeating(true));
        }
        Ok(())
    }

    fn extension(&self, ext: &Extension, scope: &ContainedResources) -> Result<WireNode> {
        let mut node = WireNode::complex(extension_element(ext.modifier)).repeating(true);
        node.id = ext.id.clone();
        node.url = Some(ext.url.clone());

        match &ext.content {
            ExtensionContent::Empty => {}
            ExtensionContent::Nested(children) => {
                for child in ordered_extensions(children) {
                    node.children.push(self.extension(child, scope)?);
                }
            }
            ExtensionContent::Value(value) => {
                let type_key = value.type_key();
                let attribute = match value {
                    Value::Resource(_) => None,
                    _ => self
                        .registry
                        .extension_slot()
                        .child_name_by_datatype(&type_key),
                }
                .ok_or_else(|| StructureError::UnsupportedExtensionValue {
                    url: ext.url.clone(),
                    type_key: type_key.clone(),
                })?;
                node.children.push(self.value(attribute, value, scope)?);
            }
        }
        Ok(node)
    }
}

fn extension_element(modifier: bool) -> &'static str {
    if modifier {
        MODIFIER_EXTENSION_ELEMENT
    } else {
        EXTENSION_ELEMENT
    }
}
