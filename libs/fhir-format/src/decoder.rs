//! Wire tree to resource graph
//!
//! Every wire name is resolved against the registry. In lenient mode anything that does
//! not resolve is skipped and recorded as a [`DecodeIssue`]; in strict mode the first
//! such problem aborts the decode.

use crate::containment;
use crate::error::StructureError;
use crate::issue::{DecodeIssue, IssueKind};
use crate::metadata::{self, ENTRY_TYPE, META_TYPE};
use crate::options::ParserOptions;
use crate::tree::{Scalar, Shape, WireNode};
use ferrum_context::{
    ChildRole, PrimitiveKind, Registry, ResolvedChild, StructuralDefinition, TypeKind,
    EXTENSION_ELEMENT, MODIFIER_EXTENSION_ELEMENT,
};
use ferrum_models::{
    Element, Extension, ExtensionContent, LocalId, Primitive, PrimitiveValue, Reference,
    Resource, ResourceMetadata, TypeKey, Value,
};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

type Result<T> = std::result::Result<T, StructureError>;

/// Decode a document root as `target_type` or one of its subtypes.
pub(crate) fn decode_document(
    registry: &Registry,
    options: &ParserOptions,
    root: &WireNode,
    target_type: &str,
) -> Result<(Resource, Vec<DecodeIssue>)> {
    let target = registry
        .lookup_by_name(target_type)
        .filter(|d| d.kind() == TypeKind::Resource)
        .ok_or_else(|| StructureError::UnknownResourceType(target_type.to_string()))?;
    let actual = registry
        .lookup_by_name(&root.name)
        .filter(|d| root.shape == Shape::Resource && d.kind() == TypeKind::Resource)
        .ok_or_else(|| StructureError::UnknownResourceType(root.name.clone()))?;

    if actual.is_abstract() || !registry.is_subtype_of(actual.type_key(), target.type_key()) {
        return Err(StructureError::RootTypeMismatch {
            expected: target.name().to_string(),
            found: actual.name().to_string(),
        });
    }

    let mut run = DecodeRun {
        registry,
        options,
        issues: Vec::new(),
        path: Vec::new(),
    };
    let resource = run.resource(root)?;
    Ok((resource, run.issues))
}

struct DecodeRun<'a> {
    registry: &'a Registry,
    options: &'a ParserOptions,
    issues: Vec<DecodeIssue>,
    /// Wire names from the root to the node being decoded
    path: Vec<String>,
}

impl DecodeRun<'_> {
    fn path(&self) -> String {
        self.path.join(".")
    }

    /// Record a lenient-mode diagnostic, or fail in strict mode.
    fn report(&mut self, kind: IssueKind, message: impl Into<String>) -> Result<()> {
        let issue = DecodeIssue::new(kind, self.path(), message);
        if !self.options.lenient {
            return Err(StructureError::Rejected(issue));
        }
        tracing::warn!(
            kind = %issue.kind,
            path = %issue.path,
            message = %issue.message,
            "skipped content while decoding"
        );
        if self.options.max_issues.map_or(true, |max| self.issues.len() < max) {
            self.issues.push(issue);
        }
        Ok(())
    }

    fn unknown_child(&mut self, owner: &str, child: &str) -> Result<()> {
        if !self.options.lenient {
            return Err(StructureError::UnknownElement {
                owner: owner.to_string(),
                child: child.to_string(),
            });
        }
        self.report(
            IssueKind::UnknownElement,
            format!("{} has no child {}", owner, child),
        )
    }

    fn invalid_primitive(&mut self, lexical: &str, type_key: &TypeKey) -> Result<()> {
        if !self.options.lenient {
            return Err(StructureError::InvalidPrimitive {
                path: self.path(),
                value: lexical.to_string(),
            });
        }
        self.report(
            IssueKind::InvalidPrimitive,
            format!("{:?} is not a valid {}; kept as text", lexical, type_key),
        )
    }

    fn resource(&mut self, node: &WireNode) -> Result<Resource> {
        let registry = self.registry;
        let definition = registry
            .lookup_by_name(&node.name)
            .filter(|d| d.kind() == TypeKind::Resource && !d.is_abstract())
            .ok_or_else(|| StructureError::UnknownResourceType(node.name.clone()))?;

        let mut resource = Resource::new(definition.name());
        resource.body.type_key = definition.type_key().clone();

        self.path.push(definition.name().to_string());
        let result = self.resource_children(definition, node, &mut resource);
        self.path.pop();
        result.map(|()| resource)
    }

    fn resource_children(
        &mut self,
        definition: &StructuralDefinition,
        node: &WireNode,
        resource: &mut Resource,
    ) -> Result<()> {
        let mut contained = Vec::new();
        for child in &node.children {
            let Some(resolved) = definition.resolve_wire_name(&child.name) else {
                self.unknown_child(definition.name(), &child.name)?;
                continue;
            };
            match resolved.child.role() {
                ChildRole::ResourceId => resource.id = child.value.as_ref().map(Scalar::lexical),
                ChildRole::Meta => self.meta(child, &mut resource.meta)?,
                ChildRole::Contained => contained.push(child),
                ChildRole::Extension { modifier } => {
                    if let Some(ext) = self.extension(child, modifier)? {
                        resource.body.extensions.push(ext);
                    }
                }
                ChildRole::Narrative | ChildRole::Declared => {
                    self.declared(resolved, child, &mut resource.body)?;
                }
            }
        }
        self.contained(&contained, resource)
    }

    /// Decode contained entries, then link `#tok` references to them.
    fn contained(&mut self, nodes: &[&WireNode], resource: &mut Resource) -> Result<()> {
        let mut decoded = Vec::new();
        for node in nodes {
            self.path.push(node.name.clone());
            let entry = self.contained_entry(node);
            self.path.pop();
            if let Some(entry) = entry? {
                decoded.push(entry);
            }
        }

        let tokens: HashSet<String> = decoded
            .iter()
            .map(|(local, _): &(LocalId, Resource)| local.token().to_string())
            .collect();
        let has_token = |tok: &str| tokens.contains(tok);

        for (local, mut inner) in decoded {
            containment::relink(&mut inner.body, &has_token);
            if let Err(e) = resource.contained.push(local, Arc::new(inner)) {
                self.report(IssueKind::DuplicateContainedId, e.to_string())?;
            }
        }
        containment::relink(&mut resource.body, &has_token);
        Ok(())
    }

    fn contained_entry(&mut self, node: &WireNode) -> Result<Option<(LocalId, Resource)>> {
        let Some(inner) = node.wrapped_resource() else {
            self.report(IssueKind::TypeMismatch, "contained entry does not hold a resource")?;
            return Ok(None);
        };
        let Some(mut inner) = self.nested_resource(inner)? else {
            return Ok(None);
        };

        let local = inner
            .id
            .as_deref()
            .map(|id| id.trim_start_matches('#'))
            .filter(|tok| !tok.is_empty())
            .map(LocalId::new);
        match local {
            Some(local) => {
                inner.id = Some(local.to_reference());
                Ok(Some((local, inner)))
            }
            None => {
                self.report(
                    IssueKind::ContainedWithoutId,
                    format!("contained {} has no id and was skipped", inner.resource_type),
                )?;
                Ok(None)
            }
        }
    }

    /// A resource below the root; unknown types are skipped in lenient mode.
    fn nested_resource(&mut self, node: &WireNode) -> Result<Option<Resource>> {
        if !self.registry.is_concrete_resource(&node.name) {
            if !self.options.lenient {
                return Err(StructureError::UnknownResourceType(node.name.clone()));
            }
            self.report(
                IssueKind::UnknownElement,
                format!("unknown resource type {}", node.name),
            )?;
            return Ok(None);
        }
        self.resource(node).map(Some)
    }

    fn meta(&mut self, node: &WireNode, meta: &mut ResourceMetadata) -> Result<()> {
        let registry = self.registry;
        let Some(definition) = registry.lookup_by_name(META_TYPE) else {
            return self.unknown_child("Resource", &node.name);
        };
        let element = self.element(node, definition)?;

        self.path.push(node.name.clone());
        for name in metadata::absorb_meta(&element, meta) {
            self.report(
                IssueKind::DroppedMetadata,
                format!("meta.{} has no metadata key", name),
            )?;
        }
        self.path.pop();
        Ok(())
    }

    fn declared(&mut self, resolved: ResolvedChild<'_>, node: &WireNode, parent: &mut Element) -> Result<()> {
        let child = resolved.child;
        let type_key = match (resolved.choice_type, child.types()) {
            (Some(choice), _) => choice.clone(),
            (None, [only]) => only.clone(),
            (None, _) => {
                return self.report(
                    IssueKind::TypeMismatch,
                    format!("{} has no single type", child.name()),
                );
            }
        };

        let key = child.element_key();
        if !child.is_repeating() && parent.contains(key) {
            return self.report(
                IssueKind::TooManyValues,
                format!("{} does not repeat; extra value dropped", child.name()),
            );
        }
        if let Some(value) = self.value(node, &type_key)? {
            parent.push(key, value);
        }
        Ok(())
    }

    fn value(&mut self, node: &WireNode, type_key: &TypeKey) -> Result<Option<Value>> {
        let registry = self.registry;
        match registry.kind_of(type_key) {
            Some(TypeKind::Primitive(kind)) => {
                Ok(Some(Value::Primitive(self.primitive(node, type_key, kind)?)))
            }
            Some(TypeKind::Resource) => match node.wrapped_resource() {
                Some(inner) => Ok(self.nested_resource(inner)?.map(Value::resource)),
                None => {
                    self.report(
                        IssueKind::TypeMismatch,
                        format!("{} does not hold a resource", node.name),
                    )?;
                    Ok(None)
                }
            },
            Some(kind) => {
                let definition = registry
                    .lookup_by_value_type(type_key)
                    .ok_or_else(|| StructureError::UnknownType(type_key.clone()))?;
                let element = self.element(node, definition)?;
                Ok(Some(match kind {
                    TypeKind::Reference => Value::Reference(Reference {
                        element,
                        target: None,
                    }),
                    _ => Value::Element(element),
                }))
            }
            None => Err(StructureError::UnknownType(type_key.clone())),
        }
    }

    fn primitive(&mut self, node: &WireNode, type_key: &TypeKey, kind: PrimitiveKind) -> Result<Primitive> {
        let mut primitive = Primitive::empty(type_key.clone());
        primitive.id = node.id.clone();

        self.path.push(node.name.clone());
        let result = self.primitive_content(node, kind, &mut primitive);
        self.path.pop();
        result.map(|()| primitive)
    }

    fn primitive_content(
        &mut self,
        node: &WireNode,
        kind: PrimitiveKind,
        primitive: &mut Primitive,
    ) -> Result<()> {
        primitive.value = match (kind, &node.value) {
            (PrimitiveKind::Xhtml, value) => node
                .xhtml
                .clone()
                .or_else(|| value.as_ref().map(Scalar::lexical))
                .map(PrimitiveValue::Xhtml),
            (_, Some(scalar)) => Some(self.parse_scalar(scalar, kind, &primitive.type_key)?),
            (_, None) => None,
        };

        for child in &node.children {
            match child.name.as_str() {
                EXTENSION_ELEMENT | MODIFIER_EXTENSION_ELEMENT => {
                    let modifier = child.name == MODIFIER_EXTENSION_ELEMENT;
                    if let Some(ext) = self.extension(child, modifier)? {
                        primitive.extensions.push(ext);
                    }
                }
                other => {
                    let owner = primitive.type_key.to_string();
                    self.unknown_child(&owner, other)?;
                }
            }
        }
        Ok(())
    }

    fn parse_scalar(
        &mut self,
        scalar: &Scalar,
        kind: PrimitiveKind,
        type_key: &TypeKey,
    ) -> Result<PrimitiveValue> {
        let parsed = match (kind, scalar) {
            (PrimitiveKind::Boolean, Scalar::Boolean(b)) => Some(PrimitiveValue::Boolean(*b)),
            (PrimitiveKind::Boolean, Scalar::Text(s)) => match s.as_str() {
                "true" => Some(PrimitiveValue::Boolean(true)),
                "false" => Some(PrimitiveValue::Boolean(false)),
                _ => None,
            },
            (PrimitiveKind::Integer, Scalar::Text(s) | Scalar::Number(s)) => {
                s.parse::<i64>().ok().map(PrimitiveValue::Integer)
            }
            (PrimitiveKind::Decimal, Scalar::Text(s) | Scalar::Number(s)) => Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
                .map(PrimitiveValue::Decimal),
            (PrimitiveKind::String | PrimitiveKind::Xhtml, Scalar::Text(s)) => {
                Some(PrimitiveValue::String(s.clone()))
            }
            _ => None,
        };

        match parsed {
            Some(value) => Ok(value),
            None => {
                let lexical = scalar.lexical();
                self.invalid_primitive(&lexical, type_key)?;
                Ok(PrimitiveValue::String(lexical))
            }
        }
    }

    fn element(&mut self, node: &WireNode, definition: &StructuralDefinition) -> Result<Element> {
        let mut element = Element::new(definition.type_key().clone());
        element.id = node.id.clone();

        self.path.push(node.name.clone());
        let mut result = self.element_children(definition, node, &mut element);
        if result.is_ok() && definition.name() == ENTRY_TYPE {
            for (kind, message) in metadata::absorb_entry_annotations(&mut element) {
                result = self.report(kind, message);
                if result.is_err() {
                    break;
                }
            }
        }
        self.path.pop();
        result.map(|()| element)
    }

    fn element_children(
        &mut self,
        definition: &StructuralDefinition,
        node: &WireNode,
        element: &mut Element,
    ) -> Result<()> {
        if node.value.is_some() {
            self.report(
                IssueKind::TypeMismatch,
                format!("{} expects an element, found a primitive value", definition.name()),
            )?;
        }

        for child in &node.children {
            let Some(resolved) = definition.resolve_wire_name(&child.name) else {
                self.unknown_child(definition.name(), &child.name)?;
                continue;
            };
            match resolved.child.role() {
                ChildRole::Extension { modifier } => {
                    if let Some(ext) = self.extension(child, modifier)? {
                        element.extensions.push(ext);
                    }
                }
                ChildRole::Narrative | ChildRole::Declared => {
                    self.declared(resolved, child, element)?;
                }
                ChildRole::ResourceId | ChildRole::Meta | ChildRole::Contained => {
                    self.unknown_child(definition.name(), &child.name)?;
                }
            }
        }
        Ok(())
    }

    fn extension(&mut self, node: &WireNode, modifier: bool) -> Result<Option<Extension>> {
        self.path.push(node.name.clone());
        let result = self.extension_content(node, modifier);
        self.path.pop();
        result
    }

    fn extension_content(&mut self, node: &WireNode, modifier: bool) -> Result<Option<Extension>> {
        let Some(url) = node.url.clone() else {
            self.report(IssueKind::MissingUrl, "extension without url was skipped")?;
            return Ok(None);
        };

        let registry = self.registry;
        let slot = registry.extension_slot();
        let mut value = None;
        let mut nested = Vec::new();
        for child in &node.children {
            match child.name.as_str() {
                EXTENSION_ELEMENT | MODIFIER_EXTENSION_ELEMENT => {
                    let modifier = child.name == MODIFIER_EXTENSION_ELEMENT;
                    if let Some(ext) = self.extension(child, modifier)? {
                        nested.push(ext);
                    }
                }
                attribute => match slot.child_by_name(attribute) {
                    Some(slot_child) if value.is_none() => {
                        value = self.value(child, &slot_child.type_key)?;
                    }
                    Some(_) => {
                        self.report(
                            IssueKind::TooManyValues,
                            format!("extension {} has more than one value", url),
                        )?;
                    }
                    None if !self.options.lenient => {
                        return Err(StructureError::UnknownElement {
                            owner: slot.element_name().to_string(),
                            child: attribute.to_string(),
                        });
                    }
                    None => {
                        self.report(
                            IssueKind::UnknownExtensionAttribute,
                            format!("{} is not an extension attribute", attribute),
                        )?;
                    }
                },
            }
        }

        let content = match (value, nested.is_empty()) {
            (Some(value), true) => ExtensionContent::Value(value),
            (Some(value), false) => {
                self.report(
                    IssueKind::ExtensionValueAndChildren,
                    format!(
                        "extension {} has a value and nested extensions; nested extensions dropped",
                        url
                    ),
                )?;
                ExtensionContent::Value(value)
            }
            (None, false) => ExtensionContent::Nested(nested),
            (None, true) => ExtensionContent::Empty,
        };

        Ok(Some(Extension {
            id: node.id.clone(),
            url,
            modifier,
            content,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json;
    use ferrum_context::{FhirVersion, TypeCatalog};
    use ferrum_models::ResourceLink;

    fn registry() -> Registry {
        Registry::build(&TypeCatalog::builtin(FhirVersion::R4).unwrap()).unwrap()
    }

    fn decode_with(
        options: &ParserOptions,
        text: &str,
        target: &str,
    ) -> Result<(Resource, Vec<DecodeIssue>)> {
        let root = json::read(text)?;
        decode_document(&registry(), options, &root, target)
    }

    fn decode(text: &str) -> (Resource, Vec<DecodeIssue>) {
        decode_with(&ParserOptions::default(), text, "Resource")
            .unwrap_or_else(|e| panic!("decode failed: {}", e))
    }

    #[test]
    fn subtype_roots_are_accepted() {
        let text = r#"{ "resourceType": "Patient", "active": true }"#;
        for target in ["Patient", "DomainResource", "Resource"] {
            assert!(decode_with(&ParserOptions::default(), text, target).is_ok());
        }
        let err = decode_with(&ParserOptions::default(), text, "Observation").unwrap_err();
        assert!(matches!(
            err,
            StructureError::RootTypeMismatch { ref expected, ref found }
                if expected == "Observation" && found == "Patient"
        ));
    }

    #[test]
    fn unknown_children_are_skipped_or_rejected() {
        let text = r#"{ "resourceType": "Patient", "shoeSize": 9, "gender": "male" }"#;
        let (patient, issues) = decode(text);
        assert_eq!(patient.body.first("gender").and_then(Value::as_str), Some("male"));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::UnknownElement);
        assert_eq!(issues[0].path, "Patient");

        let err = decode_with(&ParserOptions::strict(), text, "Patient").unwrap_err();
        assert!(matches!(
            err,
            StructureError::UnknownElement { ref child, .. } if child == "shoeSize"
        ));
    }

    #[test]
    fn bad_primitive_keeps_its_lexical_form() {
        let text = r#"{ "resourceType": "Patient", "multipleBirthInteger": "twins" }"#;
        let (patient, issues) = decode(text);
        assert_eq!(issues[0].kind, IssueKind::InvalidPrimitive);
        assert_eq!(issues[0].path, "Patient.multipleBirthInteger");
        assert_eq!(
            patient.body.first("multipleBirth").and_then(Value::as_str),
            Some("twins")
        );

        let err = decode_with(&ParserOptions::strict(), text, "Patient").unwrap_err();
        assert!(matches!(err, StructureError::InvalidPrimitive { ref value, .. } if value == "twins"));
    }

    #[test]
    fn contained_without_id_is_skipped() {
        let text = r##"{
            "resourceType": "Patient",
            "contained": [
                { "resourceType": "Organization", "name": "no id" },
                { "resourceType": "Organization", "id": "1", "name": "Acme" }
            ],
            "managingOrganization": { "reference": "#1" },
            "generalPractitioner": [{ "reference": "#2" }]
        }"##;
        let (patient, issues) = decode(text);
        assert_eq!(patient.contained.len(), 1);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::ContainedWithoutId);

        let org = patient.contained.get("1").unwrap();
        assert_eq!(org.id.as_deref(), Some("#1"));

        let managing = patient
            .body
            .first("managingOrganization")
            .and_then(Value::as_reference)
            .unwrap();
        assert_eq!(managing.target, Some(ResourceLink::Contained(LocalId::new("1"))));
        let gp = patient
            .body
            .first("generalPractitioner")
            .and_then(Value::as_reference)
            .unwrap();
        assert!(gp.target.is_none());
    }

    #[test]
    fn extension_with_value_and_children_keeps_value() {
        let text = r#"{
            "resourceType": "Patient",
            "extension": [{
                "url": "u",
                "valueString": "v",
                "extension": [{ "url": "n", "valueBoolean": true }]
            }]
        }"#;
        let (patient, issues) = decode(text);
        let ext = &patient.body.extensions[0];
        assert_eq!(ext.value().and_then(Value::as_str), Some("v"));
        assert_eq!(issues[0].kind, IssueKind::ExtensionValueAndChildren);
    }

    #[test]
    fn empty_extension_is_silent() {
        let text = r#"{ "resourceType": "Patient", "extension": [{ "url": "u" }] }"#;
        let (patient, issues) = decode(text);
        assert!(issues.is_empty());
        assert!(patient.body.extensions[0].is_empty());
    }

    #[test]
    fn issue_count_is_capped() {
        let text = r#"{ "resourceType": "Patient", "a": 1, "b": 2, "c": 3 }"#;
        let options = ParserOptions {
            max_issues: Some(2),
            ..ParserOptions::default()
        };
        let (_, issues) = decode_with(&options, text, "Patient").unwrap();
        assert_eq!(issues.len(), 2);
    }
}
