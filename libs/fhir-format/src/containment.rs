//! Containment of in-memory reference targets
//!
//! Before a resource is encoded, every [`Reference`] linked to a resource object is
//! resolved: targets with a logical id are referenced as `Type/id`, all others are
//! added to the top-level resource's contained set under a local id and the reference
//! string becomes `#tok`. References reached from contained targets are flattened into
//! the same set. Inline resources (Bundle entries) are contained separately.
//!
//! After decoding, `#tok` references are linked back to the contained entry they name.

use crate::error::ContainmentError;
use ferrum_context::{ChildRole, Registry};
use ferrum_models::{
    ContainedResources, Element, Extension, ExtensionContent, LocalId, PrimitiveValue,
    Reference, Resource, ResourceLink, Value,
};
use std::collections::HashSet;
use std::sync::Arc;

type Result<T> = std::result::Result<T, ContainmentError>;

/// Contain the link targets of `resource` and rewrite its reference strings.
///
/// Entries already in the contained set keep their ids, so running this twice does not
/// duplicate anything; after [`ContainedResources::clear`] it allocates the same ids again.
/// On error `resource` is left exactly as it was.
pub fn contain_resources(registry: &Registry, resource: &mut Resource) -> Result<()> {
    let mut reserved = HashSet::new();
    let mut seen = HashSet::new();
    for entry in &resource.contained {
        reserve_target(registry, &entry.resource, &mut reserved, &mut seen);
    }
    reserve_element(registry, &resource.body, &mut reserved, &mut seen);

    let mut run = ContainmentRun {
        registry,
        contained: resource.contained.clone(),
        reserved,
        walking: Vec::new(),
    };
    let mut body = resource.body.clone();
    run.run(&mut body)?;

    resource.body = body;
    resource.contained = run.contained;
    Ok(())
}

struct ContainmentRun<'r> {
    registry: &'r Registry,
    contained: ContainedResources,
    /// Tokens requested through `#tok` ids anywhere in the graph
    reserved: HashSet<String>,
    /// Targets whose references are being followed
    walking: Vec<*const Resource>,
}

impl ContainmentRun<'_> {
    fn run(&mut self, body: &mut Element) -> Result<()> {
        let existing: Vec<Arc<Resource>> =
            self.contained.iter().map(|e| e.resource.clone()).collect();
        for target in &existing {
            self.follow(target)?;
        }
        self.rewrite_element(body)
    }

    /// Lowest positive integer that is neither contained nor requested by a target.
    fn allocate(&self) -> LocalId {
        let mut n: u64 = 1;
        loop {
            let tok = n.to_string();
            if !self.contained.contains_id(&tok) && !self.reserved.contains(&tok) {
                return LocalId::new(tok);
            }
            n += 1;
        }
    }

    /// Reference string for a linked target, containing it if needed.
    fn link(&mut self, target: &Arc<Resource>) -> Result<String> {
        if self.walking.contains(&Arc::as_ptr(target)) {
            return Err(ContainmentError::Cycle {
                resource_type: target.resource_type.clone(),
            });
        }
        if let Some(local) = self.contained.find_by_identity(target) {
            return Ok(local.to_reference());
        }
        if let Some(id) = target.id.as_deref().filter(|id| !id.starts_with('#')) {
            return Ok(format!("{}/{}", target.resource_type, id));
        }
        if !target.contained.is_empty() {
            return Err(ContainmentError::NestedContainment {
                resource_type: target.resource_type.clone(),
            });
        }

        let local = target
            .requested_local_id()
            .unwrap_or_else(|| self.allocate());
        self.contained
            .push(local.clone(), target.clone())
            .map_err(|_| ContainmentError::LocalIdCollision {
                token: local.token().to_string(),
            })?;
        tracing::debug!(
            local_id = %local,
            resource_type = %target.resource_type,
            "contained resource"
        );

        self.follow(target)?;
        Ok(local.to_reference())
    }

    /// Contain whatever a contained target links to.
    fn follow(&mut self, target: &Arc<Resource>) -> Result<()> {
        self.walking.push(Arc::as_ptr(target));
        let result = self.follow_element(&target.body);
        self.walking.pop();
        result
    }

    fn follow_element(&mut self, element: &Element) -> Result<()> {
        for ext in ordered_extensions(&element.extensions) {
            self.follow_extension(ext)?;
        }
        let registry = self.registry;
        for key in declared_keys(registry, element) {
            for value in element.get(&key) {
                self.follow_value(value)?;
            }
        }
        Ok(())
    }

    fn follow_extension(&mut self, ext: &Extension) -> Result<()> {
        match &ext.content {
            ExtensionContent::Value(value) => self.follow_value(value),
            ExtensionContent::Nested(children) => {
                children.iter().try_for_each(|c| self.follow_extension(c))
            }
            ExtensionContent::Empty => Ok(()),
        }
    }

    fn follow_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Primitive(p) => p.extensions.iter().try_for_each(|e| self.follow_extension(e)),
            Value::Element(e) => self.follow_element(e),
            Value::Reference(r) => {
                self.follow_element(&r.element)?;
                if let Some(target) = r.linked_resource() {
                    self.link(target)?;
                }
                Ok(())
            }
            // Its own containment scope
            Value::Resource(_) => Ok(()),
        }
    }

    fn rewrite_element(&mut self, element: &mut Element) -> Result<()> {
        for ext in element.extensions.iter_mut().filter(|e| !e.modifier) {
            self.rewrite_extension(ext)?;
        }
        for ext in element.extensions.iter_mut().filter(|e| e.modifier) {
            self.rewrite_extension(ext)?;
        }
        let registry = self.registry;
        for key in declared_keys(registry, element) {
            if let Some(values) = element.get_mut(&key) {
                for value in values {
                    self.rewrite_value(value)?;
                }
            }
        }
        Ok(())
    }

    fn rewrite_extension(&mut self, ext: &mut Extension) -> Result<()> {
        match &mut ext.content {
            ExtensionContent::Value(value) => self.rewrite_value(value),
            ExtensionContent::Nested(children) => children
                .iter_mut()
                .try_for_each(|c| self.rewrite_extension(c)),
            ExtensionContent::Empty => Ok(()),
        }
    }

    fn rewrite_value(&mut self, value: &mut Value) -> Result<()> {
        match value {
            Value::Primitive(p) => p
                .extensions
                .iter_mut()
                .try_for_each(|e| self.rewrite_extension(e)),
            Value::Element(e) => self.rewrite_element(e),
            Value::Reference(r) => {
                self.rewrite_element(&mut r.element)?;
                if let Some(target) = r.linked_resource().cloned() {
                    let reference = self.link(&target)?;
                    set_reference_string(r, reference);
                }
                Ok(())
            }
            Value::Resource(inline) => contain_resources(self.registry, inline),
        }
    }
}

/// Collect the `#tok` ids requested by every target reachable from `element`.
fn reserve_element(
    registry: &Registry,
    element: &Element,
    reserved: &mut HashSet<String>,
    seen: &mut HashSet<*const Resource>,
) {
    for ext in &element.extensions {
        reserve_extension(registry, ext, reserved, seen);
    }
    for key in declared_keys(registry, element) {
        for value in element.get(&key) {
            reserve_value(registry, value, reserved, seen);
        }
    }
}

fn reserve_extension(
    registry: &Registry,
    ext: &Extension,
    reserved: &mut HashSet<String>,
    seen: &mut HashSet<*const Resource>,
) {
    match &ext.content {
        ExtensionContent::Value(value) => reserve_value(registry, value, reserved, seen),
        ExtensionContent::Nested(children) => {
            for child in children {
                reserve_extension(registry, child, reserved, seen);
            }
        }
        ExtensionContent::Empty => {}
    }
}

fn reserve_value(
    registry: &Registry,
    value: &Value,
    reserved: &mut HashSet<String>,
    seen: &mut HashSet<*const Resource>,
) {
    match value {
        Value::Primitive(p) => {
            for ext in &p.extensions {
                reserve_extension(registry, ext, reserved, seen);
            }
        }
        Value::Element(e) => reserve_element(registry, e, reserved, seen),
        Value::Reference(r) => {
            reserve_element(registry, &r.element, reserved, seen);
            if let Some(target) = r.linked_resource() {
                reserve_target(registry, target, reserved, seen);
            }
        }
        Value::Resource(_) => {}
    }
}

fn reserve_target(
    registry: &Registry,
    target: &Arc<Resource>,
    reserved: &mut HashSet<String>,
    seen: &mut HashSet<*const Resource>,
) {
    if !seen.insert(Arc::as_ptr(target)) {
        return;
    }
    if let Some(local) = target.requested_local_id() {
        reserved.insert(local.token().to_string());
    }
    reserve_element(registry, &target.body, reserved, seen);
}

/// Non-modifier extensions first, the order they are written in.
pub(crate) fn ordered_extensions(extensions: &[Extension]) -> impl Iterator<Item = &Extension> {
    extensions
        .iter()
        .filter(|e| !e.modifier)
        .chain(extensions.iter().filter(|e| e.modifier))
}

/// Element keys in registry order; map order for types the registry does not know.
fn declared_keys(registry: &Registry, element: &Element) -> Vec<String> {
    match registry.lookup_by_value_type(&element.type_key) {
        Some(definition) => definition
            .children()
            .iter()
            .filter(|c| matches!(c.role(), ChildRole::Declared | ChildRole::Narrative))
            .map(|c| c.element_key().to_string())
            .collect(),
        None => element.child_names().map(str::to_string).collect(),
    }
}

/// Replace the string form, keeping any id or extensions of the `reference` element.
pub(crate) fn set_reference_string(reference: &mut Reference, value: String) {
    let existing = reference
        .element
        .get_mut("reference")
        .and_then(|values| values.first_mut());
    match existing {
        Some(Value::Primitive(p)) => p.value = Some(PrimitiveValue::String(value)),
        _ => reference.set_reference(value),
    }
}

/// Wire string of a reference against the contained set in scope.
pub(crate) fn reference_string(
    reference: &Reference,
    scope: &ContainedResources,
) -> Result<Option<String>> {
    match &reference.target {
        Some(ResourceLink::Resource(target)) => {
            if let Some(local) = scope.find_by_identity(target) {
                return Ok(Some(local.to_reference()));
            }
            match target.id.as_deref() {
                Some(id) if !id.starts_with('#') => {
                    Ok(Some(format!("{}/{}", target.resource_type, id)))
                }
                _ => Err(ContainmentError::Uncontained {
                    resource_type: target.resource_type.clone(),
                }),
            }
        }
        Some(ResourceLink::Contained(local)) => Ok(Some(local.to_reference())),
        None => Ok(reference.reference().map(str::to_string)),
    }
}

/// Link `#tok` references in `element` to the tokens `has_token` accepts.
///
/// Tokens without a contained entry stay string-only.
pub(crate) fn relink(element: &mut Element, has_token: &impl Fn(&str) -> bool) {
    for ext in &mut element.extensions {
        relink_extension(ext, has_token);
    }
    for (_, values) in element.children_mut() {
        for value in values {
            relink_value(value, has_token);
        }
    }
}

fn relink_extension(ext: &mut Extension, has_token: &impl Fn(&str) -> bool) {
    match &mut ext.content {
        ExtensionContent::Value(value) => relink_value(value, has_token),
        ExtensionContent::Nested(children) => {
            for child in children {
                relink_extension(child, has_token);
            }
        }
        ExtensionContent::Empty => {}
    }
}

fn relink_value(value: &mut Value, has_token: &impl Fn(&str) -> bool) {
    match value {
        Value::Primitive(p) => {
            for ext in &mut p.extensions {
                relink_extension(ext, has_token);
            }
        }
        Value::Element(e) => relink(e, has_token),
        Value::Reference(r) => {
            relink(&mut r.element, has_token);
            if r.target.is_none() {
                let local = r
                    .local_token()
                    .filter(|&tok| has_token(tok))
                    .map(LocalId::new);
                if let Some(local) = local {
                    r.target = Some(ResourceLink::Contained(local));
                }
            }
        }
        // Relinked against its own contained set when decoded
        Value::Resource(_) => {}
    }
}
