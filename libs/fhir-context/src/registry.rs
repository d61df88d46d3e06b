//! Structural definition registry
//!
//! Built in a single pass over a [`TypeCatalog`] and sealed afterwards: a [`Registry`]
//! only exposes `&self` methods, so one `Arc<Registry>` serves any number of
//! concurrent encode and decode calls.

use crate::catalog::{ElementTypeDescriptor, Max, PrimitiveKind, TypeCatalog, TypeKind};
use crate::error::{ConfigurationError, Result};
use crate::extension_slot::{
    capitalize_first, ExtensionSlotDefinition, EXTENSION_ELEMENT, MODIFIER_EXTENSION_ELEMENT,
};
use crate::version::FhirVersion;
use ferrum_models::TypeKey;
use std::collections::{HashMap, HashSet};

/// What a child means to the encoder and decoder, fixed at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRole {
    /// `Resource.id`
    ResourceId,
    /// `Resource.meta`, merged with the metadata side-table
    Meta,
    /// `DomainResource.contained`
    Contained,
    /// `DomainResource.text`
    Narrative,
    /// `extension` or `modifierExtension`
    Extension { modifier: bool },
    Declared,
}

/// One child of a structural definition, inherited children included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDefinition {
    name: String,
    min: u32,
    max: Max,
    types: Vec<TypeKey>,
    role: ChildRole,
    /// Wire names of a `[x]` child, one per accepted type
    choices: Vec<(String, TypeKey)>,
}

impl ChildDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key under which an `Element` stores this child's values: the name without `[x]`.
    pub fn element_key(&self) -> &str {
        self.name.strip_suffix("[x]").unwrap_or(&self.name)
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> Max {
        self.max
    }

    pub fn is_repeating(&self) -> bool {
        self.max.is_repeating()
    }

    pub fn types(&self) -> &[TypeKey] {
        &self.types
    }

    pub fn role(&self) -> ChildRole {
        self.role
    }

    pub fn is_choice(&self) -> bool {
        !self.choices.is_empty()
    }

    /// Wire name for a value of `type_key`: the child name, or `value<Type>` for choices.
    pub fn wire_name_for(&self, type_key: &TypeKey) -> Option<&str> {
        if self.is_choice() {
            self.choices
                .iter()
                .find(|(_, t)| t == type_key)
                .map(|(n, _)| n.as_str())
        } else {
            Some(&self.name)
        }
    }

    pub fn choices(&self) -> impl Iterator<Item = (&str, &TypeKey)> {
        self.choices.iter().map(|(n, t)| (n.as_str(), t))
    }
}

/// A child matched by its wire name.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedChild<'a> {
    pub child: &'a ChildDefinition,
    /// The datatype a choice wire name selects; `None` for ordinary children
    pub choice_type: Option<&'a TypeKey>,
}

/// Ordered children of one resource, complex or backbone type.
#[derive(Debug, Clone)]
pub struct StructuralDefinition {
    name: String,
    type_key: TypeKey,
    kind: TypeKind,
    base: Option<TypeKey>,
    is_abstract: bool,
    children: Vec<ChildDefinition>,
    by_wire_name: HashMap<String, (usize, Option<usize>)>,
}

impl StructuralDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_key(&self) -> &TypeKey {
        &self.type_key
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn base(&self) -> Option<&TypeKey> {
        self.base.as_ref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Children in declaration order, root type's first.
    pub fn children(&self) -> &[ChildDefinition] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&ChildDefinition> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Match a wire name, expanding `[x]` children to `value<Type>` names.
    pub fn resolve_wire_name(&self, wire_name: &str) -> Option<ResolvedChild<'_>> {
        let &(child, choice) = self.by_wire_name.get(wire_name)?;
        let child = &self.children[child];
        Some(ResolvedChild {
            child,
            choice_type: choice.map(|i| &child.choices[i].1),
        })
    }
}

/// The sealed metamodel of one FHIR version.
#[derive(Debug)]
pub struct Registry {
    version: FhirVersion,
    descriptors: HashMap<TypeKey, ElementTypeDescriptor>,
    definitions: Vec<StructuralDefinition>,
    by_name: HashMap<String, usize>,
    by_key: HashMap<TypeKey, usize>,
    extension_slot: ExtensionSlotDefinition,
}

impl Registry {
    /// Build and seal a registry from a catalog.
    pub fn build(catalog: &TypeCatalog) -> Result<Self> {
        let version = catalog.version();
        let descriptors: HashMap<TypeKey, ElementTypeDescriptor> = catalog
            .iter()
            .map(|d| (d.key().clone(), d.clone()))
            .collect();

        let mut names: HashMap<&str, &TypeKey> = HashMap::new();
        for d in catalog.iter() {
            if let Some(base) = d.base() {
                if !descriptors.contains_key(base) {
                    return Err(ConfigurationError::UnknownBase {
                        type_key: d.key().clone(),
                        base: base.clone(),
                    });
                }
            }
            if d.is_specialization() {
                continue;
            }
            if let Some(first) = names.insert(d.name(), d.key()) {
                return Err(ConfigurationError::DuplicateStructuralName {
                    name: d.name().to_string(),
                    first: first.clone(),
                    second: d.key().clone(),
                });
            }
        }

        let mut definitions = Vec::new();
        let mut by_name = HashMap::new();
        let mut by_key = HashMap::new();
        for d in catalog.iter().filter(|d| d.kind().is_structural()) {
            let definition = build_definition(d, &descriptors)?;
            by_name.entry(d.name().to_string()).or_insert(definitions.len());
            by_key.insert(d.key().clone(), definitions.len());
            definitions.push(definition);
        }

        let extension_slot = ExtensionSlotDefinition::build(catalog, &version)?;

        tracing::debug!(
            %version,
            types = descriptors.len(),
            definitions = definitions.len(),
            "sealed structural registry"
        );

        Ok(Self {
            version,
            descriptors,
            definitions,
            by_name,
            by_key,
            extension_slot,
        })
    }

    pub fn version(&self) -> FhirVersion {
        self.version
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<&StructuralDefinition> {
        self.by_name.get(name).map(|&i| &self.definitions[i])
    }

    pub fn lookup_by_value_type(&self, type_key: &TypeKey) -> Option<&StructuralDefinition> {
        self.by_key.get(type_key).map(|&i| &self.definitions[i])
    }

    pub fn descriptor(&self, type_key: &TypeKey) -> Option<&ElementTypeDescriptor> {
        self.descriptors.get(type_key)
    }

    pub fn kind_of(&self, type_key: &TypeKey) -> Option<TypeKind> {
        self.descriptor(type_key).map(ElementTypeDescriptor::kind)
    }

    pub fn primitive_kind(&self, type_key: &TypeKey) -> Option<PrimitiveKind> {
        match self.kind_of(type_key)? {
            TypeKind::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    /// A resource type that can appear as a document root.
    pub fn is_concrete_resource(&self, name: &str) -> bool {
        self.lookup_by_name(name)
            .is_some_and(|d| d.kind == TypeKind::Resource && !d.is_abstract)
    }

    /// Whether `type_key` is `ancestor` or derives from it through the base chain.
    pub fn is_subtype_of(&self, type_key: &TypeKey, ancestor: &TypeKey) -> bool {
        let mut current = Some(type_key);
        let mut steps = 0;
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.descriptors.len() {
                return false;
            }
            current = self.descriptor(key).and_then(ElementTypeDescriptor::base);
        }
        false
    }

    /// Whether a value of `type_key` may be placed in `child`.
    ///
    /// Subtypes are accepted, and so is the type a specialized slot narrows.
    pub fn accepts(&self, child: &ChildDefinition, type_key: &TypeKey) -> bool {
        child.types.iter().any(|accepted| {
            self.is_subtype_of(type_key, accepted)
                || self
                    .descriptor(accepted)
                    .and_then(ElementTypeDescriptor::specialization_of)
                    == Some(type_key)
        })
    }

    /// Datatype selected by a `value<Type>` wire name of a choice child.
    pub fn resolve_choice<'a>(
        &self,
        child: &'a ChildDefinition,
        wire_name: &str,
    ) -> Option<&'a TypeKey> {
        child
            .choices
            .iter()
            .find(|(name, _)| name == wire_name)
            .map(|(_, t)| t)
    }

    pub fn extension_slot(&self) -> &ExtensionSlotDefinition {
        &self.extension_slot
    }

    /// The reference datatype of this version.
    pub fn reference_type(&self) -> &TypeKey {
        self.extension_slot.reference_type()
    }
}

fn build_definition(
    d: &ElementTypeDescriptor,
    descriptors: &HashMap<TypeKey, ElementTypeDescriptor>,
) -> Result<StructuralDefinition> {
    // Base chain, root first
    let mut chain = vec![d];
    let mut seen = HashSet::from([d.key()]);
    let mut current = d;
    while let Some(base) = current.base() {
        // Checked by the caller
        let Some(next) = descriptors.get(base) else {
            break;
        };
        if !seen.insert(next.key()) {
            return Err(ConfigurationError::CircularBase(d.key().clone()));
        }
        chain.push(next);
        current = next;
    }
    chain.reverse();

    let mut children: Vec<ChildDefinition> = Vec::new();
    let mut by_wire_name = HashMap::new();
    for decl in chain.iter().flat_map(|t| t.children()) {
        for ty in &decl.types {
            if !descriptors.contains_key(ty) {
                return Err(ConfigurationError::UnknownType {
                    owner: d.name().to_string(),
                    child: decl.name.clone(),
                    type_key: ty.clone(),
                });
            }
        }

        let index = children.len();
        let duplicate = |child: &str| ConfigurationError::DuplicateChildName {
            definition: d.name().to_string(),
            child: child.to_string(),
        };

        let choices: Vec<(String, TypeKey)> = match decl.name.strip_suffix("[x]") {
            Some(stem) => decl
                .types
                .iter()
                .map(|t| {
                    let type_name = descriptors.get(t).map_or(t.as_str(), |td| td.name());
                    (format!("{}{}", stem, capitalize_first(type_name)), t.clone())
                })
                .collect(),
            None => Vec::new(),
        };

        if choices.is_empty() {
            if by_wire_name.insert(decl.name.clone(), (index, None)).is_some() {
                return Err(duplicate(&decl.name));
            }
        } else {
            for (i, (wire, _)) in choices.iter().enumerate() {
                if by_wire_name.insert(wire.clone(), (index, Some(i))).is_some() {
                    return Err(duplicate(wire));
                }
            }
        }

        children.push(ChildDefinition {
            name: decl.name.clone(),
            min: decl.min,
            max: decl.max,
            role: role_of(d.kind(), &decl.name, &decl.types, descriptors),
            types: decl.types.clone(),
            choices,
        });
    }

    Ok(StructuralDefinition {
        name: d.name().to_string(),
        type_key: d.key().clone(),
        kind: d.kind(),
        base: d.base().cloned(),
        is_abstract: d.is_abstract(),
        children,
        by_wire_name,
    })
}

fn role_of(
    owner: TypeKind,
    name: &str,
    types: &[TypeKey],
    descriptors: &HashMap<TypeKey, ElementTypeDescriptor>,
) -> ChildRole {
    let single = match types {
        [t] => descriptors.get(t),
        _ => None,
    };
    let single_kind = single.map(ElementTypeDescriptor::kind);
    let single_name = single.map(ElementTypeDescriptor::name);

    match (owner, name) {
        (_, EXTENSION_ELEMENT) if single_kind == Some(TypeKind::Extension) => {
            ChildRole::Extension { modifier: false }
        }
        (_, MODIFIER_EXTENSION_ELEMENT) if single_kind == Some(TypeKind::Extension) => {
            ChildRole::Extension { modifier: true }
        }
        (TypeKind::Resource, "id") => ChildRole::ResourceId,
        (TypeKind::Resource, "meta") if single_name == Some("Meta") => ChildRole::Meta,
        (TypeKind::Resource, "contained") => ChildRole::Contained,
        (TypeKind::Resource, "text") if single_name == Some("Narrative") => ChildRole::Narrative,
        _ => ChildRole::Declared,
    }
}
