//! Element type catalog
//!
//! A catalog is plain data: the list of datatypes and resource types known for one
//! FHIR version, each with its declared children. The registry is built from it.

mod builtin;
mod structure_definition;

use crate::error::{ConfigurationError, Result};
use crate::version::FhirVersion;
use ferrum_models::TypeKey;
use std::collections::HashMap;

/// How a primitive is represented on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Integer,
    Decimal,
    String,
    /// Narrative markup, carried as raw XHTML
    Xhtml,
}

impl PrimitiveKind {
    /// Wire class of a primitive by its schema name.
    pub fn for_name(name: &str) -> Self {
        match name {
            "boolean" => PrimitiveKind::Boolean,
            "integer" | "unsignedInt" | "positiveInt" | "integer64" => PrimitiveKind::Integer,
            "decimal" => PrimitiveKind::Decimal,
            "xhtml" => PrimitiveKind::Xhtml,
            _ => PrimitiveKind::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Complex,
    Reference,
    Extension,
    Backbone,
    Resource,
}

impl TypeKind {
    pub fn is_primitive(self) -> bool {
        matches!(self, TypeKind::Primitive(_))
    }

    /// Kinds that get a structural definition in the registry.
    pub fn is_structural(self) -> bool {
        !self.is_primitive()
    }
}

/// Upper bound of a cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Max {
    Bounded(u32),
    Unbounded,
}

impl Max {
    pub fn is_repeating(self) -> bool {
        match self {
            Max::Bounded(n) => n > 1,
            Max::Unbounded => true,
        }
    }

    /// Parse `*` or a number, as found in `ElementDefinition.max`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "*" => Some(Max::Unbounded),
            n => n.parse().ok().map(Max::Bounded),
        }
    }
}

/// One declared child of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDecl {
    pub name: String,
    pub min: u32,
    pub max: Max,
    pub types: Vec<TypeKey>,
}

/// Identity and declared shape of one datatype or resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTypeDescriptor {
    key: TypeKey,
    name: String,
    kind: TypeKind,
    specialization_of: Option<TypeKey>,
    base: Option<TypeKey>,
    is_abstract: bool,
    children: Vec<ChildDecl>,
}

impl ElementTypeDescriptor {
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// Schema name, used for extension attribute synthesis and wire names.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// A narrowing of another type. Specializations never get their own extension slot.
    pub fn is_specialization(&self) -> bool {
        self.specialization_of.is_some()
    }

    pub fn specialization_of(&self) -> Option<&TypeKey> {
        self.specialization_of.as_ref()
    }

    /// Base type whose children are inherited. Specializations inherit from the
    /// type they narrow when no explicit base is set.
    pub fn base(&self) -> Option<&TypeKey> {
        self.base.as_ref().or(self.specialization_of.as_ref())
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Children declared on this type, excluding inherited ones.
    pub fn children(&self) -> &[ChildDecl] {
        &self.children
    }
}

/// The known types of one FHIR version, in declaration order.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    version: FhirVersion,
    descriptors: Vec<ElementTypeDescriptor>,
    index: HashMap<TypeKey, usize>,
}

impl TypeCatalog {
    pub fn builder(version: FhirVersion) -> CatalogBuilder {
        CatalogBuilder {
            version,
            descriptors: Vec::new(),
        }
    }

    /// Built-in catalog for a version.
    pub fn builtin(version: FhirVersion) -> Result<Self> {
        builtin::catalog(version)
    }

    /// Derive a catalog from StructureDefinition resources with snapshots.
    pub fn from_structure_definitions(
        version: FhirVersion,
        definitions: &[serde_json::Value],
    ) -> Result<Self> {
        structure_definition::catalog(version, definitions)
    }

    pub fn version(&self) -> FhirVersion {
        self.version
    }

    pub fn get(&self, key: &TypeKey) -> Option<&ElementTypeDescriptor> {
        self.index.get(key).map(|&i| &self.descriptors[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementTypeDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Start a builder holding every descriptor of this catalog.
    pub fn to_builder(&self) -> CatalogBuilder {
        CatalogBuilder {
            version: self.version,
            descriptors: self.descriptors.clone(),
        }
    }
}

/// Supplies catalogs by version.
pub trait TypeCatalogProvider: Send + Sync {
    fn catalog(&self, version: FhirVersion) -> Result<TypeCatalog>;
}

/// Provider backed by the built-in DSTU2 and R4 catalogs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalogs;

impl TypeCatalogProvider for BuiltinCatalogs {
    fn catalog(&self, version: FhirVersion) -> Result<TypeCatalog> {
        TypeCatalog::builtin(version)
    }
}

/// Accumulates descriptors, then checks key uniqueness on [`CatalogBuilder::build`].
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    version: FhirVersion,
    descriptors: Vec<ElementTypeDescriptor>,
}

impl CatalogBuilder {
    /// Add a descriptor with explicit key and schema name.
    pub fn descriptor(
        &mut self,
        key: impl Into<TypeKey>,
        name: &str,
        kind: TypeKind,
    ) -> DescriptorBuilder<'_> {
        self.descriptors.push(ElementTypeDescriptor {
            key: key.into(),
            name: name.to_string(),
            kind,
            specialization_of: None,
            base: None,
            is_abstract: false,
            children: Vec::new(),
        });
        let last = self.descriptors.len() - 1;
        DescriptorBuilder(&mut self.descriptors[last])
    }

    pub fn primitive(&mut self, name: &str) -> DescriptorBuilder<'_> {
        self.descriptor(name, name, TypeKind::Primitive(PrimitiveKind::for_name(name)))
    }

    /// A complex datatype deriving from `Element`.
    pub fn complex(&mut self, name: &str) -> DescriptorBuilder<'_> {
        self.descriptor(name, name, TypeKind::Complex).base("Element")
    }

    /// A narrowing of `of` that shares its children and extension attribute.
    pub fn specialization(&mut self, name: &str, of: &str) -> DescriptorBuilder<'_> {
        self.descriptor(name, name, TypeKind::Complex)
            .specialization(of)
    }

    pub fn reference(&mut self, name: &str) -> DescriptorBuilder<'_> {
        self.descriptor(name, name, TypeKind::Reference).base("Element")
    }

    pub fn extension(&mut self, name: &str) -> DescriptorBuilder<'_> {
        self.descriptor(name, name, TypeKind::Extension)
    }

    /// A concrete resource deriving from `DomainResource`.
    pub fn resource(&mut self, name: &str) -> DescriptorBuilder<'_> {
        self.descriptor(name, name, TypeKind::Resource).base("DomainResource")
    }

    pub fn abstract_resource(&mut self, name: &str) -> DescriptorBuilder<'_> {
        self.descriptor(name, name, TypeKind::Resource).abstract_type()
    }

    /// A backbone element, named by its path (`Patient.contact`).
    pub fn backbone(&mut self, path: &str) -> DescriptorBuilder<'_> {
        self.descriptor(path, path, TypeKind::Backbone)
            .base("BackboneElement")
    }

    pub fn build(self) -> Result<TypeCatalog> {
        let mut index = HashMap::with_capacity(self.descriptors.len());
        for (i, d) in self.descriptors.iter().enumerate() {
            if index.insert(d.key.clone(), i).is_some() {
                return Err(ConfigurationError::DuplicateTypeKey(d.key.clone()));
            }
        }
        Ok(TypeCatalog {
            version: self.version,
            descriptors: self.descriptors,
            index,
        })
    }
}

/// Fluent access to the descriptor just added.
pub struct DescriptorBuilder<'a>(&'a mut ElementTypeDescriptor);

impl DescriptorBuilder<'_> {
    pub fn base(self, base: &str) -> Self {
        self.0.base = Some(TypeKey::new(base));
        self
    }

    pub fn no_base(self) -> Self {
        self.0.base = None;
        self
    }

    pub fn specialization(self, of: &str) -> Self {
        self.0.specialization_of = Some(TypeKey::new(of));
        self
    }

    pub fn abstract_type(self) -> Self {
        self.0.is_abstract = true;
        self
    }

    pub fn child(self, name: &str, min: u32, max: Max, types: &[&str]) -> Self {
        self.0.children.push(ChildDecl {
            name: name.to_string(),
            min,
            max,
            types: types.iter().map(|t| TypeKey::new(*t)).collect(),
        });
        self
    }

    pub fn with_child(self, child: ChildDecl) -> Self {
        self.0.children.push(child);
        self
    }

    /// `0..1`
    pub fn opt(self, name: &str, ty: &str) -> Self {
        self.child(name, 0, Max::Bounded(1), &[ty])
    }

    /// `1..1`
    pub fn req(self, name: &str, ty: &str) -> Self {
        self.child(name, 1, Max::Bounded(1), &[ty])
    }

    /// `0..*`
    pub fn many(self, name: &str, ty: &str) -> Self {
        self.child(name, 0, Max::Unbounded, &[ty])
    }

    /// `0..1` choice over several types; `name` ends in `[x]`.
    pub fn choice(self, name: &str, types: &[&str]) -> Self {
        self.child(name, 0, Max::Bounded(1), types)
    }
}
