//! FHIR type catalogs and the structural registry built from them
//!
//! A [`TypeCatalog`] lists the datatypes and resource types of one FHIR version. A
//! [`Registry`] is built from it once, including the synthesized
//! [`ExtensionSlotDefinition`], and is then shared read-only by every encoder and
//! decoder call.
//!
//! ```rust
//! use ferrum_context::{FhirVersion, Registry, TypeCatalog};
//!
//! let catalog = TypeCatalog::builtin(FhirVersion::R4)?;
//! let registry = Registry::build(&catalog)?;
//!
//! let patient = registry.lookup_by_name("Patient").unwrap();
//! assert!(patient.child("birthDate").is_some());
//! assert_eq!(
//!     registry.extension_slot().child_name_by_datatype(&"string".into()),
//!     Some("valueString")
//! );
//! # Ok::<(), ferrum_context::ConfigurationError>(())
//! ```

pub mod cache;
pub mod catalog;
pub mod error;
pub mod extension_slot;
pub mod registry;
pub mod version;

pub use cache::RegistryCache;
pub use catalog::{
    BuiltinCatalogs, CatalogBuilder, ChildDecl, ElementTypeDescriptor, Max, PrimitiveKind,
    TypeCatalog, TypeCatalogProvider, TypeKind,
};
pub use error::{ConfigurationError, Result};
pub use extension_slot::{
    ExtensionSlotDefinition, SlotChild, EXTENSION_ELEMENT, MODIFIER_EXTENSION_ELEMENT,
};
pub use registry::{ChildDefinition, ChildRole, Registry, ResolvedChild, StructuralDefinition};
pub use version::{FhirVersion, VersionCapabilities};
