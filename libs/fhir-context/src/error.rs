//! Error types for registry construction

use crate::version::FhirVersion;
use ferrum_models::TypeKey;
use thiserror::Error;

/// Raised while building a catalog or sealing a registry. Never raised afterwards.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Type key {0} is declared twice")]
    DuplicateTypeKey(TypeKey),

    #[error("Structural name {name} is defined by both {first} and {second}")]
    DuplicateStructuralName {
        name: String,
        first: TypeKey,
        second: TypeKey,
    },

    #[error("Child {child} is declared twice in {definition}")]
    DuplicateChildName { definition: String, child: String },

    #[error("Extension attribute {attribute} is synthesized for both {first} and {second}")]
    DuplicateAttributeName {
        attribute: String,
        first: TypeKey,
        second: TypeKey,
    },

    #[error("{owner}.{child} accepts unknown type {type_key}")]
    UnknownType {
        owner: String,
        child: String,
        type_key: TypeKey,
    },

    #[error("{type_key} derives from unknown type {base}")]
    UnknownBase { type_key: TypeKey, base: TypeKey },

    #[error("Circular base chain at {0}")]
    CircularBase(TypeKey),

    #[error("No reference datatype named {0} in the catalog")]
    MissingReferenceType(String),

    #[error("No type catalog available for FHIR {0}")]
    UnsupportedVersion(FhirVersion),

    #[error("Invalid StructureDefinition: {0}")]
    InvalidStructureDefinition(String),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;
