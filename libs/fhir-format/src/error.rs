use crate::issue::DecodeIssue;
use ferrum_context::ConfigurationError;
use ferrum_models::TypeKey;
use thiserror::Error;

/// Problems with the shape of a document or of a resource graph being encoded.
#[derive(Debug, Error)]
pub enum StructureError {
    #[error("XML parse error: {0}")]
    MalformedXml(#[from] roxmltree::Error),

    #[error("JSON parse error: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("expected a JSON object for the resource")]
    ExpectedObject,

    #[error("missing resourceType property")]
    MissingResourceType,

    #[error("nested array in property {0}")]
    NestedArray(String),

    #[error("root element {found} is not a {expected}")]
    RootTypeMismatch { expected: String, found: String },

    #[error("unknown resource type {0}")]
    UnknownResourceType(String),

    #[error("no structural definition for type {0}")]
    UnknownType(TypeKey),

    #[error("{owner} has no child {child}")]
    UnknownElement { owner: String, child: String },

    #[error("{owner}.{child} does not accept a value of type {type_key}")]
    TypeMismatch {
        owner: String,
        child: String,
        type_key: TypeKey,
    },

    #[error("{owner}.{child} holds {count} values but does not repeat")]
    TooManyValues {
        owner: String,
        child: String,
        count: usize,
    },

    #[error("no extension attribute for values of type {type_key} (extension {url})")]
    UnsupportedExtensionValue { url: String, type_key: TypeKey },

    #[error("{path}: invalid primitive value {value:?}")]
    InvalidPrimitive { path: String, value: String },

    #[error("{0}")]
    Rejected(DecodeIssue),
}

/// Failures of the containment pass run before every encode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainmentError {
    #[error("{resource_type} is reachable from itself through contained references")]
    Cycle { resource_type: String },

    #[error("{resource_type} cannot be contained: it has a contained set of its own")]
    NestedContainment { resource_type: String },

    #[error("local id #{token} is claimed by two different resources")]
    LocalIdCollision { token: String },

    #[error("{resource_type} is linked in memory but was never contained and has no id")]
    Uncontained { resource_type: String },
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    Containment(#[from] ContainmentError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::Error),

    #[error("JSON write error: {0}")]
    JsonWrite(serde_json::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, FormatError>;
