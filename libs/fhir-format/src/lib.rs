//! Structural FHIR XML and JSON encoding
//!
//! One generic encoder and decoder, driven by the [`Registry`](ferrum_context::Registry)
//! of a FHIR version, maps resource graphs to and from both wire formats:
//! - Primitive values are written as `value` attributes in XML and as `_name`
//!   companions carry their ids and extensions in JSON.
//! - Extension values use the attribute names synthesized for the version
//!   (`valueString`, `valueReference`, ...).
//! - In-memory references are contained under local ids before encoding and linked
//!   back to the contained entries after decoding.
//! - `meta` and Bundle entry annotations live in the resource's metadata side-table.
//!
//! # Example
//!
//! ```rust
//! use ferrum_context::FhirVersion;
//! use ferrum_format::{FhirParser, WireFormat};
//! use ferrum_models::{Extension, Resource, Value};
//!
//! let parser = FhirParser::for_version(FhirVersion::R4)?;
//!
//! let mut patient = Resource::new("Patient");
//! patient
//!     .body
//!     .extensions
//!     .push(Extension::new("http://example.org/u1").with_value(Value::string("v1")));
//!
//! let xml = parser.encode(&mut patient, WireFormat::Xml, false)?;
//! assert_eq!(
//!     xml,
//!     r#"<Patient xmlns="http://hl7.org/fhir"><extension url="http://example.org/u1"><valueString value="v1"/></extension></Patient>"#
//! );
//!
//! let decoded = parser.decode(&xml, WireFormat::Xml, "Patient")?;
//! assert!(decoded.issues.is_empty());
//! assert_eq!(decoded.resource, patient);
//! # Ok::<(), ferrum_format::FormatError>(())
//! ```

pub mod containment;
mod decoder;
mod encoder;
pub mod error;
pub mod issue;
pub mod json;
mod metadata;
pub mod options;
pub mod parser;
pub mod tree;
pub mod xml;

pub use containment::contain_resources;
pub use error::{ContainmentError, FormatError, Result, StructureError};
pub use issue::{DecodeIssue, IssueKind};
pub use options::ParserOptions;
pub use parser::{Decoded, FhirParser, WireFormat};
