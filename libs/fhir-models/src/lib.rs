//! In-memory FHIR resource graph
//!
//! This crate provides the runtime shapes the structural encoder and decoder work on.
//! Nothing here knows about a particular FHIR version: every element carries the
//! [`TypeKey`] of the datatype it instantiates and the registry in `ferrum-context`
//! supplies the structure.
//!
//! # Module Organization
//!
//! - `common::element`: [`Value`], [`Element`] and typed [`Primitive`] values
//! - `common::extension`: open content, [`Extension`] with its tagged content
//! - `common::reference`: [`Reference`] and the [`ResourceLink`] into a contained set
//! - `common::resource`: [`Resource`] and its [`ContainedResources`]
//! - `common::metadata`: the [`ResourceMetadata`] side-table
//!
//! # Example
//!
//! ```rust
//! use ferrum_models::{Extension, Resource, Value};
//!
//! let mut patient = Resource::new("Patient");
//! patient
//!     .body
//!     .extensions
//!     .push(Extension::new("http://example.org/u1").with_value(Value::string("v1")));
//!
//! let ext = &patient.body.extensions[0];
//! assert_eq!(ext.value().and_then(Value::as_str), Some("v1"));
//! ```

pub mod common;

// Re-export commonly used types
pub use common::*;
