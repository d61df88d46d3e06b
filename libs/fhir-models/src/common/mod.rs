//! Version-agnostic runtime model
//!
//! Types that work across DSTU2 and R4 registries

pub mod element;
pub mod error;
pub mod extension;
pub mod metadata;
pub mod reference;
pub mod resource;
pub mod type_key;

// Re-export commonly used types
pub use element::*;
pub use error::{Error, Result};
pub use extension::*;
pub use metadata::*;
pub use reference::*;
pub use resource::*;
pub use type_key::TypeKey;
