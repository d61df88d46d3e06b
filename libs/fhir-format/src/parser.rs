//! Parser entry points

use crate::containment::contain_resources;
use crate::decoder::decode_document;
use crate::encoder::encode_resource;
use crate::error::Result;
use crate::issue::DecodeIssue;
use crate::options::ParserOptions;
use crate::{json, xml};
use ferrum_context::{FhirVersion, Registry, TypeCatalog};
use ferrum_models::Resource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    Xml,
    Json,
}

impl WireFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            WireFormat::Xml => "xml",
            WireFormat::Json => "json",
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WireFormat {
    type Err = String;

    /// Accepts `xml`/`json` and the FHIR mime types.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" | "application/fhir+xml" | "application/xml+fhir" | "application/xml" => {
                Ok(WireFormat::Xml)
            }
            "json" | "application/fhir+json" | "application/json+fhir" | "application/json" => {
                Ok(WireFormat::Json)
            }
            other => Err(format!("Unsupported wire format: {}", other)),
        }
    }
}

/// A decoded resource and the diagnostics a lenient decode recorded.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub resource: Resource,
    pub issues: Vec<DecodeIssue>,
}

/// Encoder and decoder bound to one registry.
///
/// Cheap to clone; the registry is shared, so parsers for the same version can be used
/// from any number of threads at once.
#[derive(Debug, Clone)]
pub struct FhirParser {
    registry: Arc<Registry>,
    options: ParserOptions,
}

impl FhirParser {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_options(registry, ParserOptions::default())
    }

    pub fn with_options(registry: Arc<Registry>, options: ParserOptions) -> Self {
        Self { registry, options }
    }

    /// A parser over a freshly built registry for the built-in catalog of `version`.
    ///
    /// Prefer sharing one registry (see `ferrum_context::RegistryCache`) when creating
    /// many parsers.
    pub fn for_version(version: FhirVersion) -> Result<Self> {
        let registry = Registry::build(&TypeCatalog::builtin(version)?)?;
        Ok(Self::new(Arc::new(registry)))
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Encode a resource.
    ///
    /// Runs the containment pass first: linked targets are added to `resource.contained`
    /// and reference strings are rewritten, so the resource is modified.
    pub fn encode(&self, resource: &mut Resource, format: WireFormat, pretty: bool) -> Result<String> {
        contain_resources(&self.registry, resource)?;
        let root = encode_resource(&self.registry, &self.options, resource)?;
        match format {
            WireFormat::Xml => xml::write(&root, pretty, self.options.xml_declaration),
            WireFormat::Json => json::write(&root, pretty),
        }
    }

    /// [`encode`](Self::encode) with the configured `pretty_print`.
    pub fn encode_to_string(&self, resource: &mut Resource, format: WireFormat) -> Result<String> {
        self.encode(resource, format, self.options.pretty_print)
    }

    /// Decode a document whose root is `target_type` or a subtype of it.
    pub fn decode(&self, text: &str, format: WireFormat, target_type: &str) -> Result<Decoded> {
        let root = match format {
            WireFormat::Xml => xml::read(text)?,
            WireFormat::Json => json::read(text)?,
        };
        let (resource, issues) = decode_document(&self.registry, &self.options, &root, target_type)?;
        tracing::debug!(
            resource_type = %resource.resource_type,
            format = %format,
            issues = issues.len(),
            "decoded resource"
        );
        Ok(Decoded { resource, issues })
    }

    /// Re-encode a document in another format, going through the resource graph.
    pub fn convert(
        &self,
        text: &str,
        from: WireFormat,
        to: WireFormat,
        target_type: &str,
    ) -> Result<String> {
        let mut decoded = self.decode(text, from, target_type)?;
        self.encode_to_string(&mut decoded.resource, to)
    }
}
