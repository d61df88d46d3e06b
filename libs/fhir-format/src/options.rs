//! Parser configuration

use serde::{Deserialize, Serialize};

/// Settings shared by every encode and decode of one [`FhirParser`](crate::FhirParser).
///
/// Deserializes from camelCase JSON; missing fields take their defaults.
///
/// ```rust
/// use ferrum_format::ParserOptions;
///
/// let options: ParserOptions = serde_json::from_str(r#"{ "lenient": false }"#).unwrap();
/// assert!(!options.lenient);
/// assert!(options.suppress_contained_narrative);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParserOptions {
    /// Indent output. [`FhirParser::encode`](crate::FhirParser::encode) overrides this per call.
    pub pretty_print: bool,
    /// Start XML output with `<?xml version="1.0" encoding="UTF-8"?>`
    pub xml_declaration: bool,
    /// Record unknown content as issues instead of failing the decode
    pub lenient: bool,
    /// Drop `/_history/<v>` from reference strings on encode
    pub strip_versions_from_references: bool,
    /// Leave `text` out of contained copies
    pub suppress_contained_narrative: bool,
    /// Stop recording issues after this many; `None` keeps all of them
    pub max_issues: Option<usize>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            pretty_print: false,
            xml_declaration: false,
            lenient: true,
            strip_versions_from_references: false,
            suppress_contained_narrative: true,
            max_issues: None,
        }
    }
}

impl ParserOptions {
    /// Unknown content fails the decode.
    pub fn strict() -> Self {
        Self {
            lenient: false,
            ..Self::default()
        }
    }
}
