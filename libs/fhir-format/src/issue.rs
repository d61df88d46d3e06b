//! Non-fatal decode diagnostics

use serde::Serialize;
use std::fmt;

/// What a lenient decode skipped or repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// A child name the definition does not declare
    UnknownElement,
    /// An attribute inside an extension that matches no synthesized name
    UnknownExtensionAttribute,
    /// A primitive lexical form that does not parse for its type
    InvalidPrimitive,
    /// An extension carrying both a value and nested extensions
    ExtensionValueAndChildren,
    /// An extension without a `url`
    MissingUrl,
    ContainedWithoutId,
    /// Two contained resources with the same local id
    DuplicateContainedId,
    /// More values than a non-repeating child allows
    TooManyValues,
    /// A value whose type the child does not accept
    TypeMismatch,
    /// `meta` or Bundle entry content with no side-table key
    DroppedMetadata,
    /// A side-table value with an unknown code
    InvalidMetadata,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnknownElement => "unknown-element",
            Self::UnknownExtensionAttribute => "unknown-extension-attribute",
            Self::InvalidPrimitive => "invalid-primitive",
            Self::ExtensionValueAndChildren => "extension-value-and-children",
            Self::MissingUrl => "missing-url",
            Self::ContainedWithoutId => "contained-without-id",
            Self::DuplicateContainedId => "duplicate-contained-id",
            Self::TooManyValues => "too-many-values",
            Self::TypeMismatch => "type-mismatch",
            Self::DroppedMetadata => "dropped-metadata",
            Self::InvalidMetadata => "invalid-metadata",
        };
        write!(f, "{}", s)
    }
}

/// One diagnostic recorded while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeIssue {
    pub kind: IssueKind,
    /// Dotted wire path, `Patient.extension.valueFoo`
    pub path: String,
    pub message: String,
}

impl DecodeIssue {
    pub fn new(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for DecodeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.path, self.kind, self.message)
    }
}
