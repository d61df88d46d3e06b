//! Open content
//!
//! An [`Extension`] carries either one typed value or a list of nested extensions.
//! The two are mutually exclusive, which [`ExtensionContent`] enforces by shape.

use super::element::Value;

/// What an extension holds.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExtensionContent {
    /// Neither a value nor nested extensions. Accepted and round-tripped as-is.
    #[default]
    Empty,
    Value(Value),
    Nested(Vec<Extension>),
}

/// A URL-identified attachment to an element.
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub id: Option<String>,
    pub url: String,
    /// Emitted as `modifierExtension` instead of `extension`
    pub modifier: bool,
    pub content: ExtensionContent,
}

/// A borrowed view of one item returned by [`Extension::values`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtensionItem<'a> {
    Value(&'a Value),
    Extension(&'a Extension),
}

/// Something that can be added to an extension with [`Extension::add`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionChild {
    Value(Value),
    Extension(Extension),
}

impl From<Value> for ExtensionChild {
    fn from(value: Value) -> Self {
        ExtensionChild::Value(value)
    }
}

impl From<Extension> for ExtensionChild {
    fn from(extension: Extension) -> Self {
        ExtensionChild::Extension(extension)
    }
}

impl Extension {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: None,
            url: url.into(),
            modifier: false,
            content: ExtensionContent::Empty,
        }
    }

    pub fn modifier(url: impl Into<String>) -> Self {
        Self {
            modifier: true,
            ..Self::new(url)
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.set_value(value);
        self
    }

    pub fn with_nested(mut self, extension: Extension) -> Self {
        self.push_extension(extension);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.content {
            ExtensionContent::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn value_mut(&mut self) -> Option<&mut Value> {
        match &mut self.content {
            ExtensionContent::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn nested(&self) -> &[Extension] {
        match &self.content {
            ExtensionContent::Nested(children) => children,
            _ => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.content, ExtensionContent::Empty)
    }

    /// Replaces whatever the extension held with a single value.
    pub fn set_value(&mut self, value: Value) {
        self.content = ExtensionContent::Value(value);
    }

    /// Appends a nested extension.
    ///
    /// An extension holding a plain value loses that value: the two forms cannot coexist.
    pub fn push_extension(&mut self, extension: Extension) {
        match &mut self.content {
            ExtensionContent::Nested(children) => children.push(extension),
            content => *content = ExtensionContent::Nested(vec![extension]),
        }
    }

    /// The single value if one is set, otherwise the nested extensions.
    pub fn values(&self) -> Vec<ExtensionItem<'_>> {
        match &self.content {
            ExtensionContent::Empty => Vec::new(),
            ExtensionContent::Value(v) => vec![ExtensionItem::Value(v)],
            ExtensionContent::Nested(children) => {
                children.iter().map(ExtensionItem::Extension).collect()
            }
        }
    }

    /// Adds a value or a nested extension.
    ///
    /// Plain values replace (last write wins); nested extensions append in order.
    pub fn add(&mut self, child: impl Into<ExtensionChild>) {
        match child.into() {
            ExtensionChild::Value(v) => self.set_value(v),
            ExtensionChild::Extension(e) => self.push_extension(e),
        }
    }
}
