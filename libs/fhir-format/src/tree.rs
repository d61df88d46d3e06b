//! Format-neutral document tree
//!
//! Readers turn text into a [`WireNode`] tree and writers turn one back into text. The
//! encoder and decoder only ever see this tree, so both wire formats share one traversal.

/// A primitive's lexical value as it appeared on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Text(String),
    Boolean(bool),
    /// A JSON number, kept as its literal text
    Number(String),
}

impl Scalar {
    pub fn lexical(&self) -> String {
        match self {
            Scalar::Text(s) | Scalar::Number(s) => s.clone(),
            Scalar::Boolean(b) => b.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Complex,
    Primitive,
    /// A resource root: `resourceType` in JSON, a capitalized element in XML
    Resource,
}

/// One element of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct WireNode {
    pub name: String,
    pub shape: Shape,
    pub id: Option<String>,
    /// Extension URL
    pub url: Option<String>,
    pub value: Option<Scalar>,
    /// Raw XHTML markup of a narrative `div`, outer element included
    pub xhtml: Option<String>,
    /// Written as a JSON array even with a single occurrence
    pub repeats: bool,
    pub children: Vec<WireNode>,
}

impl WireNode {
    fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            id: None,
            url: None,
            value: None,
            xhtml: None,
            repeats: false,
            children: Vec::new(),
        }
    }

    pub fn complex(name: impl Into<String>) -> Self {
        Self::new(name, Shape::Complex)
    }

    pub fn primitive(name: impl Into<String>, value: Option<Scalar>) -> Self {
        let mut node = Self::new(name, Shape::Primitive);
        node.value = value;
        node
    }

    pub fn resource(resource_type: impl Into<String>) -> Self {
        Self::new(resource_type, Shape::Resource)
    }

    /// A child slot holding a whole resource (`contained`, `entry.resource`).
    pub fn wrapper(name: impl Into<String>, resource: WireNode) -> Self {
        let mut node = Self::complex(name);
        node.children.push(resource);
        node
    }

    pub fn repeating(mut self, repeats: bool) -> Self {
        self.repeats = repeats;
        self
    }

    /// The resource held by a wrapper node.
    pub fn wrapped_resource(&self) -> Option<&WireNode> {
        match self.children.as_slice() {
            [only] if only.shape == Shape::Resource && self.value.is_none() => Some(only),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.shape == Shape::Primitive
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a WireNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&WireNode> {
        self.children.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapper_exposes_resource() {
        let wrapper = WireNode::wrapper("contained", WireNode::resource("Patient"));
        assert_eq!(wrapper.wrapped_resource().map(|r| r.name.as_str()), Some("Patient"));
        assert!(WireNode::complex("name").wrapped_resource().is_none());
    }

    #[test]
    fn scalar_lexical_forms() {
        assert_eq!(Scalar::Boolean(true).lexical(), "true");
        assert_eq!(Scalar::Number("1.50".into()).lexical(), "1.50");
    }
}
