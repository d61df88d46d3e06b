//! Generic element values
//!
//! Every value in a resource graph is one of a closed set of shapes. Which datatype a
//! value instantiates is carried by its [`TypeKey`], never by a Rust type, so one
//! model serves every catalog the registry is built from.

use super::extension::Extension;
use super::reference::Reference;
use super::resource::Resource;
use super::type_key::TypeKey;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// A value held by a child slot of an element or resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A primitive datatype (`string`, `boolean`, `dateTime`, ...)
    Primitive(Primitive),
    /// A complex datatype or backbone element
    Element(Element),
    /// A reference to another resource
    Reference(Reference),
    /// A resource held inline (e.g. `Bundle.entry.resource`)
    Resource(Box<Resource>),
}

impl Value {
    pub fn primitive(type_key: impl Into<TypeKey>, value: PrimitiveValue) -> Self {
        Value::Primitive(Primitive::new(type_key, value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::primitive("string", PrimitiveValue::String(value.into()))
    }

    pub fn code(value: impl Into<String>) -> Self {
        Self::primitive("code", PrimitiveValue::String(value.into()))
    }

    pub fn uri(value: impl Into<String>) -> Self {
        Self::primitive("uri", PrimitiveValue::String(value.into()))
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::primitive("id", PrimitiveValue::String(value.into()))
    }

    pub fn date(value: impl Into<String>) -> Self {
        Self::primitive("date", PrimitiveValue::String(value.into()))
    }

    pub fn date_time(value: impl Into<String>) -> Self {
        Self::primitive("dateTime", PrimitiveValue::String(value.into()))
    }

    pub fn instant(value: impl Into<String>) -> Self {
        Self::primitive("instant", PrimitiveValue::String(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        Self::primitive("boolean", PrimitiveValue::Boolean(value))
    }

    pub fn integer(value: i64) -> Self {
        Self::primitive("integer", PrimitiveValue::Integer(value))
    }

    pub fn decimal(value: Decimal) -> Self {
        Self::primitive("decimal", PrimitiveValue::Decimal(value))
    }

    pub fn resource(resource: Resource) -> Self {
        Value::Resource(Box::new(resource))
    }

    /// The datatype this value instantiates. Inline resources report their resource type.
    pub fn type_key(&self) -> TypeKey {
        match self {
            Value::Primitive(p) => p.type_key.clone(),
            Value::Element(e) => e.type_key.clone(),
            Value::Reference(r) => r.element.type_key.clone(),
            Value::Resource(r) => TypeKey::new(&r.resource_type),
        }
    }

    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Value::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Value::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Value::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Value::Resource(r) => Some(r),
            _ => None,
        }
    }

    /// String content of a string-like primitive.
    pub fn as_str(&self) -> Option<&str> {
        self.as_primitive()
            .and_then(|p| p.value.as_ref())
            .and_then(PrimitiveValue::as_str)
    }

    /// Extensions attached directly to this value.
    pub fn extensions(&self) -> &[Extension] {
        match self {
            Value::Primitive(p) => &p.extensions,
            Value::Element(e) => &e.extensions,
            Value::Reference(r) => &r.element.extensions,
            Value::Resource(r) => &r.body.extensions,
        }
    }
}

impl From<Element> for Value {
    fn from(element: Element) -> Self {
        Value::Element(element)
    }
}

impl From<Reference> for Value {
    fn from(reference: Reference) -> Self {
        Value::Reference(reference)
    }
}

impl From<Primitive> for Value {
    fn from(primitive: Primitive) -> Self {
        Value::Primitive(primitive)
    }
}

/// Typed content of a primitive.
///
/// Dates and times stay lexical so partial precision survives a round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
    /// Raw XHTML markup of a narrative `div`
    Xhtml(String),
}

impl PrimitiveValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrimitiveValue::String(s) | PrimitiveValue::Xhtml(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PrimitiveValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PrimitiveValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            PrimitiveValue::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Lexical form as it appears on the wire.
    pub fn to_lexical(&self) -> String {
        match self {
            PrimitiveValue::Boolean(b) => b.to_string(),
            PrimitiveValue::Integer(i) => i.to_string(),
            PrimitiveValue::Decimal(d) => d.to_string(),
            PrimitiveValue::String(s) | PrimitiveValue::Xhtml(s) => s.clone(),
        }
    }
}

/// A primitive value together with its element-level id and extensions.
///
/// `value` may be absent when the element only carries extensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub type_key: TypeKey,
    pub id: Option<String>,
    pub extensions: Vec<Extension>,
    pub value: Option<PrimitiveValue>,
}

impl Primitive {
    pub fn new(type_key: impl Into<TypeKey>, value: PrimitiveValue) -> Self {
        Self {
            type_key: type_key.into(),
            id: None,
            extensions: Vec::new(),
            value: Some(value),
        }
    }

    /// A primitive without a value, used for extension-only elements.
    pub fn empty(type_key: impl Into<TypeKey>) -> Self {
        Self {
            type_key: type_key.into(),
            id: None,
            extensions: Vec::new(),
            value: None,
        }
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }
}

/// An instance of a complex datatype, backbone element or resource body.
///
/// Children are stored by structural name. Declaration order is owned by the
/// registry, so encoders iterate the definition rather than this map.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub type_key: TypeKey,
    pub id: Option<String>,
    /// Extensions and modifier extensions, in insertion order
    pub extensions: Vec<Extension>,
    children: BTreeMap<String, Vec<Value>>,
}

impl Element {
    pub fn new(type_key: impl Into<TypeKey>) -> Self {
        Self {
            type_key: type_key.into(),
            id: None,
            extensions: Vec::new(),
            children: BTreeMap::new(),
        }
    }

    /// Builder form of [`Element::push`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Values of a child, empty when the child is absent.
    pub fn get(&self, name: &str) -> &[Value] {
        self.children.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<Value>> {
        self.children.get_mut(name)
    }

    pub fn first(&self, name: &str) -> Option<&Value> {
        self.get(name).first()
    }

    /// Append a value to a child (repeating children keep order).
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.children
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// Replace every value of a child with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.children.insert(name.into(), vec![value.into()]);
    }

    /// Remove a child and return its values.
    pub fn take(&mut self, name: &str) -> Vec<Value> {
        self.children.remove(name).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.children.get(name).is_some_and(|v| !v.is_empty())
    }

    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.children
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn children_mut(&mut self) -> impl Iterator<Item = (&str, &mut Vec<Value>)> {
        self.children
            .iter_mut()
            .map(|(name, values)| (name.as_str(), values))
    }

    /// True when the element carries no id, no extensions and no children.
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.extensions.is_empty()
            && self.children.values().all(Vec::is_empty)
    }

    /// Non-modifier extensions with the given URL.
    pub fn extensions_by_url<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a Extension> {
        self.extensions
            .iter()
            .filter(move |e| !e.modifier && e.url == url)
    }

    pub fn modifier_extensions(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.iter().filter(|e| e.modifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn push_keeps_order_and_set_replaces() {
        let mut name = Element::new("HumanName");
        name.push("given", Value::string("Joe"));
        name.push("given", Value::string("Shmoe"));
        assert_eq!(name.get("given").len(), 2);
        assert_eq!(name.get("given")[1].as_str(), Some("Shmoe"));

        name.set("given", Value::string("Only"));
        assert_eq!(name.get("given").len(), 1);
        assert_eq!(name.first("given").and_then(Value::as_str), Some("Only"));
    }

    #[test]
    fn decimal_lexical_keeps_scale() {
        let d = Decimal::from_str("1.50").unwrap();
        assert_eq!(PrimitiveValue::Decimal(d).to_lexical(), "1.50");
    }

    #[test]
    fn empty_element_detection() {
        let mut e = Element::new("Coding");
        assert!(e.is_empty());
        e.push("code", Value::code("x"));
        assert!(!e.is_empty());
        e.take("code");
        assert!(e.is_empty());
    }
}
