//! JSON reader and writer
//!
//! Follows the FHIR JSON rules:
//! - Every resource object carries its type in `resourceType`.
//! - Repeating children are arrays, even with one item.
//! - A primitive's id and extensions travel in a `_name` companion, aligned by index
//!   for arrays.

use crate::error::{FormatError, Result, StructureError};
use crate::tree::{Scalar, Shape, WireNode};
use serde_json::{Map, Number, Value};

fn is_extension_name(name: &str) -> bool {
    name == "extension" || name == "modifierExtension"
}

/// Parse a document into its wire tree.
pub fn read(input: &str) -> std::result::Result<WireNode, StructureError> {
    let value: Value = serde_json::from_str(input)?;
    let obj = value.as_object().ok_or(StructureError::ExpectedObject)?;
    read_resource(obj)
}

fn read_resource(obj: &Map<String, Value>) -> std::result::Result<WireNode, StructureError> {
    let resource_type = obj
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or(StructureError::MissingResourceType)?;
    let mut node = WireNode::resource(resource_type);
    read_properties(obj, &mut node, false)?;
    Ok(node)
}

fn read_properties(
    obj: &Map<String, Value>,
    node: &mut WireNode,
    in_extension: bool,
) -> std::result::Result<(), StructureError> {
    for (key, value) in obj {
        if node.shape == Shape::Resource {
            if key == "resourceType" {
                continue;
            }
        } else {
            match key.as_str() {
                "id" => {
                    node.id = Some(scalar_text(value));
                    continue;
                }
                "url" if in_extension => {
                    node.url = Some(scalar_text(value));
                    continue;
                }
                _ => {}
            }
        }

        if let Some(base) = key.strip_prefix('_') {
            // Merged into the base property when that one exists
            if !obj.contains_key(base) {
                node.children
                    .extend(read_property(base, &Value::Null, Some(value))?);
            }
            continue;
        }
        let companion = obj.get(&format!("_{}", key));
        node.children.extend(read_property(key, value, companion)?);
    }
    Ok(())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn read_property(
    name: &str,
    value: &Value,
    companion: Option<&Value>,
) -> std::result::Result<Vec<WireNode>, StructureError> {
    let companions = companion.and_then(Value::as_array);
    let items = match value {
        Value::Array(items) => Some(items.as_slice()),
        Value::Null if companions.is_some() => Some(&[][..]),
        _ => None,
    };

    let Some(items) = items else {
        return Ok(read_item(name, value, companion)?.into_iter().collect());
    };

    let len = items.len().max(companions.map_or(0, Vec::len));
    let mut nodes = Vec::with_capacity(len);
    for i in 0..len {
        let item = items.get(i).unwrap_or(&Value::Null);
        let item_companion = companions.and_then(|c| c.get(i));
        if let Some(node) = read_item(name, item, item_companion)? {
            nodes.push(node.repeating(true));
        }
    }
    Ok(nodes)
}

fn read_item(
    name: &str,
    value: &Value,
    companion: Option<&Value>,
) -> std::result::Result<Option<WireNode>, StructureError> {
    let companion = companion.and_then(Value::as_object);
    let scalar = match value {
        Value::Object(obj) if obj.contains_key("resourceType") => {
            return Ok(Some(WireNode::wrapper(name, read_resource(obj)?)));
        }
        Value::Object(obj) => {
            let mut node = WireNode::complex(name);
            read_properties(obj, &mut node, is_extension_name(name))?;
            return Ok(Some(node));
        }
        Value::Array(_) => return Err(StructureError::NestedArray(name.to_string())),
        Value::Null if companion.is_none() => return Ok(None),
        Value::Null => None,
        Value::Bool(b) => Some(Scalar::Boolean(*b)),
        Value::Number(n) => Some(Scalar::Number(n.to_string())),
        Value::String(s) => Some(Scalar::Text(s.clone())),
    };

    let mut node = WireNode::primitive(name, scalar);
    if let Some(companion) = companion {
        for (key, value) in companion {
            if key == "id" {
                node.id = Some(scalar_text(value));
            } else {
                node.children.extend(read_property(key, value, None)?);
            }
        }
    }
    Ok(Some(node))
}

/// Serialize a wire tree rooted at a resource.
pub fn write(root: &WireNode, pretty: bool) -> Result<String> {
    let value = Value::Object(resource_object(root));
    let text = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    text.map_err(FormatError::JsonWrite)
}

fn resource_object(node: &WireNode) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("resourceType".into(), Value::String(node.name.clone()));
    write_children(&mut map, &node.children);
    map
}

fn element_object(node: &WireNode) -> Map<String, Value> {
    let mut map = Map::new();
    if let Some(id) = &node.id {
        map.insert("id".into(), Value::String(id.clone()));
    }
    if let Some(url) = &node.url {
        map.insert("url".into(), Value::String(url.clone()));
    }
    write_children(&mut map, &node.children);
    map
}

fn write_children(map: &mut Map<String, Value>, children: &[WireNode]) {
    // Same-named siblings form one property, at the position of the first
    let mut groups: Vec<(&str, Vec<&WireNode>)> = Vec::new();
    for child in children {
        match groups.iter_mut().find(|(name, _)| *name == child.name) {
            Some((_, nodes)) => nodes.push(child),
            None => groups.push((&child.name, vec![child])),
        }
    }

    for (name, nodes) in groups {
        let array = nodes.len() > 1 || nodes.iter().any(|n| n.repeats);
        let (mut mains, mut companions): (Vec<Value>, Vec<Value>) =
            nodes.iter().map(|n| property_values(n)).unzip();
        let has_main = mains.iter().any(|v| !v.is_null());
        let has_companion = companions.iter().any(|v| !v.is_null());

        if array {
            if has_main {
                map.insert(name.to_string(), Value::Array(mains));
            }
            if has_companion {
                map.insert(format!("_{}", name), Value::Array(companions));
            }
        } else {
            if has_main {
                map.insert(name.to_string(), mains.swap_remove(0));
            }
            if has_companion {
                map.insert(format!("_{}", name), companions.swap_remove(0));
            }
        }
    }
}

/// The property value of a node and its `_name` companion (`null` when absent).
fn property_values(node: &WireNode) -> (Value, Value) {
    if let Some(resource) = node.wrapped_resource() {
        return (Value::Object(resource_object(resource)), Value::Null);
    }
    if !node.is_primitive() && node.xhtml.is_none() {
        return (Value::Object(element_object(node)), Value::Null);
    }

    let main = match (&node.xhtml, &node.value) {
        (Some(markup), _) => Value::String(markup.clone()),
        (None, Some(Scalar::Text(s))) => Value::String(s.clone()),
        (None, Some(Scalar::Boolean(b))) => Value::Bool(*b),
        (None, Some(Scalar::Number(n))) => number_value(n),
        (None, None) => Value::Null,
    };

    let mut companion = Map::new();
    if let Some(id) = &node.id {
        companion.insert("id".into(), Value::String(id.clone()));
    }
    write_children(&mut companion, &node.children);
    let companion = if companion.is_empty() {
        Value::Null
    } else {
        Value::Object(companion)
    };
    (main, companion)
}

fn number_value(lexical: &str) -> Value {
    lexical
        .parse::<Number>()
        .map(Value::Number)
        .unwrap_or_else(|_| Value::String(lexical.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn companions_align_with_arrays() {
        let json = r#"{
            "resourceType": "Patient",
            "name": [{ "given": ["Adam", null], "_given": [null, { "id": "g2", "extension": [{ "url": "u", "valueCode": "x" }] }] }]
        }"#;
        let root = read(json).unwrap();
        let name = root.child("name").unwrap();
        assert!(name.repeats);

        let given: Vec<_> = name.children_named("given").collect();
        assert_eq!(given.len(), 2);
        assert_eq!(given[0].value, Some(Scalar::Text("Adam".into())));
        assert_eq!(given[1].value, None);
        assert_eq!(given[1].id.as_deref(), Some("g2"));

        let ext = given[1].child("extension").unwrap();
        assert_eq!(ext.url.as_deref(), Some("u"));
        assert!(ext.child("url").is_none());
    }

    #[test]
    fn companion_without_value() {
        let json = r#"{ "resourceType": "Patient", "_birthDate": { "id": "bd1" } }"#;
        let root = read(json).unwrap();
        let birth_date = root.child("birthDate").unwrap();
        assert_eq!(birth_date.id.as_deref(), Some("bd1"));
        assert!(birth_date.value.is_none());
    }

    #[test]
    fn url_is_a_child_outside_extensions() {
        let json = r#"{ "resourceType": "Bundle", "link": [{ "relation": "self", "url": "http://x" }] }"#;
        let root = read(json).unwrap();
        let link = root.child("link").unwrap();
        assert!(link.url.is_none());
        assert_eq!(
            link.child("url").and_then(|u| u.value.clone()),
            Some(Scalar::Text("http://x".into()))
        );
    }

    #[test]
    fn writes_companions_and_keeps_number_literals() {
        let mut root = WireNode::resource("Observation");
        let mut given = WireNode::primitive("given", None).repeating(true);
        given.id = Some("g1".into());
        root.children.push(given);
        root.children.push(
            WireNode::primitive("given", Some(Scalar::Text("B".into()))).repeating(true),
        );
        root.children.push(WireNode::primitive(
            "score",
            Some(Scalar::Number("1.50".into())),
        ));

        let out = write(&root, false).unwrap();
        assert_eq!(
            out,
            r#"{"resourceType":"Observation","given":[null,"B"],"_given":[{"id":"g1"},null],"score":1.50}"#
        );
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(read("[1, 2]"), Err(StructureError::ExpectedObject)));
        assert!(matches!(read("{}"), Err(StructureError::MissingResourceType)));
        assert!(matches!(read("{"), Err(StructureError::MalformedJson(_))));
    }
}
