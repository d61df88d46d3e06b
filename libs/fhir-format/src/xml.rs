//! XML reader and writer
//!
//! Reading goes through `roxmltree`, writing through `quick-xml`. Primitive values live
//! in `value` attributes, element ids and extension URLs in `id` and `url` attributes,
//! and the FHIR namespace is declared on the outermost element only.

use crate::error::{Result, StructureError};
use crate::tree::{Scalar, Shape, WireNode};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::Document;

pub const FHIR_NS: &str = "http://hl7.org/fhir";
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Parse a document into its wire tree.
pub fn read(input: &str) -> std::result::Result<WireNode, StructureError> {
    let doc = Document::parse(input)?;
    Ok(read_element(input, doc.root_element()))
}

fn read_element(source: &str, node: roxmltree::Node<'_, '_>) -> WireNode {
    let name = node.tag_name().name();

    // Narrative markup is carried verbatim
    if node.tag_name().namespace() == Some(XHTML_NS) {
        let mut div = WireNode::primitive(name, None);
        div.xhtml = Some(source[node.range()].to_string());
        return div;
    }

    let mut wire = if name.starts_with(|c: char| c.is_ascii_uppercase()) {
        WireNode::resource(name)
    } else if node.has_attribute("value") {
        WireNode::primitive(name, None)
    } else {
        WireNode::complex(name)
    };
    wire.id = node.attribute("id").map(str::to_string);
    wire.url = node.attribute("url").map(str::to_string);
    wire.value = node
        .attribute("value")
        .map(|v| Scalar::Text(v.to_string()));
    wire.children = node
        .children()
        .filter(|c| c.is_element())
        .map(|c| read_element(source, c))
        .collect();
    wire
}

/// Serialize a wire tree rooted at a resource.
pub fn write(root: &WireNode, pretty: bool, declaration: bool) -> Result<String> {
    let mut writer = if pretty {
        Writer::new_with_indent(Vec::new(), b' ', 2)
    } else {
        Writer::new(Vec::new())
    };
    if declaration {
        emit(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
    }
    write_node(&mut writer, root, true)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(quick_xml::Error::from)?;
    Ok(())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &WireNode, root: bool) -> Result<()> {
    if let Some(raw) = &node.xhtml {
        return emit(writer, Event::Text(BytesText::from_escaped(raw.as_str())));
    }

    let mut start = BytesStart::new(node.name.as_str());
    if root {
        start.push_attribute(("xmlns", FHIR_NS));
    }
    if let Some(id) = &node.id {
        // A resource's id is a child element, never an attribute
        if node.shape != Shape::Resource {
            start.push_attribute(("id", id.as_str()));
        }
    }
    if let Some(url) = &node.url {
        start.push_attribute(("url", url.as_str()));
    }
    if let Some(value) = &node.value {
        start.push_attribute(("value", value.lexical().as_str()));
    }

    if node.children.is_empty() {
        return emit(writer, Event::Empty(start));
    }
    emit(writer, Event::Start(start))?;
    for child in &node.children {
        write_node(writer, child, false)?;
    }
    emit(writer, Event::End(BytesEnd::new(node.name.as_str())))
}
