//! Catalogs derived from StructureDefinition resources
//!
//! Reads the snapshot (or differential) of each definition and records only the
//! elements a type introduces itself; inherited elements come back through the base
//! chain when the registry is built.

use super::{CatalogBuilder, ChildDecl, Max, PrimitiveKind, TypeCatalog, TypeKind};
use crate::error::{ConfigurationError, Result};
use crate::version::FhirVersion;
use ferrum_models::TypeKey;
use serde_json::Value;

const FHIR_TYPE_EXTENSION: &str =
    "http://hl7.org/fhir/StructureDefinition/structuredefinition-fhir-type";
const SYSTEM_TYPE_PREFIX: &str = "http://hl7.org/fhirpath/System.";

pub(super) fn catalog(version: FhirVersion, definitions: &[Value]) -> Result<TypeCatalog> {
    let mut builder = TypeCatalog::builder(version);
    for sd in definitions {
        if sd.get("resourceType").and_then(Value::as_str) != Some("StructureDefinition") {
            continue;
        }
        parse_structure_definition(&mut builder, sd)?;
    }
    builder.build()
}

fn invalid(msg: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidStructureDefinition(msg.into())
}

fn parse_structure_definition(builder: &mut CatalogBuilder, sd: &Value) -> Result<()> {
    let name = sd
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("StructureDefinition missing 'name'"))?;
    let type_name = sd.get("type").and_then(Value::as_str).unwrap_or(name);
    let derivation = sd.get("derivation").and_then(Value::as_str);

    let kind = match sd.get("kind").and_then(Value::as_str) {
        Some("primitive-type") => TypeKind::Primitive(PrimitiveKind::for_name(type_name)),
        Some("complex-type") => match type_name {
            "Extension" => TypeKind::Extension,
            "Reference" | "ResourceReference" => TypeKind::Reference,
            _ => TypeKind::Complex,
        },
        Some("resource") => TypeKind::Resource,
        // Logical models have no wire representation
        Some("logical") => return Ok(()),
        other => return Err(invalid(format!("{}: unknown kind {:?}", name, other))),
    };

    let is_abstract = sd.get("abstract").and_then(Value::as_bool).unwrap_or(false);

    if derivation == Some("constraint") {
        // Profiles narrow their type and share its children
        builder.descriptor(name, name, kind).specialization(type_name);
        return Ok(());
    }

    let base = sd
        .get("baseDefinition")
        .and_then(Value::as_str)
        .map(extract_type_name_from_url)
        .filter(|b| b != "Base");

    let (children, backbones) = match kind {
        TypeKind::Primitive(_) | TypeKind::Extension => (Vec::new(), Vec::new()),
        _ => {
            let elements = sd
                .get("snapshot")
                .or_else(|| sd.get("differential"))
                .and_then(|s| s.get("element"))
                .and_then(Value::as_array)
                .ok_or_else(|| invalid(format!("{}: no snapshot or differential", name)))?;
            parse_elements(elements, type_name, kind)?
        }
    };

    let mut d = builder.descriptor(type_name, type_name, kind);
    d = match base {
        Some(base) => d.base(&base),
        None => d.no_base(),
    };
    if is_abstract {
        d = d.abstract_type();
    }
    for child in children {
        d = d.with_child(child);
    }

    for backbone in backbones {
        let mut d = builder
            .descriptor(backbone.path.as_str(), &backbone.path, TypeKind::Backbone)
            .base(&backbone.base);
        for child in backbone.children {
            d = d.with_child(child);
        }
    }
    Ok(())
}

struct Backbone {
    path: String,
    base: String,
    children: Vec<ChildDecl>,
}

/// Split the elements a type introduces into its direct children and backbone types.
fn parse_elements(
    elements: &[Value],
    type_name: &str,
    kind: TypeKind,
) -> Result<(Vec<ChildDecl>, Vec<Backbone>)> {
    let mut children = Vec::new();
    let mut backbones: Vec<Backbone> = Vec::new();

    for element in elements.iter().skip(1) {
        let path = element
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(format!("{}: element missing 'path'", type_name)))?;

        if !introduced_here(element, type_name) {
            continue;
        }

        let Some((owner, name)) = path.rsplit_once('.') else {
            continue;
        };

        // Element ids are attributes, not children
        if name == "id" && !(owner == type_name && kind == TypeKind::Resource) {
            continue;
        }

        let decl = parse_element(element, path, name)?;

        if decl.types.iter().any(|t| t.as_str() == path) {
            let base = element
                .get("type")
                .and_then(Value::as_array)
                .and_then(|t| t.first())
                .and_then(|t| t.get("code"))
                .and_then(Value::as_str)
                .unwrap_or("BackboneElement")
                .to_string();
            backbones.push(Backbone {
                path: path.to_string(),
                base,
                children: Vec::new(),
            });
        }

        if owner == type_name {
            children.push(decl);
        } else if let Some(bb) = backbones.iter_mut().find(|b| b.path == owner) {
            bb.children.push(decl);
        } else {
            return Err(invalid(format!("{}: element before its parent", path)));
        }
    }

    Ok((children, backbones))
}

/// True when the element is declared by this type rather than inherited.
fn introduced_here(element: &Value, type_name: &str) -> bool {
    match element
        .get("base")
        .and_then(|b| b.get("path"))
        .and_then(Value::as_str)
    {
        Some(base_path) => base_path.split('.').next() == Some(type_name),
        None => true,
    }
}

fn parse_element(element: &Value, path: &str, name: &str) -> Result<ChildDecl> {
    let min = match element.get("min").and_then(Value::as_u64) {
        Some(m) => u32::try_from(m).map_err(|_| invalid(format!("{}: bad min {}", path, m)))?,
        None => 0,
    };
    let max = match element.get("max").and_then(Value::as_str) {
        Some(m) => Max::parse(m).ok_or_else(|| invalid(format!("{}: bad max {}", path, m)))?,
        None => Max::Bounded(1),
    };

    let types = if let Some(reference) = element.get("contentReference").and_then(Value::as_str) {
        // `#Questionnaire.item` or `http://...#Questionnaire.item`
        let target = reference.rsplit_once('#').map_or(reference, |(_, t)| t);
        vec![TypeKey::new(target)]
    } else {
        element
            .get("type")
            .and_then(Value::as_array)
            .map(|types| types.iter().filter_map(|t| element_type(t, path)).collect())
            .unwrap_or_default()
    };

    Ok(ChildDecl {
        name: name.to_string(),
        min,
        max,
        types,
    })
}

fn element_type(type_spec: &Value, path: &str) -> Option<TypeKey> {
    let code = type_spec.get("code").and_then(Value::as_str)?;

    if code == "BackboneElement" || code == "Element" {
        return Some(TypeKey::new(path));
    }

    if let Some(system) = code.strip_prefix(SYSTEM_TYPE_PREFIX) {
        let declared = type_spec
            .get("extension")
            .and_then(Value::as_array)
            .and_then(|exts| {
                exts.iter().find(|e| {
                    e.get("url").and_then(Value::as_str) == Some(FHIR_TYPE_EXTENSION)
                })
            })
            .and_then(|e| e.get("valueUrl").or_else(|| e.get("valueUri")))
            .and_then(Value::as_str);
        return Some(TypeKey::new(declared.unwrap_or(system_type(system))));
    }

    Some(TypeKey::new(code))
}

fn system_type(system: &str) -> &'static str {
    match system {
        "Boolean" => "boolean",
        "Integer" => "integer",
        "Decimal" => "decimal",
        "Date" => "date",
        "DateTime" => "dateTime",
        "Time" => "time",
        _ => "string",
    }
}

/// Extract the type name from a canonical URL
/// E.g., "http://hl7.org/fhir/StructureDefinition/Patient" -> "Patient"
fn extract_type_name_from_url(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}
