//! Side-table mapping
//!
//! `meta` and the `search`/`request` annotations of Bundle entries are reserved wire
//! names: their content lives in [`ResourceMetadata`], not in the resource body. These
//! helpers convert between the side-table and the elements the encoder and decoder
//! handle.

use crate::issue::IssueKind;
use ferrum_context::Registry;
use ferrum_models::{
    Coding, Element, HttpVerb, PrimitiveValue, ResourceMetadata, SearchEntryMode, TypeKey, Value,
};

pub(crate) const META_TYPE: &str = "Meta";
pub(crate) const ENTRY_TYPE: &str = "Bundle.entry";
const ENTRY_SEARCH_TYPE: &str = "Bundle.entry.search";
const ENTRY_REQUEST_TYPE: &str = "Bundle.entry.request";
const CODING_TYPE: &str = "Coding";

/// Build the `meta` element from the side-table, `None` when no meta key is set.
pub(crate) fn meta_element(registry: &Registry, meta: &ResourceMetadata) -> Option<Element> {
    if !meta.has_meta_block() {
        return None;
    }

    // profile is `uri` in DSTU2 and `canonical` in R4
    let definition = registry.lookup_by_name(META_TYPE);
    let type_of = |child: &str, fallback: &str| {
        definition
            .and_then(|d| d.child(child))
            .and_then(|c| c.types().first().cloned())
            .unwrap_or_else(|| TypeKey::new(fallback))
    };
    let text = |child: &str, fallback: &str, value: &str| {
        Value::primitive(type_of(child, fallback), PrimitiveValue::String(value.to_string()))
    };

    let mut element = Element::new(
        definition.map_or_else(|| TypeKey::new(META_TYPE), |d| d.type_key().clone()),
    );
    if let Some(version_id) = meta.version_id() {
        element.set("versionId", text("versionId", "id", version_id));
    }
    if let Some(last_updated) = meta.last_updated() {
        element.set("lastUpdated", text("lastUpdated", "instant", last_updated));
    }
    if let Some(source) = meta.source() {
        element.set("source", text("source", "uri", source));
    }
    for profile in meta.profiles() {
        element.push("profile", text("profile", "uri", profile));
    }
    for label in meta.security_labels() {
        element.push("security", coding_element(label));
    }
    for tag in meta.tags() {
        element.push("tag", coding_element(tag));
    }
    Some(element)
}

/// Move a decoded `meta` element into the side-table.
///
/// Returns the names of children the side-table has no key for; they are dropped.
pub(crate) fn absorb_meta(element: &Element, meta: &mut ResourceMetadata) -> Vec<String> {
    let mut dropped = Vec::new();
    if element.id.is_some() {
        dropped.push("id".to_string());
    }
    if !element.extensions.is_empty() {
        dropped.push("extension".to_string());
    }

    for (name, values) in element.children() {
        for value in values {
            match name {
                "versionId" => {
                    if let Some(v) = value.as_str() {
                        meta.set_version_id(v);
                    }
                }
                "lastUpdated" => {
                    if let Some(v) = value.as_str() {
                        meta.set_last_updated(v);
                    }
                }
                "source" => {
                    if let Some(v) = value.as_str() {
                        meta.set_source(v);
                    }
                }
                "profile" => {
                    if let Some(v) = value.as_str() {
                        meta.add_profile(v);
                    }
                }
                "security" => {
                    if let Some(e) = value.as_element() {
                        meta.add_security_label(coding_from(e));
                    }
                }
                "tag" => {
                    if let Some(e) = value.as_element() {
                        meta.add_tag(coding_from(e));
                    }
                }
                other => dropped.push(other.to_string()),
            }
        }
    }
    dropped
}

fn coding_element(coding: &Coding) -> Element {
    let mut element = Element::new(CODING_TYPE);
    if let Some(system) = &coding.system {
        element.set("system", Value::uri(system));
    }
    if let Some(version) = &coding.version {
        element.set("version", Value::string(version));
    }
    if let Some(code) = &coding.code {
        element.set("code", Value::code(code));
    }
    if let Some(display) = &coding.display {
        element.set("display", Value::string(display));
    }
    if let Some(selected) = coding.user_selected {
        element.set("userSelected", Value::boolean(selected));
    }
    element
}

fn coding_from(element: &Element) -> Coding {
    let text = |name: &str| element.first(name).and_then(Value::as_str).map(str::to_string);
    Coding {
        system: text("system"),
        version: text("version"),
        code: text("code"),
        display: text("display"),
        user_selected: element
            .first("userSelected")
            .and_then(Value::as_primitive)
            .and_then(|p| p.value.as_ref())
            .and_then(PrimitiveValue::as_bool),
    }
}

fn first_element_mut<'a>(element: &'a mut Element, name: &str) -> Option<&'a mut Element> {
    element
        .get_mut(name)
        .and_then(|values| values.first_mut())
        .and_then(Value::as_element_mut)
}

fn take_element(element: &mut Element, name: &str, type_key: &str) -> Element {
    match element.take(name).into_iter().next() {
        Some(Value::Element(e)) => e,
        _ => Element::new(type_key),
    }
}

/// Move `search` and `request` annotations of a decoded Bundle entry into its resource's
/// side-table. Entries without a resource keep them in the body.
pub(crate) fn absorb_entry_annotations(entry: &mut Element) -> Vec<(IssueKind, String)> {
    let mut problems = Vec::new();
    if entry.first("resource").and_then(Value::as_resource).is_none() {
        return problems;
    }

    let mut annotations = ResourceMetadata::default();
    if let Some(search) = first_element_mut(entry, "search") {
        if let Some(code) = search.first("mode").and_then(Value::as_str) {
            match SearchEntryMode::from_code(code) {
                Ok(mode) => {
                    annotations.set_search_mode(mode);
                    search.take("mode");
                }
                Err(e) => problems.push((IssueKind::InvalidMetadata, e.to_string())),
            }
        }
        let score = search
            .first("score")
            .and_then(Value::as_primitive)
            .and_then(|p| p.value.as_ref())
            .and_then(PrimitiveValue::as_decimal);
        if let Some(score) = score {
            annotations.set_search_score(score);
            search.take("score");
        }
    }
    if let Some(request) = first_element_mut(entry, "request") {
        if let Some(code) = request.first("method").and_then(Value::as_str) {
            match HttpVerb::from_code(code) {
                Ok(method) => {
                    annotations.set_transaction_method(method);
                    request.take("method");
                }
                Err(e) => problems.push((IssueKind::InvalidMetadata, e.to_string())),
            }
        }
        if let Some(url) = request.first("url").and_then(Value::as_str) {
            annotations.set_link_search(url);
            request.take("url");
        }
    }

    for name in ["search", "request"] {
        if first_element_mut(entry, name).is_some_and(|e| e.is_empty()) {
            entry.take(name);
        }
    }

    if let Some(Value::Resource(resource)) = entry.get_mut("resource").and_then(|v| v.first_mut())
    {
        for (key, value) in annotations.iter() {
            resource.meta.insert(key, value.clone());
        }
    }
    problems
}

/// A copy of a Bundle entry with its resource's annotations written back into
/// `search` and `request`; `None` when there is nothing to add.
pub(crate) fn with_entry_annotations(entry: &Element) -> Option<Element> {
    let meta = &entry.first("resource")?.as_resource()?.meta;
    if !meta.has_entry_annotations() {
        return None;
    }

    let mut entry = entry.clone();
    if meta.search_mode().is_some() || meta.search_score().is_some() {
        let mut search = take_element(&mut entry, "search", ENTRY_SEARCH_TYPE);
        if let Some(mode) = meta.search_mode() {
            search.set("mode", Value::code(mode.code()));
        }
        if let Some(score) = meta.search_score() {
            search.set("score", Value::decimal(score));
        }
        entry.set("search", search);
    }
    if meta.transaction_method().is_some() || meta.link_search().is_some() {
        let mut request = take_element(&mut entry, "request", ENTRY_REQUEST_TYPE);
        if let Some(method) = meta.transaction_method() {
            request.set("method", Value::code(method.code()));
        }
        if let Some(url) = meta.link_search() {
            request.set("url", Value::uri(url));
        }
        entry.set("request", request);
    }
    Some(entry)
}
