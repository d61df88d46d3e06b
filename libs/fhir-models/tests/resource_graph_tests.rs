use ferrum_models::{
    Coding, ContainedResources, Element, Error, Extension, ExtensionItem, HttpVerb, LocalId,
    MetadataKey, Reference, Resource, ResourceLink, SearchEntryMode, Value,
};
use std::sync::Arc;

fn practitioner(family: &str) -> Arc<Resource> {
    let mut r = Resource::new("Practitioner");
    r.body.push(
        "name",
        Element::new("HumanName").with("family", Value::string(family)),
    );
    Arc::new(r)
}

// ============================================================================
// Contained Sets
// ============================================================================

#[test]
fn test_contained_membership_is_by_identity() {
    let a = practitioner("Same");
    let b = practitioner("Same");
    assert_eq!(a, b);

    let mut set = ContainedResources::default();
    set.push(LocalId::new("1"), a.clone())
        .unwrap_or_else(|e| panic!("push failed: {}", e));

    assert_eq!(set.find_by_identity(&a), Some(&LocalId::new("1")));
    assert_eq!(set.find_by_identity(&b), None);
    assert_eq!(
        set.push(LocalId::new("1"), b.clone()),
        Err(Error::DuplicateLocalId("1".into()))
    );

    set.push(set.next_free_id(), b.clone())
        .unwrap_or_else(|e| panic!("push failed: {}", e));
    assert_eq!(set.find_by_identity(&b), Some(&LocalId::new("2")));
    assert_eq!(set.len(), 2);
}

#[test]
fn test_next_free_id_skips_taken_numbers() {
    let mut set = ContainedResources::default();
    for token in ["1", "2", "abc", "4"] {
        set.push(LocalId::new(token), practitioner(token))
            .unwrap_or_else(|e| panic!("push failed: {}", e));
    }
    assert_eq!(set.next_free_id(), LocalId::new("3"));

    set.clear();
    assert!(set.is_empty());
    assert_eq!(set.next_free_id(), LocalId::new("1"));
}

#[test]
fn test_local_id_parsing() {
    assert_eq!(LocalId::parse("#7"), Some(LocalId::new("7")));
    assert_eq!(LocalId::parse("#"), None);
    assert_eq!(LocalId::parse("Patient/7"), None);
    assert_eq!(LocalId::new("7").to_string(), "#7");
    assert_eq!(LocalId::new("7").to_reference(), "#7");

    assert_eq!(
        Resource::new("Organization").with_id("#333").requested_local_id(),
        Some(LocalId::new("333"))
    );
    assert_eq!(Resource::new("Organization").with_id("333").requested_local_id(), None);
}

// ============================================================================
// Reference Resolution
// ============================================================================

#[test]
fn test_resolve_follows_links_and_local_strings() {
    let doctor = practitioner("Who");
    let mut patient = Resource::new("Patient");
    patient
        .contained
        .push(LocalId::new("7"), doctor.clone())
        .unwrap_or_else(|e| panic!("push failed: {}", e));

    let linked = Reference {
        element: Reference::new("#7").element,
        target: Some(ResourceLink::Contained(LocalId::new("7"))),
    };
    let by_string = Reference::new("#7");
    let in_memory = Reference::to_resource(doctor.clone());
    let remote = Reference::new("Practitioner/7");
    let dangling = Reference::new("#8");

    for reference in [&linked, &by_string, &in_memory] {
        let target = patient
            .resolve(reference)
            .unwrap_or_else(|| panic!("{:?} does not resolve", reference.reference()));
        assert!(Arc::ptr_eq(target, &doctor));
    }
    assert!(patient.resolve(&remote).is_none());
    assert!(patient.resolve(&dangling).is_none());
}

// ============================================================================
// Extensions On Elements
// ============================================================================

#[test]
fn test_extensions_by_url_skip_modifiers() {
    let name = Element::new("HumanName")
        .with_extension(Extension::new("u").with_value(Value::string("a")))
        .with_extension(Extension::modifier("u").with_value(Value::boolean(true)))
        .with_extension(Extension::new("other"))
        .with_extension(Extension::new("u").with_value(Value::string("b")));

    let values: Vec<_> = name
        .extensions_by_url("u")
        .filter_map(|e| e.value().and_then(Value::as_str))
        .collect();
    assert_eq!(values, vec!["a", "b"]);
    assert_eq!(name.modifier_extensions().count(), 1);
}

#[test]
fn test_add_switches_between_value_and_nested() {
    let mut ext = Extension::new("u");
    ext.add(Value::string("first"));
    ext.add(Value::string("second"));
    assert_eq!(ext.values(), vec![ExtensionItem::Value(&Value::string("second"))]);

    ext.add(Extension::new("child"));
    assert!(ext.value().is_none());
    assert_eq!(ext.nested().len(), 1);

    ext.add(Value::integer(3));
    assert!(ext.nested().is_empty());
    assert_eq!(ext.value(), Some(&Value::integer(3)));
}

// ============================================================================
// Metadata Side-Table
// ============================================================================

#[test]
fn test_metadata_separates_meta_from_entry_annotations() {
    let mut meta = Resource::new("Patient").meta;
    assert!(meta.is_empty());

    meta.set_search_mode(SearchEntryMode::Include);
    meta.set_transaction_method(HttpVerb::Put);
    assert!(!meta.has_meta_block());
    assert!(meta.has_entry_annotations());

    meta.add_tag(Coding::new("urn:tags", "t1"));
    assert!(meta.has_meta_block());
    assert!(meta.contains(MetadataKey::Tags));

    assert!(meta.remove(MetadataKey::EntrySearchMode).is_some());
    assert_eq!(meta.search_mode(), None);
    assert_eq!(meta.transaction_method(), Some(HttpVerb::Put));
}

#[test]
fn test_annotation_codes() {
    assert_eq!(SearchEntryMode::from_code("match"), Ok(SearchEntryMode::Match));
    assert_eq!(SearchEntryMode::Outcome.code(), "outcome");
    assert!(SearchEntryMode::from_code("MATCH").is_err());

    assert_eq!(HttpVerb::from_code("PATCH"), Ok(HttpVerb::Patch));
    assert_eq!(HttpVerb::Delete.code(), "DELETE");
    assert!(HttpVerb::from_code("FETCH").is_err());
}
