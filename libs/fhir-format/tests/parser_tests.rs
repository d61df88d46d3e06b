use ferrum_context::{FhirVersion, Registry, RegistryCache, TypeCatalog};
use ferrum_format::{
    ContainmentError, FhirParser, FormatError, IssueKind, ParserOptions, StructureError,
    WireFormat,
};
use ferrum_models::{
    Coding, Element, Extension, HttpVerb, LocalId, PrimitiveValue, Reference, Resource,
    ResourceLink, SearchEntryMode, Value,
};
use quickcheck::{QuickCheck, TestResult};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::{Arc, OnceLock};

fn parser() -> &'static FhirParser {
    static PARSER: OnceLock<FhirParser> = OnceLock::new();
    PARSER.get_or_init(|| {
        FhirParser::for_version(FhirVersion::R4).unwrap_or_else(|e| panic!("registry failed: {}", e))
    })
}

fn encode(resource: &mut Resource, format: WireFormat) -> String {
    parser()
        .encode(resource, format, false)
        .unwrap_or_else(|e| panic!("encode failed: {}", e))
}

fn decode(text: &str, format: WireFormat) -> Resource {
    let decoded = parser()
        .decode(text, format, "Resource")
        .unwrap_or_else(|e| panic!("decode failed: {}", e));
    assert!(decoded.issues.is_empty(), "unexpected issues: {:?}", decoded.issues);
    decoded.resource
}

fn json_value(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or_else(|e| panic!("invalid JSON output: {}", e))
}

fn xhtml(div: &str) -> Value {
    Value::primitive("xhtml", PrimitiveValue::Xhtml(div.to_string()))
}

fn narrative(text: &str) -> Element {
    Element::new("Narrative")
        .with("status", Value::code("generated"))
        .with(
            "div",
            xhtml(&format!(r#"<div xmlns="http://www.w3.org/1999/xhtml">{}</div>"#, text)),
        )
}

// ============================================================================
// Extensions
// ============================================================================

fn patient_with_nested_extensions() -> Resource {
    let mut patient = Resource::new("Patient");
    patient
        .body
        .extensions
        .push(Extension::new("u1").with_value(Value::string("v1")));
    patient.body.extensions.push(
        Extension::new("u2")
            .with_nested(Extension::new("u3").with_value(Value::string("a")))
            .with_nested(Extension::new("u3").with_value(Value::string("b"))),
    );
    patient
}

#[test]
fn test_nested_extensions_encode_to_xml() {
    let mut patient = patient_with_nested_extensions();
    let xml = encode(&mut patient, WireFormat::Xml);
    assert_eq!(
        xml,
        concat!(
            r#"<Patient xmlns="http://hl7.org/fhir">"#,
            r#"<extension url="u1"><valueString value="v1"/></extension>"#,
            r#"<extension url="u2">"#,
            r#"<extension url="u3"><valueString value="a"/></extension>"#,
            r#"<extension url="u3"><valueString value="b"/></extension>"#,
            r#"</extension>"#,
            r#"</Patient>"#
        )
    );
    assert_eq!(decode(&xml, WireFormat::Xml), patient_with_nested_extensions());
}

#[test]
fn test_nested_extensions_encode_to_json() {
    let mut patient = patient_with_nested_extensions();
    let text = encode(&mut patient, WireFormat::Json);
    assert_eq!(
        text,
        concat!(
            r#"{"resourceType":"Patient","extension":["#,
            r#"{"url":"u1","valueString":"v1"},"#,
            r#"{"url":"u2","extension":[{"url":"u3","valueString":"a"},{"url":"u3","valueString":"b"}]}"#,
            r#"]}"#
        )
    );
    assert_eq!(decode(&text, WireFormat::Json), patient_with_nested_extensions());
}

#[test]
fn test_modifier_extensions_round_trip() {
    let mut basic = Resource::new("Basic");
    basic
        .body
        .extensions
        .push(Extension::modifier("http://example.org/do-not-use").with_value(Value::boolean(true)));
    basic.body.push(
        "code",
        Element::new("CodeableConcept").with("text", Value::string("thing")),
    );

    let text = encode(&mut basic, WireFormat::Json);
    assert_eq!(
        json_value(&text),
        json!({
            "resourceType": "Basic",
            "modifierExtension": [
                { "url": "http://example.org/do-not-use", "valueBoolean": true }
            ],
            "code": { "text": "thing" }
        })
    );

    let xml = encode(&mut basic, WireFormat::Xml);
    let from_xml = decode(&xml, WireFormat::Xml);
    assert_eq!(from_xml, basic);
    assert!(from_xml.body.extensions[0].modifier);
}

#[test]
fn test_empty_extension_survives_without_issues() {
    let json = r#"{"resourceType":"Patient","extension":[{"id":"e1","url":"http://example.org/empty"}]}"#;
    let patient = decode(json, WireFormat::Json);
    let ext = &patient.body.extensions[0];
    assert!(ext.is_empty());
    assert_eq!(ext.id.as_deref(), Some("e1"));

    let mut patient = patient;
    assert_eq!(encode(&mut patient, WireFormat::Json), json);
}

#[test]
fn test_primitive_extensions_ride_in_companions() {
    let json = json!({
        "resourceType": "Patient",
        "birthDate": "1974-12-25",
        "_birthDate": {
            "extension": [{
                "url": "http://hl7.org/fhir/StructureDefinition/patient-birthTime",
                "valueDateTime": "1974-12-25T14:35:45-05:00"
            }]
        }
    });
    let mut patient = decode(&json.to_string(), WireFormat::Json);
    let birth_date = patient
        .body
        .first("birthDate")
        .and_then(Value::as_primitive)
        .unwrap_or_else(|| panic!("birthDate missing"));
    assert_eq!(birth_date.value.as_ref().and_then(PrimitiveValue::as_str), Some("1974-12-25"));
    assert_eq!(birth_date.extensions.len(), 1);

    let xml = encode(&mut patient, WireFormat::Xml);
    assert!(xml.contains(
        r#"<birthDate value="1974-12-25"><extension url="http://hl7.org/fhir/StructureDefinition/patient-birthTime"><valueDateTime value="1974-12-25T14:35:45-05:00"/></extension></birthDate>"#
    ));
    assert_eq!(json_value(&encode(&mut patient, WireFormat::Json)), json);
}

// ============================================================================
// Containment
// ============================================================================

#[test]
fn test_linked_resource_is_contained_once() {
    let org = Arc::new(Resource::new("Organization"));
    let mut patient = Resource::new("Patient");
    patient
        .body
        .push("managingOrganization", Reference::to_resource(org.clone()));

    let expected = r##"{"resourceType":"Patient","contained":[{"resourceType":"Organization","id":"1"}],"managingOrganization":{"reference":"#1"}}"##;
    assert_eq!(encode(&mut patient, WireFormat::Json), expected);
    assert_eq!(encode(&mut patient, WireFormat::Json), expected);
    assert_eq!(patient.contained.len(), 1);
    assert!(Arc::ptr_eq(
        patient.contained.get("1").unwrap_or_else(|| panic!("#1 not contained")),
        &org
    ));

    patient.contained.clear();
    assert_eq!(encode(&mut patient, WireFormat::Json), expected);
}

#[test]
fn test_decoded_local_reference_resolves_to_contained_instance() {
    let xml = concat!(
        r#"<Patient xmlns="http://hl7.org/fhir">"#,
        r#"<contained><Organization><id value="7"/><name value="Acme"/></Organization></contained>"#,
        r##"<managingOrganization><reference value="#7"/></managingOrganization>"##,
        r#"</Patient>"#
    );
    let mut patient = decode(xml, WireFormat::Xml);

    let reference = patient
        .body
        .first("managingOrganization")
        .and_then(Value::as_reference)
        .unwrap_or_else(|| panic!("managingOrganization missing"));
    assert_eq!(
        reference.target,
        Some(ResourceLink::Contained(LocalId::new("7")))
    );

    let target = patient
        .resolve(reference)
        .unwrap_or_else(|| panic!("#7 does not resolve"));
    assert_eq!(target.id.as_deref(), Some("#7"));
    assert_eq!(target.body.first("name").and_then(Value::as_str), Some("Acme"));
    assert!(Arc::ptr_eq(
        target,
        patient.contained.get("7").unwrap_or_else(|| panic!("#7 not contained"))
    ));

    // Re-encoding keeps the id instead of allocating a new one
    assert_eq!(encode(&mut patient, WireFormat::Xml), xml);
}

#[test]
fn test_contained_copy_drops_narrative() {
    let mut org = Resource::new("Organization");
    org.body.push("text", narrative("Acme"));
    org.body.push("name", Value::string("Acme"));
    let org = Arc::new(org);

    let mut patient = Resource::new("Patient");
    patient.body.push("text", narrative("Patient"));
    patient
        .body
        .push("managingOrganization", Reference::to_resource(org));

    let encoded = json_value(&encode(&mut patient, WireFormat::Json));
    assert!(encoded.get("text").is_some());
    assert_eq!(
        encoded["contained"][0],
        json!({ "resourceType": "Organization", "id": "1", "name": "Acme" })
    );

    let keep = FhirParser::with_options(
        parser().registry().clone(),
        ParserOptions {
            suppress_contained_narrative: false,
            ..ParserOptions::default()
        },
    );
    let encoded = keep
        .encode(&mut patient, WireFormat::Json, false)
        .unwrap_or_else(|e| panic!("encode failed: {}", e));
    assert!(json_value(&encoded)["contained"][0].get("text").is_some());
}

#[test]
fn test_requested_local_id_is_reused() {
    let org = Arc::new(Resource::new("Organization").with_id("#333"));
    let doctor = Arc::new(Resource::new("Practitioner"));
    let mut patient = Resource::new("Patient");
    patient
        .body
        .push("managingOrganization", Reference::to_resource(org));
    patient
        .body
        .push("generalPractitioner", Reference::to_resource(doctor));

    let encoded = json_value(&encode(&mut patient, WireFormat::Json));
    assert_eq!(
        encoded,
        json!({
            "resourceType": "Patient",
            "contained": [
                { "resourceType": "Practitioner", "id": "1" },
                { "resourceType": "Organization", "id": "333" }
            ],
            "generalPractitioner": [{ "reference": "#1" }],
            "managingOrganization": { "reference": "#333" }
        })
    );
}

#[test]
fn test_identified_target_is_referenced_by_type_and_id() {
    let org = Arc::new(Resource::new("Organization").with_id("org-1"));
    let mut patient = Resource::new("Patient");
    patient
        .body
        .push("managingOrganization", Reference::to_resource(org));

    assert_eq!(
        encode(&mut patient, WireFormat::Json),
        r#"{"resourceType":"Patient","managingOrganization":{"reference":"Organization/org-1"}}"#
    );
    assert!(patient.contained.is_empty());
}

#[test]
fn test_requested_numeric_id_is_not_taken_by_earlier_target() {
    let doctor = Arc::new(Resource::new("Practitioner"));
    let org = Arc::new(Resource::new("Organization").with_id("#1"));
    let mut patient = Resource::new("Patient");
    patient
        .body
        .push("generalPractitioner", Reference::to_resource(doctor));
    patient
        .body
        .push("managingOrganization", Reference::to_resource(org));

    let encoded = json_value(&encode(&mut patient, WireFormat::Json));
    assert_eq!(
        encoded,
        json!({
            "resourceType": "Patient",
            "contained": [
                { "resourceType": "Practitioner", "id": "2" },
                { "resourceType": "Organization", "id": "1" }
            ],
            "generalPractitioner": [{ "reference": "#2" }],
            "managingOrganization": { "reference": "#1" }
        })
    );
}

#[test]
fn test_failed_encode_leaves_resource_unchanged() {
    let mut patient = Resource::new("Patient");
    patient.body.push(
        "generalPractitioner",
        Reference::to_resource(Arc::new(Resource::new("Practitioner").with_id("#5"))),
    );
    patient.body.push(
        "managingOrganization",
        Reference::to_resource(Arc::new(Resource::new("Organization").with_id("#5"))),
    );
    let before = patient.clone();

    match parser().encode(&mut patient, WireFormat::Json, false) {
        Err(FormatError::Containment(ContainmentError::LocalIdCollision { token })) => {
            assert_eq!(token, "5");
        }
        other => panic!("expected LocalIdCollision, got {:?}", other),
    }
    assert_eq!(patient, before);
    assert!(patient.contained.is_empty());
}

#[test]
fn test_target_with_own_contained_set_fails_encode() {
    let mut org = Resource::new("Organization");
    org.contained
        .push(LocalId::new("1"), Arc::new(Resource::new("Basic")))
        .unwrap_or_else(|e| panic!("push failed: {}", e));
    let mut patient = Resource::new("Patient");
    patient
        .body
        .push("managingOrganization", Reference::to_resource(Arc::new(org)));

    match parser().encode(&mut patient, WireFormat::Xml, false) {
        Err(FormatError::Containment(ContainmentError::NestedContainment { resource_type })) => {
            assert_eq!(resource_type, "Organization");
        }
        other => panic!("expected NestedContainment, got {:?}", other),
    }
}

#[test]
fn test_allocation_is_deterministic_after_clear() {
    fn prop(count: u8, manual: Vec<u8>) -> TestResult {
        let count = usize::from(count % 6) + 1;
        let mut patient = Resource::new("Patient");
        for i in 0..count {
            let doctor = Resource::new("Practitioner");
            // Numeric requests overlap the ids automatic allocation would pick
            let doctor = match manual.contains(&(i as u8)) {
                true if i % 2 == 0 => doctor.with_id(format!("#{}", count - i)),
                true => doctor.with_id(format!("#m{}", i)),
                false => doctor,
            };
            patient
                .body
                .push("generalPractitioner", Reference::to_resource(Arc::new(doctor)));
        }

        let first = match parser().encode(&mut patient, WireFormat::Json, false) {
            Ok(text) => text,
            Err(e) => return TestResult::error(e.to_string()),
        };
        if patient.contained.len() != count {
            return TestResult::failed();
        }

        let again = parser().encode(&mut patient, WireFormat::Json, false);
        patient.contained.clear();
        let after_clear = parser().encode(&mut patient, WireFormat::Json, false);

        TestResult::from_bool(
            again.ok().as_ref() == Some(&first)
                && after_clear.ok().as_ref() == Some(&first)
                && patient.contained.len() == count,
        )
    }

    QuickCheck::new()
        .tests(100)
        .quickcheck(prop as fn(u8, Vec<u8>) -> TestResult);
}

// ============================================================================
// Metadata Side-Table
// ============================================================================

#[test]
fn test_meta_moves_into_side_table() {
    let json = json!({
        "resourceType": "Patient",
        "id": "p1",
        "meta": {
            "versionId": "3",
            "lastUpdated": "2001-02-22T11:22:33-05:00",
            "profile": ["http://example.org/profile/1"],
            "security": [{ "system": "sys1", "code": "code1", "display": "label1" }],
            "tag": [{ "system": "urn:tags", "code": "t1" }]
        },
        "active": true
    });
    let mut patient = decode(&json.to_string(), WireFormat::Json);

    assert!(!patient.body.contains("meta"));
    assert_eq!(patient.meta.version_id(), Some("3"));
    assert_eq!(patient.meta.last_updated(), Some("2001-02-22T11:22:33-05:00"));
    assert_eq!(patient.meta.profiles(), ["http://example.org/profile/1".to_string()]);
    assert_eq!(
        patient.meta.security_labels(),
        [Coding::new("sys1", "code1").with_display("label1")]
    );
    assert_eq!(patient.meta.tags(), [Coding::new("urn:tags", "t1")]);

    assert_eq!(json_value(&encode(&mut patient, WireFormat::Json)), json);
}

#[test]
fn test_unknown_meta_content_is_dropped_with_issue() {
    let json = r#"{"resourceType":"Patient","meta":{"versionId":"1","extension":[{"url":"u","valueString":"x"}]}}"#;
    let decoded = parser()
        .decode(json, WireFormat::Json, "Patient")
        .unwrap_or_else(|e| panic!("decode failed: {}", e));
    assert_eq!(decoded.resource.meta.version_id(), Some("1"));
    assert_eq!(decoded.issues.len(), 1);
    assert_eq!(decoded.issues[0].kind, IssueKind::DroppedMetadata);
}

#[test]
fn test_bundle_entry_annotations_live_on_the_resource() {
    let mut listed = Resource::new("Patient").with_id("p1");
    listed.meta.set_search_mode(SearchEntryMode::Match);
    listed.meta.set_search_score(Decimal::new(5, 1));

    let mut bundle = Resource::new("Bundle");
    bundle.body.push("type", Value::code("searchset"));
    bundle.body.push(
        "entry",
        Element::new("Bundle.entry")
            .with("fullUrl", Value::uri("http://example.org/fhir/Patient/p1"))
            .with("resource", Value::resource(listed)),
    );

    let expected = json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "entry": [{
            "fullUrl": "http://example.org/fhir/Patient/p1",
            "resource": { "resourceType": "Patient", "id": "p1" },
            "search": { "mode": "match", "score": 0.5 }
        }]
    });
    let text = encode(&mut bundle, WireFormat::Json);
    assert_eq!(json_value(&text), expected);

    let xml = encode(&mut bundle, WireFormat::Xml);
    let decoded = decode(&xml, WireFormat::Xml);
    let entry = decoded
        .body
        .first("entry")
        .and_then(Value::as_element)
        .unwrap_or_else(|| panic!("entry missing"));
    assert!(!entry.contains("search"));
    let resource = entry
        .first("resource")
        .and_then(Value::as_resource)
        .unwrap_or_else(|| panic!("entry resource missing"));
    assert_eq!(resource.meta.search_mode(), Some(SearchEntryMode::Match));
    assert_eq!(resource.meta.search_score(), Some(Decimal::new(5, 1)));
    assert_eq!(decoded, bundle);
}

#[test]
fn test_transaction_method_is_written_to_request() {
    let mut created = Resource::new("Patient");
    created.meta.set_transaction_method(HttpVerb::Post);
    created.meta.set_link_search("Patient");

    let mut bundle = Resource::new("Bundle");
    bundle.body.push("type", Value::code("transaction"));
    bundle.body.push(
        "entry",
        Element::new("Bundle.entry").with("resource", Value::resource(created)),
    );

    assert_eq!(
        json_value(&encode(&mut bundle, WireFormat::Json)),
        json!({
            "resourceType": "Bundle",
            "type": "transaction",
            "entry": [{
                "resource": { "resourceType": "Patient" },
                "request": { "method": "POST", "url": "Patient" }
            }]
        })
    );
}

// ============================================================================
// Decode Errors and Strict Mode
// ============================================================================

#[test]
fn test_root_type_must_match_target() {
    let json = r#"{"resourceType":"Observation","status":"final"}"#;
    match parser().decode(json, WireFormat::Json, "Patient") {
        Err(FormatError::Structure(StructureError::RootTypeMismatch { expected, found })) => {
            assert_eq!(expected, "Patient");
            assert_eq!(found, "Observation");
        }
        other => panic!("expected RootTypeMismatch, got {:?}", other.map(|d| d.issues)),
    }

    // Any concrete resource is a DomainResource
    assert!(parser().decode(json, WireFormat::Json, "DomainResource").is_ok());
}

#[test]
fn test_malformed_documents_fail() {
    assert!(matches!(
        parser().decode("<Patient><active value=\"true\">", WireFormat::Xml, "Patient"),
        Err(FormatError::Structure(StructureError::MalformedXml(_)))
    ));
    assert!(matches!(
        parser().decode(r#"{"resourceType":"Patient","#, WireFormat::Json, "Patient"),
        Err(FormatError::Structure(StructureError::MalformedJson(_)))
    ));
    assert!(matches!(
        parser().decode(r#"["Patient"]"#, WireFormat::Json, "Patient"),
        Err(FormatError::Structure(StructureError::ExpectedObject))
    ));
    assert!(matches!(
        parser().decode(r#"{"active":true}"#, WireFormat::Json, "Patient"),
        Err(FormatError::Structure(StructureError::MissingResourceType))
    ));
    assert!(matches!(
        parser().decode(r#"{"resourceType":"Spaceship"}"#, WireFormat::Json, "Resource"),
        Err(FormatError::Structure(StructureError::UnknownResourceType(ref t))) if t == "Spaceship"
    ));
}

#[test]
fn test_lenient_decode_records_what_strict_rejects() {
    let json = r#"{"resourceType":"Patient","active":true,"favouriteColour":"blue","extension":[{"url":"u","valueSpaceship":"x"}]}"#;

    let decoded = parser()
        .decode(json, WireFormat::Json, "Patient")
        .unwrap_or_else(|e| panic!("lenient decode failed: {}", e));
    let kinds: Vec<_> = decoded.issues.iter().map(|i| i.kind).collect();
    assert_eq!(kinds.len(), 2, "{:?}", decoded.issues);
    assert!(kinds.contains(&IssueKind::UnknownElement));
    assert!(kinds.contains(&IssueKind::UnknownExtensionAttribute));
    let active = decoded
        .resource
        .body
        .first("active")
        .and_then(Value::as_primitive)
        .and_then(|p| p.value.as_ref())
        .and_then(PrimitiveValue::as_bool);
    assert_eq!(active, Some(true));

    let strict = FhirParser::with_options(parser().registry().clone(), ParserOptions::strict());
    assert!(matches!(
        strict.decode(json, WireFormat::Json, "Patient"),
        Err(FormatError::Structure(StructureError::UnknownElement { .. }))
    ));
}

#[test]
fn test_extension_without_url_is_reported() {
    let xml = r#"<Patient xmlns="http://hl7.org/fhir"><extension><valueString value="x"/></extension></Patient>"#;
    let decoded = parser()
        .decode(xml, WireFormat::Xml, "Patient")
        .unwrap_or_else(|e| panic!("decode failed: {}", e));
    assert_eq!(decoded.issues.len(), 1);
    assert_eq!(decoded.issues[0].kind, IssueKind::MissingUrl);
}

// ============================================================================
// Versions
// ============================================================================

#[test]
fn test_dstu2_reference_extensions() {
    let dstu2 = FhirParser::for_version(FhirVersion::Dstu2)
        .unwrap_or_else(|e| panic!("registry failed: {}", e));

    let mut patient = Resource::new("Patient");
    patient.body.extensions.push(
        Extension::new("http://example.org/owner")
            .with_value(Value::Reference(Reference::new("Organization/1"))),
    );
    let json = dstu2
        .encode(&mut patient, WireFormat::Json, false)
        .unwrap_or_else(|e| panic!("encode failed: {}", e));
    assert_eq!(
        json,
        r#"{"resourceType":"Patient","extension":[{"url":"http://example.org/owner","valueReference":{"reference":"Organization/1"}}]}"#
    );

    // The legacy spelling is still read, in any case
    let legacy = r#"{"resourceType":"Patient","extension":[{"url":"http://example.org/owner","valueresource":{"reference":"Organization/1"}}]}"#;
    let decoded = dstu2
        .decode(legacy, WireFormat::Json, "Patient")
        .unwrap_or_else(|e| panic!("decode failed: {}", e));
    assert!(decoded.issues.is_empty(), "{:?}", decoded.issues);
    assert_eq!(decoded.resource, patient);
}

#[test]
fn test_earliest_version_writes_value_resource() {
    let mut b = TypeCatalog::builder(FhirVersion::Dstu1);
    for name in ["string", "id", "uri"] {
        b.primitive(name);
    }
    b.complex("Element")
        .no_base()
        .abstract_type()
        .many("extension", "Extension");
    b.extension("Extension");
    b.reference("ResourceReference")
        .opt("reference", "string")
        .opt("display", "string");
    b.abstract_resource("Resource")
        .opt("id", "id")
        .many("extension", "Extension");
    b.resource("Basic").base("Resource").opt("code", "string");
    let catalog = b.build().unwrap_or_else(|e| panic!("catalog failed: {}", e));
    let registry = Registry::build(&catalog).unwrap_or_else(|e| panic!("registry failed: {}", e));
    let dstu1 = FhirParser::new(Arc::new(registry));

    let mut reference = Reference::of_type("ResourceReference");
    reference.set_reference("Patient/1");
    let mut basic = Resource::new("Basic");
    basic
        .body
        .extensions
        .push(Extension::new("http://example.org/subject").with_value(Value::Reference(reference)));
    basic.body.push("code", Value::string("x"));

    let xml = dstu1
        .encode(&mut basic, WireFormat::Xml, false)
        .unwrap_or_else(|e| panic!("encode failed: {}", e));
    assert_eq!(
        xml,
        concat!(
            r#"<Basic xmlns="http://hl7.org/fhir">"#,
            r#"<extension url="http://example.org/subject"><valueResource><reference value="Patient/1"/></valueResource></extension>"#,
            r#"<code value="x"/>"#,
            r#"</Basic>"#
        )
    );
    let decoded = dstu1
        .decode(&xml, WireFormat::Xml, "Basic")
        .unwrap_or_else(|e| panic!("decode failed: {}", e));
    assert_eq!(decoded.resource, basic);
}

// ============================================================================
// Sharing One Registry
// ============================================================================

#[test]
fn test_parsers_share_registry_across_threads() {
    let cache = RegistryCache::builtin();
    let registry = cache
        .get(FhirVersion::R4)
        .unwrap_or_else(|e| panic!("registry failed: {}", e));

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let parser = FhirParser::new(cache.get(FhirVersion::R4).unwrap_or_else(|e| {
                    panic!("registry failed: {}", e)
                }));
                assert!(Arc::ptr_eq(parser.registry(), &registry));
                scope.spawn(move || {
                    let org = Arc::new(Resource::new("Organization"));
                    let mut patient = Resource::new("Patient").with_id(format!("p{}", i));
                    patient.body.push("active", Value::boolean(i % 2 == 0));
                    patient
                        .body
                        .push("managingOrganization", Reference::to_resource(org));

                    let xml = parser
                        .encode(&mut patient, WireFormat::Xml, false)
                        .unwrap_or_else(|e| panic!("encode failed: {}", e));
                    let decoded = parser
                        .decode(&xml, WireFormat::Xml, "Patient")
                        .unwrap_or_else(|e| panic!("decode failed: {}", e));
                    (i, decoded.resource)
                })
            })
            .collect();

        for handle in handles {
            let (i, patient) = handle.join().unwrap_or_else(|_| panic!("thread panicked"));
            assert_eq!(patient.id, Some(format!("p{}", i)));
            assert_eq!(patient.contained.len(), 1);
            assert!(patient.contained.contains_id("1"));
        }
    });
    assert_eq!(cache.cached_versions(), vec![FhirVersion::R4]);
}
