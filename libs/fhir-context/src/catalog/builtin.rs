//! Built-in DSTU2 and R4 catalogs
//!
//! A working subset of the core FHIR types: every primitive, the general purpose
//! datatypes, and the resources needed for documents, bundles and common clinical data.

use super::{CatalogBuilder, Max, TypeCatalog};
use crate::error::{ConfigurationError, Result};
use crate::version::FhirVersion;

const MANY: Max = Max::Unbounded;

pub(super) fn catalog(version: FhirVersion) -> Result<TypeCatalog> {
    let mut b = TypeCatalog::builder(version);
    match version {
        FhirVersion::Dstu2 => {
            primitives(&mut b, &[]);
            base_types(&mut b);
            datatypes_dstu2(&mut b);
            resources_dstu2(&mut b);
        }
        FhirVersion::R4 => {
            primitives(&mut b, &["canonical", "url", "uuid"]);
            base_types(&mut b);
            datatypes_r4(&mut b);
            resources_r4(&mut b);
        }
        FhirVersion::Dstu1 => return Err(ConfigurationError::UnsupportedVersion(version)),
    }
    b.build()
}

fn primitives(b: &mut CatalogBuilder, extra: &[&str]) {
    for name in [
        "boolean",
        "integer",
        "unsignedInt",
        "positiveInt",
        "decimal",
        "string",
        "code",
        "id",
        "markdown",
        "uri",
        "oid",
        "base64Binary",
        "date",
        "dateTime",
        "instant",
        "time",
        "xhtml",
    ]
    .iter()
    .chain(extra)
    {
        b.primitive(name);
    }
}

/// Abstract roots shared by both versions.
fn base_types(b: &mut CatalogBuilder) {
    b.complex("Element")
        .no_base()
        .abstract_type()
        .many("extension", "Extension");
    b.complex("BackboneElement")
        .abstract_type()
        .many("modifierExtension", "Extension");
    b.extension("Extension");
    b.complex("Narrative")
        .req("status", "code")
        .req("div", "xhtml");

    b.abstract_resource("Resource")
        .opt("id", "id")
        .opt("meta", "Meta")
        .opt("implicitRules", "uri")
        .opt("language", "code");
    b.abstract_resource("DomainResource")
        .base("Resource")
        .opt("text", "Narrative")
        .many("contained", "Resource")
        .many("extension", "Extension")
        .many("modifierExtension", "Extension");
}

fn coding(b: &mut CatalogBuilder) {
    b.complex("Coding")
        .opt("system", "uri")
        .opt("version", "string")
        .opt("code", "code")
        .opt("display", "string")
        .opt("userSelected", "boolean");
    b.complex("CodeableConcept")
        .many("coding", "Coding")
        .opt("text", "string");
    b.complex("Period")
        .opt("start", "dateTime")
        .opt("end", "dateTime");
    b.complex("ContactPoint")
        .opt("system", "code")
        .opt("value", "string")
        .opt("use", "code")
        .opt("rank", "positiveInt")
        .opt("period", "Period");
    b.complex("Quantity")
        .opt("value", "decimal")
        .opt("comparator", "code")
        .opt("unit", "string")
        .opt("system", "uri")
        .opt("code", "code");
    b.specialization("SimpleQuantity", "Quantity");
    b.complex("Range")
        .opt("low", "Quantity")
        .opt("high", "Quantity");
    b.complex("Ratio")
        .opt("numerator", "Quantity")
        .opt("denominator", "Quantity");
    b.complex("Attachment")
        .opt("contentType", "code")
        .opt("language", "code")
        .opt("data", "base64Binary")
        .opt("url", "uri")
        .opt("size", "unsignedInt")
        .opt("hash", "base64Binary")
        .opt("title", "string")
        .opt("creation", "dateTime");
}

fn datatypes_dstu2(b: &mut CatalogBuilder) {
    coding(b);
    for name in ["Age", "Count", "Distance", "Duration", "Money"] {
        b.specialization(name, "Quantity");
    }
    b.reference("Reference")
        .opt("reference", "string")
        .opt("display", "string");
    b.complex("Identifier")
        .opt("use", "code")
        .opt("type", "CodeableConcept")
        .opt("system", "uri")
        .opt("value", "string")
        .opt("period", "Period")
        .opt("assigner", "Reference");
    b.complex("HumanName")
        .opt("use", "code")
        .opt("text", "string")
        .many("family", "string")
        .many("given", "string")
        .many("prefix", "string")
        .many("suffix", "string")
        .opt("period", "Period");
    b.complex("Address")
        .opt("use", "code")
        .opt("type", "code")
        .opt("text", "string")
        .many("line", "string")
        .opt("city", "string")
        .opt("district", "string")
        .opt("state", "string")
        .opt("postalCode", "string")
        .opt("country", "string")
        .opt("period", "Period");
    b.complex("Annotation")
        .choice("author[x]", &["Reference", "string"])
        .opt("time", "dateTime")
        .req("text", "string");
    b.complex("Meta")
        .opt("versionId", "id")
        .opt("lastUpdated", "instant")
        .many("profile", "uri")
        .many("security", "Coding")
        .many("tag", "Coding");
}

fn datatypes_r4(b: &mut CatalogBuilder) {
    coding(b);
    for name in ["Age", "Count", "Distance", "Duration"] {
        b.complex(name).base("Quantity");
    }
    b.complex("Money")
        .opt("value", "decimal")
        .opt("currency", "code");
    b.reference("Reference")
        .opt("reference", "string")
        .opt("type", "uri")
        .opt("identifier", "Identifier")
        .opt("display", "string");
    b.complex("Identifier")
        .opt("use", "code")
        .opt("type", "CodeableConcept")
        .opt("system", "uri")
        .opt("value", "string")
        .opt("period", "Period")
        .opt("assigner", "Reference");
    b.complex("HumanName")
        .opt("use", "code")
        .opt("text", "string")
        .opt("family", "string")
        .many("given", "string")
        .many("prefix", "string")
        .many("suffix", "string")
        .opt("period", "Period");
    b.complex("Address")
        .opt("use", "code")
        .opt("type", "code")
        .opt("text", "string")
        .many("line", "string")
        .opt("city", "string")
        .opt("district", "string")
        .opt("state", "string")
        .opt("postalCode", "string")
        .opt("country", "string")
        .opt("period", "Period");
    b.complex("Annotation")
        .choice("author[x]", &["Reference", "string"])
        .opt("time", "dateTime")
        .req("text", "markdown");
    b.complex("Meta")
        .opt("versionId", "id")
        .opt("lastUpdated", "instant")
        .opt("source", "uri")
        .many("profile", "canonical")
        .many("security", "Coding")
        .many("tag", "Coding");
}

/// `Bundle` and its backbones, identical in both versions.
fn bundle(b: &mut CatalogBuilder) {
    b.resource("Bundle")
        .base("Resource")
        .req("type", "code")
        .opt("total", "unsignedInt")
        .many("link", "Bundle.link")
        .many("entry", "Bundle.entry");
    b.backbone("Bundle.link")
        .req("relation", "string")
        .req("url", "uri");
    b.backbone("Bundle.entry")
        .many("link", "Bundle.link")
        .opt("fullUrl", "uri")
        .opt("resource", "Resource")
        .opt("search", "Bundle.entry.search")
        .opt("request", "Bundle.entry.request")
        .opt("response", "Bundle.entry.response");
    b.backbone("Bundle.entry.search")
        .opt("mode", "code")
        .opt("score", "decimal");
    b.backbone("Bundle.entry.request")
        .req("method", "code")
        .req("url", "uri")
        .opt("ifNoneMatch", "string")
        .opt("ifModifiedSince", "instant")
        .opt("ifMatch", "string")
        .opt("ifNoneExist", "string");
    b.backbone("Bundle.entry.response")
        .req("status", "string")
        .opt("location", "uri")
        .opt("etag", "string")
        .opt("lastModified", "instant");
}

fn patient(b: &mut CatalogBuilder, version: FhirVersion) {
    let family_doctors = match version {
        FhirVersion::R4 => "generalPractitioner",
        _ => "careProvider",
    };
    b.resource("Patient")
        .many("identifier", "Identifier")
        .opt("active", "boolean")
        .many("name", "HumanName")
        .many("telecom", "ContactPoint")
        .opt("gender", "code")
        .opt("birthDate", "date")
        .choice("deceased[x]", &["boolean", "dateTime"])
        .many("address", "Address")
        .opt("maritalStatus", "CodeableConcept")
        .choice("multipleBirth[x]", &["boolean", "integer"])
        .many("photo", "Attachment")
        .many("contact", "Patient.contact")
        .many(family_doctors, "Reference")
        .opt("managingOrganization", "Reference")
        .many("link", "Patient.link");
    b.backbone("Patient.contact")
        .many("relationship", "CodeableConcept")
        .opt("name", "HumanName")
        .many("telecom", "ContactPoint")
        .opt("address", "Address")
        .opt("gender", "code")
        .opt("organization", "Reference")
        .opt("period", "Period");
    b.backbone("Patient.link")
        .req("other", "Reference")
        .req("type", "code");
}

fn resources_dstu2(b: &mut CatalogBuilder) {
    patient(b, FhirVersion::Dstu2);
    bundle(b);
    b.resource("Organization")
        .many("identifier", "Identifier")
        .opt("active", "boolean")
        .opt("type", "CodeableConcept")
        .opt("name", "string")
        .many("telecom", "ContactPoint")
        .many("address", "Address")
        .opt("partOf", "Reference");
    b.resource("Practitioner")
        .many("identifier", "Identifier")
        .opt("active", "boolean")
        .opt("name", "HumanName")
        .many("telecom", "ContactPoint")
        .many("address", "Address")
        .opt("gender", "code")
        .opt("birthDate", "date");
    b.resource("Observation")
        .many("identifier", "Identifier")
        .req("status", "code")
        .opt("category", "CodeableConcept")
        .req("code", "CodeableConcept")
        .opt("subject", "Reference")
        .opt("encounter", "Reference")
        .choice("effective[x]", &["dateTime", "Period"])
        .opt("issued", "instant")
        .many("performer", "Reference")
        .choice(
            "value[x]",
            &[
                "Quantity",
                "CodeableConcept",
                "string",
                "Range",
                "Ratio",
                "time",
                "dateTime",
                "Period",
                "Attachment",
            ],
        )
        .opt("interpretation", "CodeableConcept")
        .opt("comments", "string")
        .many("referenceRange", "Observation.referenceRange")
        .many("component", "Observation.component");
    b.backbone("Observation.referenceRange")
        .opt("low", "SimpleQuantity")
        .opt("high", "SimpleQuantity")
        .opt("text", "string");
    b.backbone("Observation.component")
        .req("code", "CodeableConcept")
        .choice("value[x]", &["Quantity", "CodeableConcept", "string", "Period"]);
    b.resource("Medication")
        .opt("code", "CodeableConcept")
        .opt("isBrand", "boolean")
        .opt("manufacturer", "Reference");
    b.resource("MedicationOrder")
        .many("identifier", "Identifier")
        .opt("dateWritten", "dateTime")
        .opt("status", "code")
        .opt("patient", "Reference")
        .opt("prescriber", "Reference")
        .opt("note", "string")
        .choice("medication[x]", &["CodeableConcept", "Reference"]);
    b.resource("Composition")
        .opt("identifier", "Identifier")
        .req("date", "dateTime")
        .req("type", "CodeableConcept")
        .req("title", "string")
        .req("status", "code")
        .req("subject", "Reference")
        .child("author", 1, MANY, &["Reference"])
        .many("section", "Composition.section");
    b.backbone("Composition.section")
        .opt("title", "string")
        .opt("code", "CodeableConcept")
        .opt("text", "Narrative")
        .many("entry", "Reference")
        .many("section", "Composition.section");
    b.resource("AllergyIntolerance")
        .many("identifier", "Identifier")
        .opt("onset", "dateTime")
        .opt("recordedDate", "dateTime")
        .opt("recorder", "Reference")
        .req("patient", "Reference")
        .req("substance", "CodeableConcept")
        .opt("status", "code")
        .opt("criticality", "code")
        .opt("type", "code")
        .opt("category", "code");
    b.resource("Encounter")
        .many("identifier", "Identifier")
        .req("status", "code")
        .many("type", "CodeableConcept")
        .opt("patient", "Reference")
        .opt("period", "Period")
        .opt("serviceProvider", "Reference");
    b.resource("Binary")
        .base("Resource")
        .req("contentType", "code")
        .req("content", "base64Binary");
    b.resource("Basic")
        .many("identifier", "Identifier")
        .req("code", "CodeableConcept")
        .opt("subject", "Reference")
        .opt("author", "Reference")
        .opt("created", "date");
}

fn resources_r4(b: &mut CatalogBuilder) {
    patient(b, FhirVersion::R4);
    bundle(b);
    b.resource("Organization")
        .many("identifier", "Identifier")
        .opt("active", "boolean")
        .many("type", "CodeableConcept")
        .opt("name", "string")
        .many("telecom", "ContactPoint")
        .many("address", "Address")
        .opt("partOf", "Reference");
    b.resource("Practitioner")
        .many("identifier", "Identifier")
        .opt("active", "boolean")
        .many("name", "HumanName")
        .many("telecom", "ContactPoint")
        .many("address", "Address")
        .opt("gender", "code")
        .opt("birthDate", "date");
    b.resource("Observation")
        .many("identifier", "Identifier")
        .req("status", "code")
        .many("category", "CodeableConcept")
        .req("code", "CodeableConcept")
        .opt("subject", "Reference")
        .opt("encounter", "Reference")
        .choice("effective[x]", &["dateTime", "Period", "instant"])
        .opt("issued", "instant")
        .many("performer", "Reference")
        .choice(
            "value[x]",
            &[
                "Quantity",
                "CodeableConcept",
                "string",
                "boolean",
                "integer",
                "Range",
                "Ratio",
                "time",
                "dateTime",
                "Period",
            ],
        )
        .many("interpretation", "CodeableConcept")
        .many("note", "Annotation")
        .many("referenceRange", "Observation.referenceRange")
        .many("component", "Observation.component");
    b.backbone("Observation.referenceRange")
        .opt("low", "SimpleQuantity")
        .opt("high", "SimpleQuantity")
        .opt("text", "string");
    b.backbone("Observation.component")
        .req("code", "CodeableConcept")
        .choice(
            "value[x]",
            &["Quantity", "CodeableConcept", "string", "boolean", "integer", "Period"],
        );
    b.resource("Medication")
        .many("identifier", "Identifier")
        .opt("code", "CodeableConcept")
        .opt("status", "code")
        .opt("manufacturer", "Reference");
    b.resource("MedicationRequest")
        .many("identifier", "Identifier")
        .req("status", "code")
        .req("intent", "code")
        .child("medication[x]", 1, Max::Bounded(1), &["CodeableConcept", "Reference"])
        .req("subject", "Reference")
        .opt("authoredOn", "dateTime")
        .opt("requester", "Reference")
        .many("note", "Annotation");
    b.resource("Composition")
        .opt("identifier", "Identifier")
        .req("status", "code")
        .req("type", "CodeableConcept")
        .opt("subject", "Reference")
        .req("date", "dateTime")
        .child("author", 1, MANY, &["Reference"])
        .req("title", "string")
        .many("section", "Composition.section");
    b.backbone("Composition.section")
        .opt("title", "string")
        .opt("code", "CodeableConcept")
        .many("author", "Reference")
        .opt("text", "Narrative")
        .many("entry", "Reference")
        .many("section", "Composition.section");
    b.resource("AllergyIntolerance")
        .many("identifier", "Identifier")
        .opt("clinicalStatus", "CodeableConcept")
        .opt("verificationStatus", "CodeableConcept")
        .opt("type", "code")
        .many("category", "code")
        .opt("criticality", "code")
        .opt("code", "CodeableConcept")
        .req("patient", "Reference")
        .opt("recordedDate", "dateTime")
        .opt("recorder", "Reference");
    b.resource("Encounter")
        .many("identifier", "Identifier")
        .req("status", "code")
        .req("class", "Coding")
        .many("type", "CodeableConcept")
        .opt("subject", "Reference")
        .opt("period", "Period")
        .opt("serviceProvider", "Reference");
    b.resource("Binary")
        .base("Resource")
        .req("contentType", "code")
        .opt("securityContext", "Reference")
        .opt("data", "base64Binary");
    b.resource("Basic")
        .many("identifier", "Identifier")
        .req("code", "CodeableConcept")
        .opt("subject", "Reference")
        .opt("created", "date")
        .opt("author", "Reference");
}
