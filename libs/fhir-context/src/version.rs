//! FHIR versions and the capabilities that differ between them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Schema versions a registry can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FhirVersion {
    Dstu1,
    Dstu2,
    R4,
}

/// Version-dependent facts the registry consults while building.
pub trait VersionCapabilities {
    /// Schema name of the datatype used for references to other resources.
    fn resource_reference_type(&self) -> &'static str;

    /// Whether this is the earliest supported version, which spells the
    /// reference-valued extension attribute `valueResource`.
    fn is_earliest_version(&self) -> bool;
}

impl FhirVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            FhirVersion::Dstu1 => "DSTU1",
            FhirVersion::Dstu2 => "DSTU2",
            FhirVersion::R4 => "R4",
        }
    }
}

impl VersionCapabilities for FhirVersion {
    fn resource_reference_type(&self) -> &'static str {
        match self {
            FhirVersion::Dstu1 => "ResourceReference",
            FhirVersion::Dstu2 | FhirVersion::R4 => "Reference",
        }
    }

    fn is_earliest_version(&self) -> bool {
        matches!(self, FhirVersion::Dstu1)
    }
}

impl fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FhirVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DSTU1" | "0.0" => Ok(FhirVersion::Dstu1),
            "DSTU2" | "1.0" | "1.0.2" => Ok(FhirVersion::Dstu2),
            "R4" | "4.0" | "4.0.1" => Ok(FhirVersion::R4),
            other => Err(format!("Unsupported FHIR version: {}", other)),
        }
    }
}
