//! Out-of-band resource metadata
//!
//! Values that travel with a resource without being declared children of it: the
//! `meta` block and, for Bundle entries, the search and request annotations.

use super::error::{Error, Result};
use chrono::{DateTime, FixedOffset, SecondsFormat, TimeZone};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Keys of the side-table. Iteration follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataKey {
    VersionId,
    LastUpdated,
    Source,
    Profiles,
    SecurityLabels,
    Tags,
    EntrySearchMode,
    EntrySearchScore,
    EntryTransactionMethod,
    /// URL of the Bundle entry request (`entry.request.url`)
    LinkSearch,
}

impl MetadataKey {
    /// Keys carried by the resource's own `meta` block.
    pub fn is_meta_block(self) -> bool {
        matches!(
            self,
            MetadataKey::VersionId
                | MetadataKey::LastUpdated
                | MetadataKey::Source
                | MetadataKey::Profiles
                | MetadataKey::SecurityLabels
                | MetadataKey::Tags
        )
    }

    /// Keys carried by the enclosing Bundle entry.
    pub fn is_entry_annotation(self) -> bool {
        !self.is_meta_block()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Text(String),
    Uris(Vec<String>),
    Codings(Vec<Coding>),
    SearchMode(SearchEntryMode),
    Score(Decimal),
    Method(HttpVerb),
}

/// A code from a code system, as used by tags and security labels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_selected: Option<bool>,
}

impl Coding {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            code: Some(code.into()),
            ..Default::default()
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

/// Why an entry is in a search result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEntryMode {
    /// This resource matched the search criteria
    Match,
    /// Returned because another resource in the set refers to it
    Include,
    /// An OperationOutcome about the processing of the search
    Outcome,
}

impl SearchEntryMode {
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "match" => Ok(Self::Match),
            "include" => Ok(Self::Include),
            "outcome" => Ok(Self::Outcome),
            other => Err(Error::UnknownCode {
                system: "search-entry-mode",
                code: other.to_string(),
            }),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Match => "match",
            Self::Include => "include",
            Self::Outcome => "outcome",
        }
    }
}

/// HTTP verb of a transaction entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpVerb {
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            other => Err(Error::UnknownCode {
                system: "http-verb",
                code: other.to_string(),
            }),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Side-table of metadata associated with one resource instance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceMetadata {
    entries: BTreeMap<MetadataKey, MetadataValue>,
}

impl ResourceMetadata {
    pub fn get(&self, key: MetadataKey) -> Option<&MetadataValue> {
        self.entries.get(&key)
    }

    pub fn insert(&mut self, key: MetadataKey, value: MetadataValue) -> Option<MetadataValue> {
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: MetadataKey) -> Option<MetadataValue> {
        self.entries.remove(&key)
    }

    pub fn contains(&self, key: MetadataKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetadataKey, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when any key of the `meta` block is set.
    pub fn has_meta_block(&self) -> bool {
        self.entries.keys().any(|k| k.is_meta_block())
    }

    pub fn has_entry_annotations(&self) -> bool {
        self.entries.keys().any(|k| k.is_entry_annotation())
    }

    fn text(&self, key: MetadataKey) -> Option<&str> {
        match self.entries.get(&key) {
            Some(MetadataValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    fn codings(&self, key: MetadataKey) -> &[Coding] {
        match self.entries.get(&key) {
            Some(MetadataValue::Codings(c)) => c,
            _ => &[],
        }
    }

    fn push_coding(&mut self, key: MetadataKey, coding: Coding) {
        match self.entries.get_mut(&key) {
            Some(MetadataValue::Codings(c)) => c.push(coding),
            _ => {
                self.entries.insert(key, MetadataValue::Codings(vec![coding]));
            }
        }
    }

    pub fn version_id(&self) -> Option<&str> {
        self.text(MetadataKey::VersionId)
    }

    pub fn set_version_id(&mut self, version_id: impl Into<String>) {
        self.insert(MetadataKey::VersionId, MetadataValue::Text(version_id.into()));
    }

    /// Lexical `lastUpdated` instant as it appeared on the wire.
    pub fn last_updated(&self) -> Option<&str> {
        self.text(MetadataKey::LastUpdated)
    }

    pub fn set_last_updated(&mut self, instant: impl Into<String>) {
        self.insert(MetadataKey::LastUpdated, MetadataValue::Text(instant.into()));
    }

    /// `lastUpdated` parsed as an RFC 3339 instant.
    pub fn last_updated_at(&self) -> Option<Result<DateTime<FixedOffset>>> {
        self.last_updated().map(|s| {
            DateTime::parse_from_rfc3339(s).map_err(|_| Error::InvalidTimestamp(s.to_string()))
        })
    }

    pub fn set_last_updated_at<Tz>(&mut self, at: DateTime<Tz>)
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        self.set_last_updated(at.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    }

    pub fn source(&self) -> Option<&str> {
        self.text(MetadataKey::Source)
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.insert(MetadataKey::Source, MetadataValue::Text(source.into()));
    }

    pub fn profiles(&self) -> &[String] {
        match self.entries.get(&MetadataKey::Profiles) {
            Some(MetadataValue::Uris(p)) => p,
            _ => &[],
        }
    }

    pub fn add_profile(&mut self, profile: impl Into<String>) {
        match self.entries.get_mut(&MetadataKey::Profiles) {
            Some(MetadataValue::Uris(p)) => p.push(profile.into()),
            _ => {
                self.insert(MetadataKey::Profiles, MetadataValue::Uris(vec![profile.into()]));
            }
        }
    }

    pub fn security_labels(&self) -> &[Coding] {
        self.codings(MetadataKey::SecurityLabels)
    }

    pub fn add_security_label(&mut self, label: Coding) {
        self.push_coding(MetadataKey::SecurityLabels, label);
    }

    pub fn tags(&self) -> &[Coding] {
        self.codings(MetadataKey::Tags)
    }

    pub fn add_tag(&mut self, tag: Coding) {
        self.push_coding(MetadataKey::Tags, tag);
    }

    pub fn search_mode(&self) -> Option<SearchEntryMode> {
        match self.entries.get(&MetadataKey::EntrySearchMode) {
            Some(MetadataValue::SearchMode(m)) => Some(*m),
            _ => None,
        }
    }

    pub fn set_search_mode(&mut self, mode: SearchEntryMode) {
        self.insert(MetadataKey::EntrySearchMode, MetadataValue::SearchMode(mode));
    }

    pub fn search_score(&self) -> Option<Decimal> {
        match self.entries.get(&MetadataKey::EntrySearchScore) {
            Some(MetadataValue::Score(s)) => Some(*s),
            _ => None,
        }
    }

    pub fn set_search_score(&mut self, score: Decimal) {
        self.insert(MetadataKey::EntrySearchScore, MetadataValue::Score(score));
    }

    pub fn transaction_method(&self) -> Option<HttpVerb> {
        match self.entries.get(&MetadataKey::EntryTransactionMethod) {
            Some(MetadataValue::Method(m)) => Some(*m),
            _ => None,
        }
    }

    pub fn set_transaction_method(&mut self, method: HttpVerb) {
        self.insert(MetadataKey::EntryTransactionMethod, MetadataValue::Method(method));
    }

    pub fn link_search(&self) -> Option<&str> {
        self.text(MetadataKey::LinkSearch)
    }

    pub fn set_link_search(&mut self, url: impl Into<String>) {
        self.insert(MetadataKey::LinkSearch, MetadataValue::Text(url.into()));
    }
}
