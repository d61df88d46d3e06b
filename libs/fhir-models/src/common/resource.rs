//! Resources and their contained sets

use super::element::Element;
use super::error::{Error, Result};
use super::metadata::ResourceMetadata;
use super::reference::{Reference, ResourceLink};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Token of a contained resource, without the leading `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(String);

impl LocalId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Parse a `#tok` string. Anything without the prefix, or an empty token, is not local.
    pub fn parse(value: &str) -> Option<Self> {
        value
            .strip_prefix('#')
            .filter(|tok| !tok.is_empty())
            .map(Self::new)
    }

    pub fn token(&self) -> &str {
        &self.0
    }

    /// Reference string form, `#tok`.
    pub fn to_reference(&self) -> String {
        format!("#{}", self.0)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A top-level resource instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub resource_type: String,
    /// Logical id. Decoded contained resources carry `#tok`.
    pub id: Option<String>,
    pub meta: ResourceMetadata,
    pub contained: ContainedResources,
    /// Declared children, extensions and narrative
    pub body: Element,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        let resource_type = resource_type.into();
        Self {
            body: Element::new(resource_type.as_str()),
            resource_type,
            id: None,
            meta: ResourceMetadata::default(),
            contained: ContainedResources::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Local id requested by a `#tok` resource id (manual containment).
    pub fn requested_local_id(&self) -> Option<LocalId> {
        self.id.as_deref().and_then(LocalId::parse)
    }

    /// Find the instance a reference points at, without taking ownership of it.
    ///
    /// Contained links and `#tok` strings are looked up in this resource's contained set.
    pub fn resolve<'a>(&'a self, reference: &'a Reference) -> Option<&'a Arc<Resource>> {
        match &reference.target {
            Some(ResourceLink::Resource(r)) => Some(r),
            Some(ResourceLink::Contained(id)) => self.contained.get(id.token()),
            None => reference
                .local_token()
                .and_then(|tok| self.contained.get(tok)),
        }
    }
}

/// One entry of a [`ContainedResources`] set.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainedResource {
    pub local_id: LocalId,
    pub resource: Arc<Resource>,
}

/// Resources inlined into their owner, in insertion order.
///
/// Membership is by identity: the same `Arc` is never added twice, two structurally
/// equal resources in different allocations are distinct entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContainedResources {
    entries: Vec<ContainedResource>,
}

impl ContainedResources {
    pub fn get(&self, token: &str) -> Option<&Arc<Resource>> {
        self.entries
            .iter()
            .find(|e| e.local_id.token() == token)
            .map(|e| &e.resource)
    }

    pub fn find_by_identity(&self, resource: &Arc<Resource>) -> Option<&LocalId> {
        self.entries
            .iter()
            .find(|e| Arc::ptr_eq(&e.resource, resource))
            .map(|e| &e.local_id)
    }

    pub fn contains_id(&self, token: &str) -> bool {
        self.entries.iter().any(|e| e.local_id.token() == token)
    }

    pub fn push(&mut self, local_id: LocalId, resource: Arc<Resource>) -> Result<()> {
        if self.contains_id(local_id.token()) {
            return Err(Error::DuplicateLocalId(local_id.token().to_string()));
        }
        self.entries.push(ContainedResource { local_id, resource });
        Ok(())
    }

    /// Drop every entry so the next encode re-runs containment from scratch.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Lowest positive integer not already used as a token.
    pub fn next_free_id(&self) -> LocalId {
        let used: BTreeSet<u64> = self
            .entries
            .iter()
            .filter_map(|e| e.local_id.token().parse().ok())
            .collect();
        let mut n = 1;
        while used.contains(&n) {
            n += 1;
        }
        LocalId::new(n.to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContainedResource> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a ContainedResources {
    type Item = &'a ContainedResource;
    type IntoIter = std::slice::Iter<'a, ContainedResource>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
