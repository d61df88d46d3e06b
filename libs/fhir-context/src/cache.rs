//! Caller-owned registry cache
//!
//! Building a registry walks the whole catalog, so callers that work with several
//! versions keep one [`RegistryCache`] and share the registries it hands out. Each
//! version is built at most once; afterwards every lookup is a read.

use crate::catalog::{BuiltinCatalogs, TypeCatalogProvider};
use crate::error::Result;
use crate::registry::Registry;
use crate::version::FhirVersion;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

pub struct RegistryCache<P: TypeCatalogProvider = BuiltinCatalogs> {
    provider: P,
    registries: RwLock<HashMap<FhirVersion, Arc<Registry>>>,
}

impl RegistryCache<BuiltinCatalogs> {
    /// A cache over the built-in catalogs.
    pub fn builtin() -> Self {
        Self::new(BuiltinCatalogs)
    }
}

impl Default for RegistryCache<BuiltinCatalogs> {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<P: TypeCatalogProvider> RegistryCache<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            registries: RwLock::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The registry for `version`, building it on first use.
    pub fn get(&self, version: FhirVersion) -> Result<Arc<Registry>> {
        if let Some(hit) = self
            .registries
            .read()
            .ok()
            .and_then(|m| m.get(&version).cloned())
        {
            return Ok(hit);
        }

        // Build under the write lock so concurrent first calls build once
        let mut registries = self
            .registries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = registries.get(&version) {
            return Ok(hit.clone());
        }

        let catalog = self.provider.catalog(version)?;
        let registry = Arc::new(Registry::build(&catalog)?);
        tracing::debug!(%version, "cached registry");
        registries.insert(version, registry.clone());
        Ok(registry)
    }

    /// Versions built so far.
    pub fn cached_versions(&self) -> Vec<FhirVersion> {
        let registries = self
            .registries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut versions: Vec<_> = registries.keys().copied().collect();
        versions.sort();
        versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeCatalog;
    use crate::error::ConfigurationError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider(AtomicUsize);

    impl TypeCatalogProvider for CountingProvider {
        fn catalog(&self, version: FhirVersion) -> Result<TypeCatalog> {
            self.0.fetch_add(1, Ordering::SeqCst);
            TypeCatalog::builtin(version)
        }
    }

    #[test]
    fn builds_each_version_once() {
        let cache = RegistryCache::new(CountingProvider(AtomicUsize::new(0)));

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| cache.get(FhirVersion::R4).unwrap());
            }
        });
        let a = cache.get(FhirVersion::R4).unwrap();
        let b = cache.get(FhirVersion::R4).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.provider().0.load(Ordering::SeqCst), 1);

        cache.get(FhirVersion::Dstu2).unwrap();
        assert_eq!(cache.cached_versions(), vec![FhirVersion::Dstu2, FhirVersion::R4]);
    }

    #[test]
    fn failed_builds_are_not_cached() {
        let cache = RegistryCache::builtin();
        assert_eq!(
            cache.get(FhirVersion::Dstu1).unwrap_err(),
            ConfigurationError::UnsupportedVersion(FhirVersion::Dstu1)
        );
        assert!(cache.cached_versions().is_empty());
    }
}
