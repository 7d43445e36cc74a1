//! Per-workspace memoized views.
//!
//! One entry per workspace key (`""` is the public scope) in each of four
//! caches. Entries are computed atomically per key and shared as `Arc`s.
//! Expiry is only a backstop; mutations invalidate explicitly.
//!
//! An invalidation does not cancel a load already in flight, so every
//! invalidation bumps a generation counter. A load that finishes under a
//! newer generation than it started with drops its own entry again; its
//! callers still get the value once.

use crate::client_api::ClientApiOntology;
use crate::config::RepositoryConfig;
use crate::error::{OntologyError, Result};
use crate::model::{Concept, OntologyProperty, Relationship};
use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const PUBLIC_CACHE_KEY: &str = "";

pub fn cache_key(workspace: Option<&str>) -> String {
    workspace.unwrap_or(PUBLIC_CACHE_KEY).to_string()
}

pub(crate) struct OntologyCache {
    concepts: Cache<String, Arc<Vec<Concept>>>,
    properties: Cache<String, Arc<Vec<OntologyProperty>>>,
    relationships: Cache<String, Arc<Vec<Relationship>>>,
    client_api: Cache<String, Arc<ClientApiOntology>>,
    generation: AtomicU64,
}

fn build<V: Clone + Send + Sync + 'static>(config: &RepositoryConfig) -> Cache<String, V> {
    Cache::builder()
        .max_capacity(config.cache_max_capacity)
        .time_to_live(config.cache_ttl())
        .build()
}

impl OntologyCache {
    pub(crate) fn new(config: &RepositoryConfig) -> Self {
        Self {
            concepts: build(config),
            properties: build(config),
            relationships: build(config),
            client_api: build(config),
            generation: AtomicU64::new(0),
        }
    }

    fn load<V, F>(&self, cache: &Cache<String, V>, workspace: Option<&str>, loader: F) -> Result<V>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<V>,
    {
        let key = cache_key(workspace);
        let started = self.generation.load(Ordering::Acquire);
        let value = cache
            .try_get_with(key.clone(), loader)
            .map_err(|e: Arc<OntologyError>| (*e).clone())?;
        if self.generation.load(Ordering::Acquire) != started {
            tracing::debug!(workspace = %key, "ontology view invalidated while loading");
            cache.invalidate(&key);
        }
        Ok(value)
    }

    pub(crate) fn concepts(
        &self,
        workspace: Option<&str>,
        loader: impl FnOnce() -> Result<Vec<Concept>>,
    ) -> Result<Arc<Vec<Concept>>> {
        self.load(&self.concepts, workspace, || loader().map(Arc::new))
    }

    pub(crate) fn properties(
        &self,
        workspace: Option<&str>,
        loader: impl FnOnce() -> Result<Vec<OntologyProperty>>,
    ) -> Result<Arc<Vec<OntologyProperty>>> {
        self.load(&self.properties, workspace, || loader().map(Arc::new))
    }

    pub(crate) fn relationships(
        &self,
        workspace: Option<&str>,
        loader: impl FnOnce() -> Result<Vec<Relationship>>,
    ) -> Result<Arc<Vec<Relationship>>> {
        self.load(&self.relationships, workspace, || loader().map(Arc::new))
    }

    pub(crate) fn client_api(
        &self,
        workspace: Option<&str>,
        loader: impl FnOnce() -> Result<ClientApiOntology>,
    ) -> Result<Arc<ClientApiOntology>> {
        self.load(&self.client_api, workspace, || loader().map(Arc::new))
    }

    /// Public data feeds every workspace view, so a public change drops all.
    pub(crate) fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.concepts.invalidate_all();
        self.properties.invalidate_all();
        self.relationships.invalidate_all();
        self.client_api.invalidate_all();
    }

    pub(crate) fn invalidate(&self, workspace: &str) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let key = workspace.to_string();
        self.concepts.invalidate(&key);
        self.properties.invalidate(&key);
        self.relationships.invalidate(&key);
        self.client_api.invalidate(&key);
    }

    #[cfg(test)]
    fn is_cached(&self, workspace: Option<&str>) -> bool {
        self.concepts.contains_key(&cache_key(workspace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn loads_once_per_key_until_invalidated() {
        let cache = OntologyCache::new(&RepositoryConfig::default());
        let calls = AtomicUsize::new(0);
        let loader = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        };

        cache.concepts(Some("ws"), loader).unwrap();
        cache.concepts(Some("ws"), loader).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.concepts(None, loader).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.invalidate("ws");
        assert!(!cache.is_cached(Some("ws")));
        assert!(cache.is_cached(None));
        cache.concepts(Some("ws"), loader).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        cache.invalidate_all();
        assert!(!cache.is_cached(None));
    }

    #[test]
    fn view_invalidated_during_its_load_is_not_kept() {
        let cache = OntologyCache::new(&RepositoryConfig::default());
        let calls = AtomicUsize::new(0);

        // a write lands while the view is being computed
        cache
            .concepts(Some("ws"), || {
                calls.fetch_add(1, Ordering::SeqCst);
                cache.invalidate("other");
                Ok(Vec::new())
            })
            .unwrap();
        assert!(!cache.is_cached(Some("ws")));

        let loader = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        };
        cache.concepts(Some("ws"), loader).unwrap();
        assert!(cache.is_cached(Some("ws")));
        cache.concepts(Some("ws"), loader).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn loader_errors_are_not_cached() {
        let cache = OntologyCache::new(&RepositoryConfig::default());
        let err = cache
            .properties(None, || Err(OntologyError::Corruption("boom".into())))
            .unwrap_err();
        assert_eq!(err, OntologyError::Corruption("boom".into()));
        assert!(cache.properties(None, || Ok(Vec::new())).is_ok());
    }
}
