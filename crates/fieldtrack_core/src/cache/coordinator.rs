//! Version-addressed cache coordination.
//!
//! # Responsibility
//! - Resolve the current version of each namespace and address entries by
//!   `(namespace, key, version)`.
//! - Bump namespace versions after entity mutations commit.
//! - Degrade to always-miss when the backend is unavailable.
//!
//! # Invariants
//! - Versions start at 1 and only increase; old entries become unreachable
//!   after a bump and age out by TTL.
//! - A cache failure is never surfaced to callers as an error; reads miss
//!   and writes are dropped, with a warn-level log line.

use crate::cache::invalidation::EntityChange;
use crate::cache::store::CacheStore;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Independently versioned cached surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    TasksPage,
    ObjectsPage,
    TaskFilterFacets,
    ObjectFilterFacets,
}

impl CacheNamespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TasksPage => "tasks_page",
            Self::ObjectsPage => "objects_page",
            Self::TaskFilterFacets => "task_filter_facets",
            Self::ObjectFilterFacets => "object_filter_facets",
        }
    }

    fn version_counter(self) -> String {
        format!("{}:version", self.as_str())
    }
}

/// Read/write front over a [`CacheStore`] with namespace versioning.
#[derive(Clone)]
pub struct CacheCoordinator {
    store: Arc<dyn CacheStore>,
}

impl CacheCoordinator {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Current version of a namespace. Backend failure degrades to version
    /// 1, which keeps key addressing deterministic while the store is down.
    pub fn version(&self, namespace: CacheNamespace) -> u64 {
        match self.store.read_counter(&namespace.version_counter()) {
            Ok(version) => version,
            Err(err) => {
                warn!(
                    "event=cache_degraded module=cache status=miss op=version namespace={} reason={err}",
                    namespace.as_str()
                );
                1
            }
        }
    }

    /// Bumps a namespace version, making all current entries unreachable.
    pub fn bump(&self, namespace: CacheNamespace) {
        if let Err(err) = self.store.incr(&namespace.version_counter()) {
            warn!(
                "event=cache_degraded module=cache status=skipped op=bump namespace={} reason={err}",
                namespace.as_str()
            );
        }
    }

    /// Bumps every namespace invalidated by the given entity change.
    pub fn bump_for(&self, change: EntityChange) {
        for namespace in change.bumped_namespaces() {
            self.bump(*namespace);
        }
    }

    /// Fetches a raw entry under the namespace's current version.
    pub fn get(&self, namespace: CacheNamespace, key: &str) -> Option<String> {
        let version = self.version(namespace);
        match self.store.get(&full_key(namespace, key), version) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    "event=cache_degraded module=cache status=miss op=get namespace={} key={key} reason={err}",
                    namespace.as_str()
                );
                None
            }
        }
    }

    /// Stores a raw entry under the namespace's current version.
    pub fn set(&self, namespace: CacheNamespace, key: &str, value: &str, ttl: Duration) {
        let version = self.version(namespace);
        if let Err(err) = self.store.set(&full_key(namespace, key), version, value, ttl) {
            warn!(
                "event=cache_degraded module=cache status=skipped op=set namespace={} key={key} reason={err}",
                namespace.as_str()
            );
        }
    }

    /// Fetches and deserializes a JSON entry. A deserialization failure is
    /// treated as a miss; the stale entry ages out by TTL.
    pub fn get_json<T: DeserializeOwned>(&self, namespace: CacheNamespace, key: &str) -> Option<T> {
        let raw = self.get(namespace, key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    "event=cache_decode_failed module=cache status=miss namespace={} key={key} reason={err}",
                    namespace.as_str()
                );
                None
            }
        }
    }

    /// Serializes and stores a JSON entry.
    pub fn set_json<T: Serialize>(
        &self,
        namespace: CacheNamespace,
        key: &str,
        value: &T,
        ttl: Duration,
    ) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(namespace, key, &raw, ttl),
            Err(err) => {
                warn!(
                    "event=cache_encode_failed module=cache status=skipped namespace={} key={key} reason={err}",
                    namespace.as_str()
                );
            }
        }
    }
}

fn full_key(namespace: CacheNamespace, key: &str) -> String {
    format!("{}:{key}", namespace.as_str())
}

#[cfg(test)]
mod tests {
    use super::{CacheCoordinator, CacheNamespace};
    use crate::cache::store::{CacheError, CacheResult, CacheStore, MemoryCacheStore};
    use std::sync::Arc;
    use std::time::Duration;

    struct FailingStore;

    impl CacheStore for FailingStore {
        fn get(&self, _key: &str, _version: u64) -> CacheResult<Option<String>> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        fn set(
            &self,
            _key: &str,
            _version: u64,
            _value: &str,
            _ttl: Duration,
        ) -> CacheResult<()> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        fn incr(&self, _counter: &str) -> CacheResult<u64> {
            Err(CacheError::Unavailable("down".to_string()))
        }
        fn read_counter(&self, _counter: &str) -> CacheResult<u64> {
            Err(CacheError::Unavailable("down".to_string()))
        }
    }

    #[test]
    fn bump_hides_entries_written_under_old_version() {
        let cache = CacheCoordinator::new(Arc::new(MemoryCacheStore::new()));
        cache.set(
            CacheNamespace::TasksPage,
            "1:1",
            "page-body",
            Duration::from_secs(60),
        );
        assert_eq!(
            cache.get(CacheNamespace::TasksPage, "1:1"),
            Some("page-body".to_string())
        );

        cache.bump(CacheNamespace::TasksPage);
        assert_eq!(cache.get(CacheNamespace::TasksPage, "1:1"), None);
    }

    #[test]
    fn namespaces_version_independently() {
        let cache = CacheCoordinator::new(Arc::new(MemoryCacheStore::new()));
        cache.set(
            CacheNamespace::ObjectsPage,
            "1:1",
            "objects",
            Duration::from_secs(60),
        );
        cache.bump(CacheNamespace::TasksPage);
        assert_eq!(
            cache.get(CacheNamespace::ObjectsPage, "1:1"),
            Some("objects".to_string())
        );
    }

    #[test]
    fn unavailable_store_degrades_to_always_miss() {
        let cache = CacheCoordinator::new(Arc::new(FailingStore));
        cache.set(CacheNamespace::TasksPage, "1:1", "x", Duration::from_secs(60));
        assert_eq!(cache.get(CacheNamespace::TasksPage, "1:1"), None);
        assert_eq!(cache.version(CacheNamespace::TasksPage), 1);
        // Bump is a no-op but must not panic or error.
        cache.bump(CacheNamespace::TasksPage);
    }

    #[test]
    fn json_round_trip() {
        let cache = CacheCoordinator::new(Arc::new(MemoryCacheStore::new()));
        let value = vec![3_i64, 1, 2];
        cache.set_json(
            CacheNamespace::TaskFilterFacets,
            "filter_components:tasks:7",
            &value,
            Duration::from_secs(60),
        );
        let loaded: Option<Vec<i64>> =
            cache.get_json(CacheNamespace::TaskFilterFacets, "filter_components:tasks:7");
        assert_eq!(loaded, Some(value));
    }
}
