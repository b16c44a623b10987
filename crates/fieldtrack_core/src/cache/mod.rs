//! Versioned cache invalidation layer.
//!
//! # Responsibility
//! - Address cached page and facet payloads by `(namespace, key, version)`.
//! - Invalidate by bumping namespace versions instead of deleting entries.
//! - Keep the system correct, if slower, when the cache backend is down.

pub mod coordinator;
pub mod invalidation;
pub mod store;

pub use coordinator::{CacheCoordinator, CacheNamespace};
pub use invalidation::EntityChange;
pub use store::{CacheError, CacheResult, CacheStore, MemoryCacheStore};
