//! Entity-change to cache-namespace invalidation mapping.
//!
//! # Responsibility
//! - Declare, in one place, which cached surfaces each entity mutation
//!   makes stale.
//!
//! # Invariants
//! - The mapping is total: every entity kind resolves to at least one
//!   namespace. A mutation that bumps nothing is a staleness bug.

use crate::cache::coordinator::CacheNamespace;

/// Kind of entity a committed mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityChange {
    Task,
    Object,
    Tag,
    Engineer,
    Department,
    ObjectGroup,
    Comment,
}

impl EntityChange {
    /// Namespaces whose version must be bumped after this change commits.
    pub fn bumped_namespaces(self) -> &'static [CacheNamespace] {
        match self {
            Self::Task => &[CacheNamespace::TasksPage, CacheNamespace::ObjectsPage],
            Self::Object => &[
                CacheNamespace::ObjectsPage,
                CacheNamespace::TaskFilterFacets,
            ],
            Self::Tag => &[
                CacheNamespace::TaskFilterFacets,
                CacheNamespace::ObjectFilterFacets,
            ],
            Self::Engineer => &[CacheNamespace::TaskFilterFacets],
            Self::Department => &[CacheNamespace::TaskFilterFacets],
            Self::ObjectGroup => &[CacheNamespace::ObjectFilterFacets],
            Self::Comment => &[CacheNamespace::TasksPage, CacheNamespace::ObjectsPage],
        }
    }
}
