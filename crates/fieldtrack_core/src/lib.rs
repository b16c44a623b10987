//! Core domain logic for FieldTrack.
//! This crate is the single source of truth for business invariants.

pub mod cache;
pub mod db;
pub mod facets;
pub mod filter;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod visibility;

pub use cache::{CacheCoordinator, CacheNamespace, CacheStore, EntityChange, MemoryCacheStore};
pub use facets::{get_facets, FacetBundle, FacetPage};
pub use filter::{apply, PipelineInput, TaskFilterParams, TaskCounts, TaskPage};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{Actor, Department, Engineer, ObjectRecord, Priority, Tag, Task};
pub use service::{get_task_page, NotificationSink, ServiceError, TaskPageEnvelope};
pub use visibility::{resolve_task_visibility, TaskVisibility};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
