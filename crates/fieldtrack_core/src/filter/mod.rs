//! Composable task filtering and ordering.
//!
//! # Responsibility
//! - Parse request parameters into one typed struct at the boundary.
//! - Narrow a visible base set with conjunctive facet predicates, compute
//!   pre-toggle summary counts, then order and paginate.

pub mod params;
pub mod pipeline;

pub use params::{AssigneeToken, SortOrder, TaskFilterParams};
pub use pipeline::{apply, PipelineError, PipelineInput, TaskCounts, TaskPage};
