//! Filter facet construction for list pages.
//!
//! # Responsibility
//! - Build the tag, object, group and engineer facet collections shown next
//!   to each list page.
//! - Cache assembled bundles per actor and page under the facet namespaces.

pub mod bundle;
pub mod tree;

pub use bundle::{get_facets, FacetBundle, FacetError, FacetPage};
pub use tree::{build_engineer_forest, build_forest, EngineerLeaf, Node, TreeRecord};
