//! Object (asset/site) domain model.
//!
//! # Invariants
//! - `parent_id` references form a forest; the parent chain of a node must
//!   never revisit the node itself. Enforced at the write boundary, not on
//!   reads.
//! - Read access is gated exclusively by object-group membership.

use crate::model::task::Priority;
use serde::{Deserialize, Serialize};

/// Stable identifier for an object.
pub type ObjectId = i64;
/// Stable identifier for an object group.
pub type ObjectGroupId = i64;

/// Hierarchical asset/site node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: ObjectId,
    pub name: String,
    pub description: String,
    pub priority: Priority,
    /// Parent node. `None` means a root of the forest.
    pub parent_id: Option<ObjectId>,
}

/// Access-control grouping for objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectGroup {
    pub id: ObjectGroupId,
    pub name: String,
}

/// Membership permission level inside an object group.
///
/// Membership of any level grants read visibility; `ReadWrite` additionally
/// marks members allowed to mutate group objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupPermission {
    Read,
    ReadWrite,
}

impl GroupPermission {
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Read => "R",
            Self::ReadWrite => "RW",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "R" => Some(Self::Read),
            "RW" => Some(Self::ReadWrite),
            _ => None,
        }
    }
}
