//! Actor, engineer and department models.
//!
//! # Invariants
//! - An engineer's `actor_id` link is immutable after creation.
//! - An engineer belongs to at most one department.

use serde::{Deserialize, Serialize};

/// Stable identifier for an authenticated actor.
pub type ActorId = i64;
/// Stable identifier for an engineer profile.
pub type EngineerId = i64;
/// Stable identifier for a department.
pub type DepartmentId = i64;

/// Authenticated identity issuing requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub username: String,
    pub is_superuser: bool,
}

/// Operational profile of an actor.
///
/// Engineers carry the role information that drives task visibility:
/// department membership and the head-of-department flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engineer {
    pub id: EngineerId,
    pub first_name: String,
    pub second_name: String,
    pub position: Option<String>,
    /// Originating actor. `None` for profiles without a login.
    pub actor_id: Option<ActorId>,
    pub department_id: Option<DepartmentId>,
    pub head_of_department: bool,
}

impl Engineer {
    /// User-facing display name.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.second_name)
    }
}

/// Grouping of engineers; directly assignable to tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
}
