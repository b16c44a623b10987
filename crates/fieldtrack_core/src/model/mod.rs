//! Domain models shared across repositories and services.
//!
//! # Responsibility
//! - Define canonical read models for org, task and object aggregates.
//! - Keep serialization names aligned with storage column names.

pub mod actor;
pub mod object;
pub mod task;

pub use actor::{Actor, ActorId, Department, DepartmentId, Engineer, EngineerId};
pub use object::{GroupPermission, ObjectGroup, ObjectGroupId, ObjectId, ObjectRecord};
pub use task::{Comment, CommentId, Priority, Tag, TagId, Task, TaskId};
