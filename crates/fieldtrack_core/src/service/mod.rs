//! Application services over repositories, visibility and cache.
//!
//! # Responsibility
//! - Compose repository writes, domain events, notifications and cache
//!   bumps into whole use-case operations.
//! - Serve cached list pages keyed per actor.

use crate::db::DbError;
use crate::filter::PipelineError;
use crate::model::ActorId;
use crate::repo::object_repo::ObjectRepoError;
use crate::repo::org_repo::OrgRepoError;
use crate::repo::task_repo::TaskRepoError;
use crate::visibility::VisibilityError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod events;
pub mod object_actions;
pub mod object_pages;
pub mod org_actions;
pub mod task_actions;
pub mod task_pages;

pub use events::{DomainEvent, NotificationSink, NullNotificationSink, SqliteNotificationSink};
pub use object_pages::{ObjectFilterParams, ObjectListItem, ObjectPage};
pub use task_pages::{get_task_page, TaskPageEnvelope};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from service-level operations.
#[derive(Debug)]
pub enum ServiceError {
    Db(DbError),
    Task(TaskRepoError),
    Object(ObjectRepoError),
    Org(OrgRepoError),
    Visibility(VisibilityError),
    Pipeline(PipelineError),
    /// The actor lacks the engineer profile this operation requires.
    NoEngineer(ActorId),
    /// The actor may not perform this operation on this record.
    PermissionDenied {
        actor_id: ActorId,
        action: &'static str,
    },
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Task(err) => write!(f, "{err}"),
            Self::Object(err) => write!(f, "{err}"),
            Self::Org(err) => write!(f, "{err}"),
            Self::Visibility(err) => write!(f, "{err}"),
            Self::Pipeline(err) => write!(f, "{err}"),
            Self::NoEngineer(actor_id) => {
                write!(f, "actor {actor_id} has no engineer profile")
            }
            Self::PermissionDenied { actor_id, action } => {
                write!(f, "actor {actor_id} may not {action}")
            }
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Task(err) => Some(err),
            Self::Object(err) => Some(err),
            Self::Org(err) => Some(err),
            Self::Visibility(err) => Some(err),
            Self::Pipeline(err) => Some(err),
            Self::NoEngineer(_) | Self::PermissionDenied { .. } => None,
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<TaskRepoError> for ServiceError {
    fn from(value: TaskRepoError) -> Self {
        Self::Task(value)
    }
}

impl From<ObjectRepoError> for ServiceError {
    fn from(value: ObjectRepoError) -> Self {
        Self::Object(value)
    }
}

impl From<OrgRepoError> for ServiceError {
    fn from(value: OrgRepoError) -> Self {
        Self::Org(value)
    }
}

impl From<VisibilityError> for ServiceError {
    fn from(value: VisibilityError) -> Self {
        Self::Visibility(value)
    }
}

impl From<PipelineError> for ServiceError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(value)
    }
}
