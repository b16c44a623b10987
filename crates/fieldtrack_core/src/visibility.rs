//! Role-based visibility resolution for tasks and objects.
//!
//! # Responsibility
//! - Classify an actor into one visibility role from current org state.
//! - Render each role into a storage predicate consumed by the filter
//!   pipeline.
//!
//! # Invariants
//! - Every task predicate is wrapped in `deleted = 0`; a tombstoned task is
//!   invisible to everyone, its creator included.
//! - Every role clause is unioned with "tasks created by the actor".
//! - Predicates use correlated EXISTS subqueries only, so result rows are
//!   already deduplicated.

use crate::db::DbError;
use crate::model::{Actor, ActorId, DepartmentId, EngineerId, TaskId};
use crate::repo::org_repo::{OrgRepoError, OrgRepository, SqliteOrgRepository};
use crate::repo::SqlPredicate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type VisibilityResult<T> = Result<T, VisibilityError>;

/// Errors from visibility resolution.
#[derive(Debug)]
pub enum VisibilityError {
    Db(DbError),
    /// The actor id does not exist; callers pass authenticated actors only.
    UnknownActor(ActorId),
    Org(OrgRepoError),
}

impl Display for VisibilityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UnknownActor(id) => write!(f, "unknown actor: {id}"),
            Self::Org(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VisibilityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::UnknownActor(_) => None,
            Self::Org(err) => Some(err),
        }
    }
}

impl From<DbError> for VisibilityError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for VisibilityError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<OrgRepoError> for VisibilityError {
    fn from(value: OrgRepoError) -> Self {
        Self::Org(value)
    }
}

/// Resolved task-visibility role for one actor.
///
/// Rules are checked in precedence order: superuser, head of department,
/// department member, solo engineer, creator-only fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskVisibility {
    /// All non-deleted tasks.
    Superuser { actor_id: ActorId },
    /// Department tasks, department members' tasks, and tasks created by
    /// department members.
    DepartmentHead {
        actor_id: ActorId,
        department_id: DepartmentId,
    },
    /// Own assignments and direct department assignments.
    DepartmentMember {
        actor_id: ActorId,
        engineer_id: EngineerId,
        department_id: DepartmentId,
    },
    /// Own assignments only.
    SoloEngineer {
        actor_id: ActorId,
        engineer_id: EngineerId,
    },
    /// No engineer profile: only self-created tasks.
    CreatorOnly { actor_id: ActorId },
}

impl TaskVisibility {
    pub fn actor_id(&self) -> ActorId {
        match *self {
            Self::Superuser { actor_id }
            | Self::DepartmentHead { actor_id, .. }
            | Self::DepartmentMember { actor_id, .. }
            | Self::SoloEngineer { actor_id, .. }
            | Self::CreatorOnly { actor_id } => actor_id,
        }
    }
}

/// Classifies the actor into a [`TaskVisibility`] role.
///
/// Pure read of org state; never fails for an authenticated actor. An actor
/// without an engineer profile legitimately resolves to `CreatorOnly`.
pub fn resolve_task_visibility(
    conn: &Connection,
    actor_id: ActorId,
) -> VisibilityResult<TaskVisibility> {
    let org = SqliteOrgRepository::new(conn);
    let actor = org
        .get_actor(actor_id)?
        .ok_or(VisibilityError::UnknownActor(actor_id))?;

    if actor.is_superuser {
        return Ok(TaskVisibility::Superuser { actor_id });
    }

    let engineer = org.engineer_for_actor(actor_id)?;
    Ok(match engineer {
        Some(engineer) => match engineer.department_id {
            Some(department_id) if engineer.head_of_department => TaskVisibility::DepartmentHead {
                actor_id,
                department_id,
            },
            Some(department_id) => TaskVisibility::DepartmentMember {
                actor_id,
                engineer_id: engineer.id,
                department_id,
            },
            None => TaskVisibility::SoloEngineer {
                actor_id,
                engineer_id: engineer.id,
            },
        },
        None => TaskVisibility::CreatorOnly { actor_id },
    })
}

/// Renders a visibility role into a WHERE fragment over `tasks t`.
pub fn task_visibility_predicate(visibility: &TaskVisibility) -> SqlPredicate {
    match *visibility {
        TaskVisibility::Superuser { .. } => SqlPredicate::new("t.deleted = 0", Vec::new()),
        TaskVisibility::DepartmentHead {
            actor_id,
            department_id,
        } => SqlPredicate::new(
            "t.deleted = 0 AND (
                EXISTS(
                    SELECT 1 FROM tasks_departments td
                    WHERE td.task_id = t.id AND td.department_id = ?
                )
                OR EXISTS(
                    SELECT 1 FROM tasks_engineers te
                    INNER JOIN engineers e ON e.id = te.engineer_id
                    WHERE te.task_id = t.id AND e.department_id = ?
                )
                OR t.creator_id IN (
                    SELECT e2.actor_id FROM engineers e2
                    WHERE e2.department_id = ? AND e2.actor_id IS NOT NULL
                )
                OR t.creator_id = ?
            )",
            vec![
                Value::Integer(department_id),
                Value::Integer(department_id),
                Value::Integer(department_id),
                Value::Integer(actor_id),
            ],
        ),
        TaskVisibility::DepartmentMember {
            actor_id,
            engineer_id,
            department_id,
        } => SqlPredicate::new(
            "t.deleted = 0 AND (
                EXISTS(
                    SELECT 1 FROM tasks_engineers te
                    WHERE te.task_id = t.id AND te.engineer_id = ?
                )
                OR EXISTS(
                    SELECT 1 FROM tasks_departments td
                    WHERE td.task_id = t.id AND td.department_id = ?
                )
                OR t.creator_id = ?
            )",
            vec![
                Value::Integer(engineer_id),
                Value::Integer(department_id),
                Value::Integer(actor_id),
            ],
        ),
        TaskVisibility::SoloEngineer {
            actor_id,
            engineer_id,
        } => SqlPredicate::new(
            "t.deleted = 0 AND (
                EXISTS(
                    SELECT 1 FROM tasks_engineers te
                    WHERE te.task_id = t.id AND te.engineer_id = ?
                )
                OR t.creator_id = ?
            )",
            vec![Value::Integer(engineer_id), Value::Integer(actor_id)],
        ),
        TaskVisibility::CreatorOnly { actor_id } => SqlPredicate::new(
            "t.deleted = 0 AND t.creator_id = ?",
            vec![Value::Integer(actor_id)],
        ),
    }
}

/// Renders object visibility over `objects o`: superusers see everything,
/// everyone else needs membership in at least one of the object's groups.
pub fn object_visibility_predicate(actor: &Actor) -> SqlPredicate {
    if actor.is_superuser {
        return SqlPredicate::new("1 = 1", Vec::new());
    }
    SqlPredicate::new(
        "EXISTS(
            SELECT 1 FROM objects_groups og
            INNER JOIN actors_object_groups ag ON ag.group_id = og.group_id
            WHERE og.object_id = o.id AND ag.actor_id = ?
        )",
        vec![Value::Integer(actor.id)],
    )
}

/// Lists the ids of all tasks visible to an actor, ordered by id.
///
/// Convenience entry point for callers that need the raw base set rather
/// than a filtered page.
pub fn visible_task_ids(conn: &Connection, actor_id: ActorId) -> VisibilityResult<Vec<TaskId>> {
    let visibility = resolve_task_visibility(conn, actor_id)?;
    let predicate = task_visibility_predicate(&visibility);
    let sql = format!(
        "SELECT t.id FROM tasks t WHERE {} ORDER BY t.id ASC;",
        predicate.clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(predicate.binds))?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}
