//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and assignment APIs over the `tasks` aggregate.
//! - Own transactional whole-set replacement for m2m assignment links.
//!
//! # Invariants
//! - `creator_id` is never updated after insert.
//! - Assignment replacement reports the engineer diff so callers can emit
//!   domain events; it issues plain statements, and the owning service
//!   wraps it in one transaction together with its dependent writes.
//! - Tasks are only ever tombstoned, never removed.

use crate::db::DbError;
use crate::model::{
    Comment, DepartmentId, EngineerId, ObjectId, Priority, TagId, Task, TaskId,
};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    priority,
    is_done,
    deleted,
    completion_time,
    create_time,
    header,
    text,
    completion_text,
    creator_id
FROM tasks";

pub type TaskRepoResult<T> = Result<T, TaskRepoError>;

/// Errors from task persistence and query operations.
#[derive(Debug)]
pub enum TaskRepoError {
    Db(DbError),
    NotFound(TaskId),
    InvalidData(String),
}

impl Display for TaskRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
        }
    }
}

impl Error for TaskRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for TaskRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for TaskRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Fields required to create a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub priority: Option<Priority>,
    pub completion_time: Option<i64>,
    pub header: String,
    pub text: String,
    pub creator_id: i64,
    pub engineer_ids: Vec<EngineerId>,
    pub department_ids: Vec<DepartmentId>,
    pub tag_ids: Vec<TagId>,
    pub object_ids: Vec<ObjectId>,
}

/// Engineer-level difference produced by assignment replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssigneeDiff {
    pub added_engineers: Vec<EngineerId>,
    pub removed_engineers: Vec<EngineerId>,
}

/// Repository interface for task operations.
pub trait TaskRepository {
    /// Creates one task with its initial assignment/tag/object links.
    fn create_task(&self, new: &NewTask) -> TaskRepoResult<Task>;
    fn get_task(&self, id: TaskId, include_deleted: bool) -> TaskRepoResult<Option<Task>>;
    fn set_done(&self, id: TaskId, is_done: bool) -> TaskRepoResult<()>;
    fn soft_delete_task(&self, id: TaskId) -> TaskRepoResult<()>;
    /// Appends one line to the task's append-only action log.
    fn append_event_log(&self, id: TaskId, line: &str) -> TaskRepoResult<()>;
    /// Adds one engineer assignment; a no-op when already assigned.
    fn add_engineer(&self, id: TaskId, engineer_id: EngineerId) -> TaskRepoResult<bool>;
    /// Replaces engineer and department assignments.
    ///
    /// Multi-statement; callers combine it with their dependent writes
    /// inside one transaction.
    fn set_assignees(
        &self,
        id: TaskId,
        engineer_ids: &[EngineerId],
        department_ids: &[DepartmentId],
    ) -> TaskRepoResult<AssigneeDiff>;
    fn engineers_for_task(&self, id: TaskId) -> TaskRepoResult<Vec<EngineerId>>;
    fn add_comment(&self, id: TaskId, author_id: i64, text: &str) -> TaskRepoResult<Comment>;
    fn list_comments(&self, id: TaskId) -> TaskRepoResult<Vec<Comment>>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, new: &NewTask) -> TaskRepoResult<Task> {
        let priority = new.priority.unwrap_or(Priority::Medium);
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO tasks (
                priority,
                is_done,
                deleted,
                completion_time,
                header,
                text,
                creator_id
            ) VALUES (?1, 0, 0, ?2, ?3, ?4, ?5);",
            params![
                priority.as_db(),
                new.completion_time,
                new.header,
                new.text,
                new.creator_id,
            ],
        )?;
        let task_id = tx.last_insert_rowid();

        for engineer_id in &new.engineer_ids {
            tx.execute(
                "INSERT OR IGNORE INTO tasks_engineers (task_id, engineer_id) VALUES (?1, ?2);",
                params![task_id, engineer_id],
            )?;
        }
        for department_id in &new.department_ids {
            tx.execute(
                "INSERT OR IGNORE INTO tasks_departments (task_id, department_id) VALUES (?1, ?2);",
                params![task_id, department_id],
            )?;
        }
        for tag_id in &new.tag_ids {
            tx.execute(
                "INSERT OR IGNORE INTO tasks_tags (task_id, tag_id) VALUES (?1, ?2);",
                params![task_id, tag_id],
            )?;
        }
        for object_id in &new.object_ids {
            tx.execute(
                "INSERT OR IGNORE INTO objects_tasks (object_id, task_id) VALUES (?1, ?2);",
                params![object_id, task_id],
            )?;
        }
        tx.commit()?;

        load_required_task(self.conn, task_id)
    }

    fn get_task(&self, id: TaskId, include_deleted: bool) -> TaskRepoResult<Option<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR deleted = 0);"
        ))?;
        let mut rows = stmt.query(params![id, i64::from(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn set_done(&self, id: TaskId, is_done: bool) -> TaskRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET is_done = ?2
             WHERE id = ?1
               AND deleted = 0;",
            params![id, i64::from(is_done)],
        )?;
        if changed == 0 {
            return Err(TaskRepoError::NotFound(id));
        }
        Ok(())
    }

    fn soft_delete_task(&self, id: TaskId) -> TaskRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET deleted = 1
             WHERE id = ?1
               AND deleted = 0;",
            [id],
        )?;
        if changed == 0 {
            return Err(TaskRepoError::NotFound(id));
        }
        Ok(())
    }

    fn append_event_log(&self, id: TaskId, line: &str) -> TaskRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET completion_text = completion_text || ?2
             WHERE id = ?1;",
            params![id, line],
        )?;
        if changed == 0 {
            return Err(TaskRepoError::NotFound(id));
        }
        Ok(())
    }

    fn add_engineer(&self, id: TaskId, engineer_id: EngineerId) -> TaskRepoResult<bool> {
        if self.get_task(id, false)?.is_none() {
            return Err(TaskRepoError::NotFound(id));
        }
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO tasks_engineers (task_id, engineer_id) VALUES (?1, ?2);",
            params![id, engineer_id],
        )?;
        Ok(inserted > 0)
    }

    fn set_assignees(
        &self,
        id: TaskId,
        engineer_ids: &[EngineerId],
        department_ids: &[DepartmentId],
    ) -> TaskRepoResult<AssigneeDiff> {
        if self.get_task(id, false)?.is_none() {
            return Err(TaskRepoError::NotFound(id));
        }

        let before: BTreeSet<EngineerId> = self.engineers_for_task(id)?.into_iter().collect();
        let after: BTreeSet<EngineerId> = engineer_ids.iter().copied().collect();

        self.conn
            .execute("DELETE FROM tasks_engineers WHERE task_id = ?1;", [id])?;
        self.conn
            .execute("DELETE FROM tasks_departments WHERE task_id = ?1;", [id])?;
        for engineer_id in &after {
            self.conn.execute(
                "INSERT INTO tasks_engineers (task_id, engineer_id) VALUES (?1, ?2);",
                params![id, engineer_id],
            )?;
        }
        let departments: BTreeSet<DepartmentId> = department_ids.iter().copied().collect();
        for department_id in &departments {
            self.conn.execute(
                "INSERT INTO tasks_departments (task_id, department_id) VALUES (?1, ?2);",
                params![id, department_id],
            )?;
        }

        Ok(AssigneeDiff {
            added_engineers: after.difference(&before).copied().collect(),
            removed_engineers: before.difference(&after).copied().collect(),
        })
    }

    fn engineers_for_task(&self, id: TaskId) -> TaskRepoResult<Vec<EngineerId>> {
        let mut stmt = self.conn.prepare(
            "SELECT engineer_id
             FROM tasks_engineers
             WHERE task_id = ?1
             ORDER BY engineer_id ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    fn add_comment(&self, id: TaskId, author_id: i64, text: &str) -> TaskRepoResult<Comment> {
        if self.get_task(id, false)?.is_none() {
            return Err(TaskRepoError::NotFound(id));
        }
        self.conn.execute(
            "INSERT INTO comments (task_id, author_id, text) VALUES (?1, ?2, ?3);",
            params![id, author_id, text],
        )?;
        let comment_id = self.conn.last_insert_rowid();
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, author_id, text, created_at
             FROM comments
             WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([comment_id])?;
        if let Some(row) = rows.next()? {
            return parse_comment_row(row);
        }
        Err(TaskRepoError::InvalidData(format!(
            "comment {comment_id} missing after insert"
        )))
    }

    fn list_comments(&self, id: TaskId) -> TaskRepoResult<Vec<Comment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, author_id, text, created_at
             FROM comments
             WHERE task_id = ?1
             ORDER BY created_at ASC, id ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut comments = Vec::new();
        while let Some(row) = rows.next()? {
            comments.push(parse_comment_row(row)?);
        }
        Ok(comments)
    }
}

fn load_required_task(conn: &Connection, id: TaskId) -> TaskRepoResult<Task> {
    let mut stmt = conn.prepare(&format!(
        "{TASK_SELECT_SQL}
         WHERE id = ?1;"
    ))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return parse_task_row(row);
    }
    Err(TaskRepoError::NotFound(id))
}

fn parse_task_row(row: &Row<'_>) -> TaskRepoResult<Task> {
    let priority_text: String = row.get("priority")?;
    let priority = Priority::parse(&priority_text).ok_or_else(|| {
        TaskRepoError::InvalidData(format!(
            "invalid priority `{priority_text}` in tasks.priority"
        ))
    })?;

    Ok(Task {
        id: row.get("id")?,
        priority,
        is_done: int_to_bool(row.get("is_done")?, "tasks.is_done")?,
        deleted: int_to_bool(row.get("deleted")?, "tasks.deleted")?,
        completion_time: row.get("completion_time")?,
        create_time: row.get("create_time")?,
        header: row.get("header")?,
        text: row.get("text")?,
        completion_text: row.get("completion_text")?,
        creator_id: row.get("creator_id")?,
    })
}

fn parse_comment_row(row: &Row<'_>) -> TaskRepoResult<Comment> {
    Ok(Comment {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        author_id: row.get("author_id")?,
        text: row.get("text")?,
        created_at: row.get("created_at")?,
    })
}

fn int_to_bool(value: i64, column: &'static str) -> TaskRepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(TaskRepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
