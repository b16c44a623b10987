//! Object repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide persistence APIs for the hierarchical object forest.
//! - Enforce the parent-chain acyclicity invariant at the write boundary.
//!
//! # Invariants
//! - `set_parent` rejects any assignment whose parent chain would revisit
//!   the node being edited; a cycle is a validation error, never persisted.
//! - Reads assume an acyclic forest and do not re-validate.

use crate::db::DbError;
use crate::model::{ObjectGroupId, ObjectId, ObjectRecord, Priority, TagId, TaskId};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const OBJECT_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    priority,
    parent_id
FROM objects";

pub type ObjectRepoResult<T> = Result<T, ObjectRepoError>;

/// Errors from object persistence operations.
#[derive(Debug)]
pub enum ObjectRepoError {
    Db(DbError),
    NotFound(ObjectId),
    /// Requested parent does not exist.
    ParentNotFound(ObjectId),
    /// The proposed parent chain revisits the edited node.
    ParentCycle {
        object_id: ObjectId,
        parent_id: ObjectId,
    },
    InvalidData(String),
}

impl Display for ObjectRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "object not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent object not found: {id}"),
            Self::ParentCycle {
                object_id,
                parent_id,
            } => write!(
                f,
                "assigning parent {parent_id} to object {object_id} would create a cycle"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted object data: {message}"),
        }
    }
}

impl Error for ObjectRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ObjectRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ObjectRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Fields required to create an object.
#[derive(Debug, Clone, Default)]
pub struct NewObject {
    pub name: String,
    pub description: String,
    pub priority: Option<Priority>,
    pub parent_id: Option<ObjectId>,
    pub group_ids: Vec<ObjectGroupId>,
    pub tag_ids: Vec<TagId>,
}

/// Repository interface for object operations.
pub trait ObjectRepository {
    fn create_object(&self, new: &NewObject) -> ObjectRepoResult<ObjectRecord>;
    fn get_object(&self, id: ObjectId) -> ObjectRepoResult<Option<ObjectRecord>>;
    /// Re-parents one object after validating the chain stays acyclic.
    fn set_parent(&self, id: ObjectId, parent_id: Option<ObjectId>) -> ObjectRepoResult<()>;
    fn list_children(&self, parent_id: ObjectId) -> ObjectRepoResult<Vec<ObjectRecord>>;
    /// Replaces the object's tag set in one transaction.
    fn set_object_tags(&self, id: ObjectId, tag_ids: &[TagId]) -> ObjectRepoResult<()>;
    fn attach_task(&self, id: ObjectId, task_id: TaskId) -> ObjectRepoResult<()>;
}

/// SQLite-backed object repository.
pub struct SqliteObjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ObjectRepository for SqliteObjectRepository<'_> {
    fn create_object(&self, new: &NewObject) -> ObjectRepoResult<ObjectRecord> {
        if let Some(parent_id) = new.parent_id {
            if !object_exists(self.conn, parent_id)? {
                return Err(ObjectRepoError::ParentNotFound(parent_id));
            }
        }

        let priority = new.priority.unwrap_or(Priority::Medium);
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO objects (name, description, priority, parent_id)
             VALUES (?1, ?2, ?3, ?4);",
            params![new.name, new.description, priority.as_db(), new.parent_id],
        )?;
        let object_id = tx.last_insert_rowid();

        for group_id in &new.group_ids {
            tx.execute(
                "INSERT OR IGNORE INTO objects_groups (object_id, group_id) VALUES (?1, ?2);",
                params![object_id, group_id],
            )?;
        }
        for tag_id in &new.tag_ids {
            tx.execute(
                "INSERT OR IGNORE INTO objects_tags (object_id, tag_id) VALUES (?1, ?2);",
                params![object_id, tag_id],
            )?;
        }
        tx.commit()?;

        load_required_object(self.conn, object_id)
    }

    fn get_object(&self, id: ObjectId) -> ObjectRepoResult<Option<ObjectRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{OBJECT_SELECT_SQL}
             WHERE id = ?1;"
        ))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_object_row(row)?));
        }
        Ok(None)
    }

    fn set_parent(&self, id: ObjectId, parent_id: Option<ObjectId>) -> ObjectRepoResult<()> {
        if !object_exists(self.conn, id)? {
            return Err(ObjectRepoError::NotFound(id));
        }
        if let Some(parent_id) = parent_id {
            if !object_exists(self.conn, parent_id)? {
                return Err(ObjectRepoError::ParentNotFound(parent_id));
            }
            ensure_no_parent_cycle(self.conn, id, parent_id)?;
        }

        self.conn.execute(
            "UPDATE objects SET parent_id = ?2 WHERE id = ?1;",
            params![id, parent_id],
        )?;
        Ok(())
    }

    fn list_children(&self, parent_id: ObjectId) -> ObjectRepoResult<Vec<ObjectRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{OBJECT_SELECT_SQL}
             WHERE parent_id = ?1
             ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([parent_id])?;
        let mut children = Vec::new();
        while let Some(row) = rows.next()? {
            children.push(parse_object_row(row)?);
        }
        Ok(children)
    }

    fn set_object_tags(&self, id: ObjectId, tag_ids: &[TagId]) -> ObjectRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !object_exists(&tx, id)? {
            return Err(ObjectRepoError::NotFound(id));
        }
        tx.execute("DELETE FROM objects_tags WHERE object_id = ?1;", [id])?;
        for tag_id in tag_ids {
            tx.execute(
                "INSERT OR IGNORE INTO objects_tags (object_id, tag_id) VALUES (?1, ?2);",
                params![id, tag_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn attach_task(&self, id: ObjectId, task_id: TaskId) -> ObjectRepoResult<()> {
        if !object_exists(self.conn, id)? {
            return Err(ObjectRepoError::NotFound(id));
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO objects_tasks (object_id, task_id) VALUES (?1, ?2);",
            params![id, task_id],
        )?;
        Ok(())
    }
}

/// Walks the proposed parent chain and rejects the write when the edited
/// node reappears. The visited set bounds the walk even on corrupt data.
fn ensure_no_parent_cycle(
    conn: &Connection,
    object_id: ObjectId,
    parent_id: ObjectId,
) -> ObjectRepoResult<()> {
    let mut visited: HashSet<ObjectId> = HashSet::new();
    let mut current = Some(parent_id);

    while let Some(node) = current {
        if node == object_id {
            return Err(ObjectRepoError::ParentCycle {
                object_id,
                parent_id,
            });
        }
        if !visited.insert(node) {
            // Existing data already contains a loop; refuse to extend it.
            return Err(ObjectRepoError::ParentCycle {
                object_id,
                parent_id,
            });
        }
        current = conn
            .query_row("SELECT parent_id FROM objects WHERE id = ?1;", [node], |row| {
                row.get::<_, Option<ObjectId>>(0)
            })
            .optional()?
            .flatten();
    }

    Ok(())
}

fn object_exists(conn: &Connection, id: ObjectId) -> ObjectRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM objects WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn load_required_object(conn: &Connection, id: ObjectId) -> ObjectRepoResult<ObjectRecord> {
    let mut stmt = conn.prepare(&format!(
        "{OBJECT_SELECT_SQL}
         WHERE id = ?1;"
    ))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return parse_object_row(row);
    }
    Err(ObjectRepoError::NotFound(id))
}

fn parse_object_row(row: &Row<'_>) -> ObjectRepoResult<ObjectRecord> {
    let priority_text: String = row.get("priority")?;
    let priority = Priority::parse(&priority_text).ok_or_else(|| {
        ObjectRepoError::InvalidData(format!(
            "invalid priority `{priority_text}` in objects.priority"
        ))
    })?;

    Ok(ObjectRecord {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        priority,
        parent_id: row.get("parent_id")?,
    })
}
