//! Org repository: actors, engineers, departments, groups and tags.
//!
//! # Responsibility
//! - Provide persistence APIs for the organizational entities that drive
//!   visibility resolution and facet construction.
//!
//! # Invariants
//! - `engineers.actor_id` is written once at creation and never updated.
//! - Tag names are unique; `ensure_tag` is an idempotent upsert.

use crate::db::DbError;
use crate::model::{
    Actor, ActorId, Department, DepartmentId, Engineer, EngineerId, GroupPermission, ObjectGroup,
    ObjectGroupId, Tag, TagId,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type OrgRepoResult<T> = Result<T, OrgRepoError>;

/// Errors from org persistence operations.
#[derive(Debug)]
pub enum OrgRepoError {
    Db(DbError),
    ActorNotFound(ActorId),
    EngineerNotFound(EngineerId),
    InvalidData(String),
}

impl Display for OrgRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ActorNotFound(id) => write!(f, "actor not found: {id}"),
            Self::EngineerNotFound(id) => write!(f, "engineer not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted org data: {message}"),
        }
    }
}

impl Error for OrgRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for OrgRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for OrgRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for organizational entities.
pub trait OrgRepository {
    fn create_actor(&self, username: &str, is_superuser: bool) -> OrgRepoResult<Actor>;
    fn get_actor(&self, id: ActorId) -> OrgRepoResult<Option<Actor>>;
    fn create_department(&self, name: &str) -> OrgRepoResult<Department>;
    fn create_engineer(&self, new: &NewEngineer) -> OrgRepoResult<Engineer>;
    fn get_engineer(&self, id: EngineerId) -> OrgRepoResult<Option<Engineer>>;
    /// Loads the engineer profile linked to an actor, if any.
    fn engineer_for_actor(&self, actor_id: ActorId) -> OrgRepoResult<Option<Engineer>>;
    fn create_object_group(&self, name: &str) -> OrgRepoResult<ObjectGroup>;
    fn add_group_member(
        &self,
        group_id: ObjectGroupId,
        actor_id: ActorId,
        permission: GroupPermission,
    ) -> OrgRepoResult<()>;
    /// Idempotently creates a tag and returns its record.
    fn ensure_tag(&self, name: &str) -> OrgRepoResult<Tag>;
    fn list_tags(&self) -> OrgRepoResult<Vec<Tag>>;
}

/// Fields required to create an engineer profile.
#[derive(Debug, Clone, Default)]
pub struct NewEngineer {
    pub first_name: String,
    pub second_name: String,
    pub position: Option<String>,
    pub actor_id: Option<ActorId>,
    pub department_id: Option<DepartmentId>,
    pub head_of_department: bool,
}

/// SQLite-backed org repository.
pub struct SqliteOrgRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrgRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl OrgRepository for SqliteOrgRepository<'_> {
    fn create_actor(&self, username: &str, is_superuser: bool) -> OrgRepoResult<Actor> {
        self.conn.execute(
            "INSERT INTO actors (username, is_superuser) VALUES (?1, ?2);",
            params![username, i64::from(is_superuser)],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(Actor {
            id,
            username: username.to_string(),
            is_superuser,
        })
    }

    fn get_actor(&self, id: ActorId) -> OrgRepoResult<Option<Actor>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, username, is_superuser
             FROM actors
             WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_actor_row(row)?));
        }
        Ok(None)
    }

    fn create_department(&self, name: &str) -> OrgRepoResult<Department> {
        self.conn
            .execute("INSERT INTO departments (name) VALUES (?1);", [name])?;
        Ok(Department {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    fn create_engineer(&self, new: &NewEngineer) -> OrgRepoResult<Engineer> {
        self.conn.execute(
            "INSERT INTO engineers (
                first_name,
                second_name,
                position,
                actor_id,
                department_id,
                head_of_department
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                new.first_name,
                new.second_name,
                new.position,
                new.actor_id,
                new.department_id,
                i64::from(new.head_of_department),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(Engineer {
            id,
            first_name: new.first_name.clone(),
            second_name: new.second_name.clone(),
            position: new.position.clone(),
            actor_id: new.actor_id,
            department_id: new.department_id,
            head_of_department: new.head_of_department,
        })
    }

    fn get_engineer(&self, id: EngineerId) -> OrgRepoResult<Option<Engineer>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENGINEER_SELECT_SQL}
             WHERE id = ?1;"
        ))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_engineer_row(row)?));
        }
        Ok(None)
    }

    fn engineer_for_actor(&self, actor_id: ActorId) -> OrgRepoResult<Option<Engineer>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENGINEER_SELECT_SQL}
             WHERE actor_id = ?1;"
        ))?;
        let mut rows = stmt.query([actor_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_engineer_row(row)?));
        }
        Ok(None)
    }

    fn create_object_group(&self, name: &str) -> OrgRepoResult<ObjectGroup> {
        self.conn
            .execute("INSERT INTO object_groups (name) VALUES (?1);", [name])?;
        Ok(ObjectGroup {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    fn add_group_member(
        &self,
        group_id: ObjectGroupId,
        actor_id: ActorId,
        permission: GroupPermission,
    ) -> OrgRepoResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO actors_object_groups (actor_id, group_id, permission)
             VALUES (?1, ?2, ?3);",
            params![actor_id, group_id, permission.as_db()],
        )?;
        Ok(())
    }

    fn ensure_tag(&self, name: &str) -> OrgRepoResult<Tag> {
        self.conn
            .execute("INSERT OR IGNORE INTO tags (name) VALUES (?1);", [name])?;
        let id: i64 = self
            .conn
            .query_row("SELECT id FROM tags WHERE name = ?1;", [name], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or_else(|| OrgRepoError::InvalidData(format!("tag `{name}` missing after upsert")))?;
        Ok(Tag {
            id,
            name: name.to_string(),
        })
    }

    fn list_tags(&self) -> OrgRepoResult<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM tags ORDER BY name COLLATE NOCASE ASC;")?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            });
        }
        Ok(tags)
    }
}

const ENGINEER_SELECT_SQL: &str = "SELECT
    id,
    first_name,
    second_name,
    position,
    actor_id,
    department_id,
    head_of_department
FROM engineers";

fn parse_actor_row(row: &Row<'_>) -> OrgRepoResult<Actor> {
    Ok(Actor {
        id: row.get("id")?,
        username: row.get("username")?,
        is_superuser: int_to_bool(row.get("is_superuser")?, "actors.is_superuser")?,
    })
}

fn parse_engineer_row(row: &Row<'_>) -> OrgRepoResult<Engineer> {
    Ok(Engineer {
        id: row.get("id")?,
        first_name: row.get("first_name")?,
        second_name: row.get("second_name")?,
        position: row.get("position")?,
        actor_id: row.get("actor_id")?,
        department_id: row.get("department_id")?,
        head_of_department: int_to_bool(
            row.get("head_of_department")?,
            "engineers.head_of_department",
        )?,
    })
}

fn int_to_bool(value: i64, column: &'static str) -> OrgRepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(OrgRepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
