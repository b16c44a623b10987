//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATION_0001_ORG: &str = "
CREATE TABLE actors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    is_superuser INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE departments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE engineers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    second_name TEXT NOT NULL,
    position TEXT,
    actor_id INTEGER UNIQUE REFERENCES actors(id),
    department_id INTEGER REFERENCES departments(id),
    head_of_department INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
";

const MIGRATION_0002_TASKS_OBJECTS: &str = "
CREATE TABLE tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    priority TEXT NOT NULL,
    is_done INTEGER NOT NULL DEFAULT 0,
    deleted INTEGER NOT NULL DEFAULT 0,
    completion_time INTEGER,
    create_time INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000),
    header TEXT NOT NULL,
    text TEXT NOT NULL DEFAULT '',
    completion_text TEXT NOT NULL DEFAULT '',
    creator_id INTEGER NOT NULL REFERENCES actors(id)
);

CREATE TABLE objects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    priority TEXT NOT NULL,
    parent_id INTEGER REFERENCES objects(id)
);

CREATE TABLE object_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE actors_object_groups (
    actor_id INTEGER NOT NULL REFERENCES actors(id),
    group_id INTEGER NOT NULL REFERENCES object_groups(id),
    permission TEXT NOT NULL DEFAULT 'R',
    PRIMARY KEY (actor_id, group_id)
);

CREATE TABLE tasks_engineers (
    task_id INTEGER NOT NULL REFERENCES tasks(id),
    engineer_id INTEGER NOT NULL REFERENCES engineers(id),
    PRIMARY KEY (task_id, engineer_id)
);

CREATE TABLE tasks_departments (
    task_id INTEGER NOT NULL REFERENCES tasks(id),
    department_id INTEGER NOT NULL REFERENCES departments(id),
    PRIMARY KEY (task_id, department_id)
);

CREATE TABLE tasks_tags (
    task_id INTEGER NOT NULL REFERENCES tasks(id),
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    PRIMARY KEY (task_id, tag_id)
);

CREATE TABLE objects_tasks (
    object_id INTEGER NOT NULL REFERENCES objects(id),
    task_id INTEGER NOT NULL REFERENCES tasks(id),
    PRIMARY KEY (object_id, task_id)
);

CREATE TABLE objects_tags (
    object_id INTEGER NOT NULL REFERENCES objects(id),
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    PRIMARY KEY (object_id, tag_id)
);

CREATE TABLE objects_groups (
    object_id INTEGER NOT NULL REFERENCES objects(id),
    group_id INTEGER NOT NULL REFERENCES object_groups(id),
    PRIMARY KEY (object_id, group_id)
);

CREATE INDEX idx_tasks_deleted ON tasks(deleted);
CREATE INDEX idx_tasks_completion_time ON tasks(completion_time);
CREATE INDEX idx_objects_parent ON objects(parent_id);
";

const MIGRATION_0003_COMMENTS_NOTIFICATIONS: &str = "
CREATE TABLE comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL REFERENCES tasks(id),
    author_id INTEGER NOT NULL REFERENCES actors(id),
    text TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
);

CREATE TABLE notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_id INTEGER NOT NULL REFERENCES actors(id),
    message TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_comments_task ON comments(task_id);
CREATE INDEX idx_notifications_actor ON notifications(actor_id);
";

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: MIGRATION_0001_ORG,
    },
    Migration {
        version: 2,
        sql: MIGRATION_0002_TASKS_OBJECTS,
    },
    Migration {
        version: 3,
        sql: MIGRATION_0003_COMMENTS_NOTIFICATIONS,
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
