//! Cached object list pages.
//!
//! # Responsibility
//! - List group-visible objects with their open-task and child counts.
//! - Serve unfiltered pages from the cache per `(actor, page)`.
//!
//! # Invariants
//! - Task counts on each row respect the actor's task visibility, so two
//!   actors can see different numbers on the same object.
//! - Only unfiltered requests are cache-eligible.

use crate::cache::{CacheCoordinator, CacheNamespace};
use crate::model::{ActorId, ObjectId, ObjectRecord, Priority, TagId};
use crate::repo::org_repo::{OrgRepoError, OrgRepository, SqliteOrgRepository};
use crate::repo::{placeholders, SqlPredicate};
use crate::service::ServiceResult;
use crate::visibility::{
    object_visibility_predicate, resolve_task_visibility, task_visibility_predicate,
};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PAGE_TTL: Duration = Duration::from_secs(300);

/// Filter state for the object list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectFilterParams {
    /// Case-insensitive substring match over name OR description.
    pub search: Option<String>,
    pub tags: Vec<TagId>,
    pub groups: Vec<i64>,
    pub priority: Option<Priority>,
}

impl ObjectFilterParams {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// One object row with its per-actor counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectListItem {
    pub object: ObjectRecord,
    /// Open tasks on this object the actor can see.
    pub undone_tasks_count: i64,
    pub child_count: i64,
}

/// One ordered, paginated object page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPage {
    pub items: Vec<ObjectListItem>,
    pub total_count: i64,
    pub page: u32,
    pub per_page: u32,
    pub num_pages: u32,
}

/// Returns one object page for the actor, cached when unfiltered.
pub fn get_object_page(
    conn: &Connection,
    cache: &CacheCoordinator,
    actor_id: ActorId,
    params: &ObjectFilterParams,
    page_number: u32,
    per_page: u32,
) -> ServiceResult<ObjectPage> {
    let cacheable = params.is_default();
    let key = format!("{actor_id}:{page_number}");

    if cacheable {
        if let Some(page) = cache.get_json::<ObjectPage>(CacheNamespace::ObjectsPage, &key) {
            debug!(
                "event=object_page_served module=service status=hit actor_id={actor_id} page={page_number}"
            );
            return Ok(page);
        }
    }

    let page = build_object_page(conn, actor_id, params, page_number, per_page)?;
    if cacheable {
        cache.set_json(CacheNamespace::ObjectsPage, &key, &page, PAGE_TTL);
    }
    debug!(
        "event=object_page_served module=service status=built actor_id={actor_id} page={page_number} cacheable={cacheable}"
    );
    Ok(page)
}

fn build_object_page(
    conn: &Connection,
    actor_id: ActorId,
    params: &ObjectFilterParams,
    page_number: u32,
    per_page: u32,
) -> ServiceResult<ObjectPage> {
    let org = SqliteOrgRepository::new(conn);
    let actor = org
        .get_actor(actor_id)?
        .ok_or(OrgRepoError::ActorNotFound(actor_id))?;

    let mut predicates = vec![object_visibility_predicate(&actor)];
    if let Some(search) = &params.search {
        let needle = format!("%{}%", search.to_lowercase());
        predicates.push(SqlPredicate::new(
            "(LOWER(o.name) LIKE ? OR LOWER(o.description) LIKE ?)",
            vec![Value::Text(needle.clone()), Value::Text(needle)],
        ));
    }
    if !params.tags.is_empty() {
        predicates.push(SqlPredicate::new(
            format!(
                "EXISTS(
                    SELECT 1 FROM objects_tags ot
                    WHERE ot.object_id = o.id AND ot.tag_id IN ({})
                )",
                placeholders(params.tags.len())
            ),
            params.tags.iter().map(|id| Value::Integer(*id)).collect(),
        ));
    }
    if !params.groups.is_empty() {
        predicates.push(SqlPredicate::new(
            format!(
                "EXISTS(
                    SELECT 1 FROM objects_groups og
                    WHERE og.object_id = o.id AND og.group_id IN ({})
                )",
                placeholders(params.groups.len())
            ),
            params.groups.iter().map(|id| Value::Integer(*id)).collect(),
        ));
    }
    if let Some(priority) = params.priority {
        predicates.push(SqlPredicate::new(
            "o.priority = ?",
            vec![Value::Text(priority.as_db().to_string())],
        ));
    }
    let predicate = SqlPredicate::conjunction(&predicates);

    let total_count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM objects o WHERE {};", predicate.clause),
        params_from_iter(predicate.binds.clone()),
        |row| row.get(0),
    )?;
    let per_page = per_page.max(1);
    let num_pages = ((total_count.max(0) as u32).div_ceil(per_page)).max(1);
    let page = page_number.clamp(1, num_pages);

    let sql = format!(
        "SELECT o.id, o.name, o.description, o.priority, o.parent_id
         FROM objects o
         WHERE {}
         ORDER BY o.name ASC, o.id ASC
         LIMIT ? OFFSET ?;",
        predicate.clause
    );
    let mut binds = predicate.binds.clone();
    binds.push(Value::Integer(i64::from(per_page)));
    binds.push(Value::Integer(i64::from((page - 1) * per_page)));

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let priority_text: String = row.get(3)?;
        let priority = Priority::parse(&priority_text).ok_or_else(|| {
            crate::repo::object_repo::ObjectRepoError::InvalidData(format!(
                "invalid priority `{priority_text}` in objects.priority"
            ))
        })?;
        records.push(ObjectRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            priority,
            parent_id: row.get(4)?,
        });
    }
    drop(rows);
    drop(stmt);

    let visibility = resolve_task_visibility(conn, actor_id)?;
    let task_predicate = task_visibility_predicate(&visibility);

    let mut items = Vec::with_capacity(records.len());
    for object in records {
        let undone_tasks_count = undone_tasks_on_object(conn, &task_predicate, object.id)?;
        let child_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM objects WHERE parent_id = ?1;",
            [object.id],
            |row| row.get(0),
        )?;
        items.push(ObjectListItem {
            object,
            undone_tasks_count,
            child_count,
        });
    }

    Ok(ObjectPage {
        items,
        total_count,
        page,
        per_page,
        num_pages,
    })
}

fn undone_tasks_on_object(
    conn: &Connection,
    task_predicate: &SqlPredicate,
    object_id: ObjectId,
) -> ServiceResult<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM tasks t
         WHERE {}
           AND t.is_done = 0
           AND EXISTS(
               SELECT 1 FROM objects_tasks ot
               WHERE ot.task_id = t.id AND ot.object_id = ?
           );",
        task_predicate.clause
    );
    let mut binds = task_predicate.binds.clone();
    binds.push(Value::Integer(object_id));
    let count = conn.query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
    Ok(count)
}
