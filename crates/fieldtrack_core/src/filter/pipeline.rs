//! Filter-and-sort pipeline over a visible task base set.
//!
//! # Responsibility
//! - Assemble facet predicates into one conjunction in a fixed stage order.
//! - Compute summary counts before the active/done toggle is applied.
//! - Order, paginate and return task ids.
//!
//! # Invariants
//! - Stage order is fixed: facet predicates, my-tasks narrowing, object
//!   scope, counts, status toggle, sort/paginate. Later stages depend on
//!   earlier ones.
//! - Counts reflect the filtered population, not the toggled display set.
//! - All predicates are correlated EXISTS subqueries, so no DISTINCT or
//!   dedup pass is needed.

use crate::db::DbError;
use crate::filter::params::{AssigneeToken, SortOrder, TaskFilterParams};
use crate::model::{EngineerId, ObjectId, TaskId};
use crate::repo::{placeholders, SqlPredicate};
use crate::visibility::{task_visibility_predicate, TaskVisibility};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors from pipeline execution.
#[derive(Debug)]
pub enum PipelineError {
    Db(DbError),
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for PipelineError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Summary counters computed against the pre-toggle filtered set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub done_count: i64,
    pub not_done_count: i64,
    /// Tasks due on the reference date and still open.
    pub tasks_due_today_count: i64,
    /// Tasks in the filtered set assigned to the acting engineer.
    pub my_tasks_count: i64,
    /// Tasks visible before any user filter is applied.
    pub available_tasks_count: i64,
}

/// One ordered, paginated result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPage {
    pub task_ids: Vec<TaskId>,
    pub counts: TaskCounts,
    pub total_count: i64,
    pub page: u32,
    pub per_page: u32,
    pub num_pages: u32,
}

/// Pipeline execution context for one request.
#[derive(Debug, Clone)]
pub struct PipelineInput<'a> {
    pub visibility: &'a TaskVisibility,
    pub params: &'a TaskFilterParams,
    /// Engineer profile of the acting actor, if any.
    pub actor_engineer: Option<EngineerId>,
    /// Page-level object scope; not a user filter.
    pub object_scope: Option<ObjectId>,
    /// Reference date for the due-today counter.
    pub today: NaiveDate,
    pub page: u32,
    pub per_page: u32,
}

/// Runs the full pipeline and returns the ordered page plus counts.
pub fn apply(conn: &Connection, input: &PipelineInput<'_>) -> PipelineResult<TaskPage> {
    let base = task_visibility_predicate(input.visibility);
    let params = input.params;

    // Stage 1: conjunction of facet predicates.
    let mut predicates = vec![base.clone()];
    if let Some(search) = &params.search {
        predicates.push(search_predicate(search));
    }
    if !params.tags.is_empty() {
        predicates.push(membership_predicate(
            "tasks_tags",
            "task_id",
            "tag_id",
            &params.tags,
        ));
    }
    if !params.assignees.is_empty() {
        predicates.push(assignee_predicate(&params.assignees));
    }
    if let Some(priority) = params.priority {
        predicates.push(SqlPredicate::new(
            "t.priority = ?",
            vec![Value::Text(priority.as_db().to_string())],
        ));
    }
    if !params.objects_set.is_empty() {
        predicates.push(membership_predicate(
            "objects_tasks",
            "task_id",
            "object_id",
            &params.objects_set,
        ));
    }
    if let Some(after) = params.completion_time_after {
        predicates.push(SqlPredicate::new(
            "date(t.completion_time / 1000, 'unixepoch') >= ?",
            vec![Value::Text(after.to_string())],
        ));
    }
    if let Some(before) = params.completion_time_before {
        predicates.push(SqlPredicate::new(
            "date(t.completion_time / 1000, 'unixepoch') <= ?",
            vec![Value::Text(before.to_string())],
        ));
    }

    // Stage 2: my-tasks narrowing. Without an engineer profile the result
    // is legitimately empty.
    if params.show_my_tasks_only {
        match input.actor_engineer {
            Some(engineer_id) => predicates.push(SqlPredicate::new(
                "EXISTS(
                    SELECT 1 FROM tasks_engineers te
                    WHERE te.task_id = t.id AND te.engineer_id = ?
                )",
                vec![Value::Integer(engineer_id)],
            )),
            None => predicates.push(SqlPredicate::new("0 = 1", Vec::new())),
        }
    }

    // Stage 3: page-level object scope.
    if let Some(object_id) = input.object_scope {
        predicates.push(object_scope_predicate(object_id));
    }

    // Stage 4: counts against the pre-toggle set.
    let filtered = SqlPredicate::conjunction(&predicates);
    let counts = compute_counts(conn, &filtered, &base, input)?;

    // Stage 5: active/done display toggle.
    match (params.show_active_task, params.show_done_task) {
        (true, true) => {}
        (true, false) => predicates.push(SqlPredicate::new("t.is_done = 0", Vec::new())),
        (false, true) => predicates.push(SqlPredicate::new("t.is_done = 1", Vec::new())),
        (false, false) => predicates.push(SqlPredicate::new("0 = 1", Vec::new())),
    }
    let displayed = SqlPredicate::conjunction(&predicates);

    // Stage 6: order and paginate.
    let total_count = count_where(conn, &displayed)?;
    let per_page = input.per_page.max(1);
    let num_pages = ((total_count.max(0) as u32).div_ceil(per_page)).max(1);
    let page = input.page.clamp(1, num_pages);
    let order_by = match params.sort_order {
        SortOrder::Asc => "t.completion_time ASC, t.create_time ASC, t.id ASC",
        SortOrder::Desc => "t.completion_time DESC, t.create_time DESC, t.id ASC",
    };
    let sql = format!(
        "SELECT t.id FROM tasks t WHERE {} ORDER BY {} LIMIT ? OFFSET ?;",
        displayed.clause, order_by
    );
    let mut binds = displayed.binds.clone();
    binds.push(Value::Integer(i64::from(per_page)));
    binds.push(Value::Integer(i64::from((page - 1) * per_page)));

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut task_ids = Vec::new();
    while let Some(row) = rows.next()? {
        task_ids.push(row.get(0)?);
    }

    Ok(TaskPage {
        task_ids,
        counts,
        total_count,
        page,
        per_page,
        num_pages,
    })
}

fn compute_counts(
    conn: &Connection,
    filtered: &SqlPredicate,
    base: &SqlPredicate,
    input: &PipelineInput<'_>,
) -> PipelineResult<TaskCounts> {
    let done = SqlPredicate::conjunction(&[
        filtered.clone(),
        SqlPredicate::new("t.is_done = 1", Vec::new()),
    ]);
    let not_done = SqlPredicate::conjunction(&[
        filtered.clone(),
        SqlPredicate::new("t.is_done = 0", Vec::new()),
    ]);
    let due_today = SqlPredicate::conjunction(&[
        filtered.clone(),
        SqlPredicate::new(
            "date(t.completion_time / 1000, 'unixepoch') = ? AND t.is_done = 0",
            vec![Value::Text(input.today.to_string())],
        ),
    ]);

    let my_tasks_count = match input.actor_engineer {
        Some(engineer_id) => {
            let mine = SqlPredicate::conjunction(&[
                filtered.clone(),
                SqlPredicate::new(
                    "EXISTS(
                        SELECT 1 FROM tasks_engineers te
                        WHERE te.task_id = t.id AND te.engineer_id = ?
                    )",
                    vec![Value::Integer(engineer_id)],
                ),
            ]);
            count_where(conn, &mine)?
        }
        None => 0,
    };

    // Available = visible base set narrowed only by the object scope.
    let available = match input.object_scope {
        Some(object_id) => {
            SqlPredicate::conjunction(&[base.clone(), object_scope_predicate(object_id)])
        }
        None => base.clone(),
    };

    Ok(TaskCounts {
        done_count: count_where(conn, &done)?,
        not_done_count: count_where(conn, &not_done)?,
        tasks_due_today_count: count_where(conn, &due_today)?,
        my_tasks_count,
        available_tasks_count: count_where(conn, &available)?,
    })
}

fn count_where(conn: &Connection, predicate: &SqlPredicate) -> PipelineResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM tasks t WHERE {};", predicate.clause);
    let count = conn.query_row(&sql, params_from_iter(predicate.binds.clone()), |row| {
        row.get(0)
    })?;
    Ok(count)
}

fn search_predicate(search: &str) -> SqlPredicate {
    let needle = format!("%{}%", search.to_lowercase());
    SqlPredicate::new(
        "(LOWER(t.header) LIKE ? OR LOWER(t.text) LIKE ?)",
        vec![Value::Text(needle.clone()), Value::Text(needle)],
    )
}

fn membership_predicate(table: &str, fk_column: &str, value_column: &str, ids: &[i64]) -> SqlPredicate {
    let clause = format!(
        "EXISTS(
            SELECT 1 FROM {table} m
            WHERE m.{fk_column} = t.id AND m.{value_column} IN ({})
        )",
        placeholders(ids.len())
    );
    SqlPredicate::new(clause, ids.iter().map(|id| Value::Integer(*id)).collect())
}

fn object_scope_predicate(object_id: ObjectId) -> SqlPredicate {
    SqlPredicate::new(
        "EXISTS(
            SELECT 1 FROM objects_tasks ot
            WHERE ot.task_id = t.id AND ot.object_id = ?
        )",
        vec![Value::Integer(object_id)],
    )
}

/// Renders the combined engineer/department token filter.
///
/// The clause is an OR across all valid tokens: an `eng` token matches the
/// engineer assignment, a `dep` token matches engineers belonging to the
/// department or a direct department assignment.
fn assignee_predicate(tokens: &[AssigneeToken]) -> SqlPredicate {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    for token in tokens {
        match *token {
            AssigneeToken::Engineer(id) => {
                clauses.push(
                    "EXISTS(
                        SELECT 1 FROM tasks_engineers te
                        WHERE te.task_id = t.id AND te.engineer_id = ?
                    )"
                    .to_string(),
                );
                binds.push(Value::Integer(id));
            }
            AssigneeToken::Department(id) => {
                clauses.push(
                    "(EXISTS(
                        SELECT 1 FROM tasks_engineers te
                        INNER JOIN engineers e ON e.id = te.engineer_id
                        WHERE te.task_id = t.id AND e.department_id = ?
                    ) OR EXISTS(
                        SELECT 1 FROM tasks_departments td
                        WHERE td.task_id = t.id AND td.department_id = ?
                    ))"
                    .to_string(),
                );
                binds.push(Value::Integer(id));
                binds.push(Value::Integer(id));
            }
        }
    }
    SqlPredicate::new(format!("({})", clauses.join(" OR ")), binds)
}
