//! Cached task list pages.
//!
//! # Responsibility
//! - Resolve visibility, run the filter pipeline and wrap the result with
//!   the serialized filter state.
//! - Serve unfiltered default pages from the cache per `(actor, page)`.
//!
//! # Invariants
//! - Only fully-default requests are cache-eligible: any filter, sort or
//!   toggle change bypasses the cache entirely.
//! - Cache keys carry the actor id; two actors never share an entry.

use crate::cache::{CacheCoordinator, CacheNamespace};
use crate::filter::{apply, PipelineInput, TaskFilterParams, TaskPage};
use crate::model::{ActorId, ObjectId};
use crate::repo::org_repo::{OrgRepository, SqliteOrgRepository};
use crate::service::ServiceResult;
use crate::visibility::resolve_task_visibility;
use chrono::{Local, NaiveDate};
use log::debug;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PAGE_TTL: Duration = Duration::from_secs(300);

/// One task page plus the filter state that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPageEnvelope {
    pub page: TaskPage,
    /// Resolved filter/sort state for building pagination links.
    pub filter_state: Vec<(String, String)>,
    pub applied_filters_count: usize,
}

/// Returns one task page for the actor, cached when the request carries
/// no filter state at all.
pub fn get_task_page(
    conn: &Connection,
    cache: &CacheCoordinator,
    actor_id: ActorId,
    pairs: &[(String, String)],
    page_number: u32,
    per_page: u32,
    object_scope: Option<ObjectId>,
) -> ServiceResult<TaskPageEnvelope> {
    let params = TaskFilterParams::from_pairs(pairs);
    let today = Local::now().date_naive();
    get_task_page_at(
        conn,
        cache,
        actor_id,
        &params,
        page_number,
        per_page,
        object_scope,
        today,
    )
}

/// Same as [`get_task_page`] with an explicit reference date.
#[allow(clippy::too_many_arguments)]
pub fn get_task_page_at(
    conn: &Connection,
    cache: &CacheCoordinator,
    actor_id: ActorId,
    params: &TaskFilterParams,
    page_number: u32,
    per_page: u32,
    object_scope: Option<ObjectId>,
    today: NaiveDate,
) -> ServiceResult<TaskPageEnvelope> {
    let cacheable = params.is_default() && object_scope.is_none();
    let key = format!("{actor_id}:{page_number}");

    if cacheable {
        if let Some(envelope) = cache.get_json::<TaskPageEnvelope>(CacheNamespace::TasksPage, &key)
        {
            debug!(
                "event=task_page_served module=service status=hit actor_id={actor_id} page={page_number}"
            );
            return Ok(envelope);
        }
    }

    let visibility = resolve_task_visibility(conn, actor_id)?;
    let org = SqliteOrgRepository::new(conn);
    let actor_engineer = org.engineer_for_actor(actor_id)?.map(|e| e.id);

    let page = apply(
        conn,
        &PipelineInput {
            visibility: &visibility,
            params,
            actor_engineer,
            object_scope,
            today,
            page: page_number,
            per_page,
        },
    )?;

    let envelope = TaskPageEnvelope {
        page,
        filter_state: params.to_query_pairs(),
        applied_filters_count: params.applied_filters_count(),
    };

    if cacheable {
        cache.set_json(CacheNamespace::TasksPage, &key, &envelope, PAGE_TTL);
    }
    debug!(
        "event=task_page_served module=service status=built actor_id={actor_id} page={page_number} cacheable={cacheable}"
    );
    Ok(envelope)
}
