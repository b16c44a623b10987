//! Object mutation use cases.
//!
//! # Responsibility
//! - Run object writes and invalidate the caches they make stale.

use crate::cache::{CacheCoordinator, EntityChange};
use crate::model::{ObjectId, ObjectRecord, TagId};
use crate::repo::object_repo::{NewObject, ObjectRepository, SqliteObjectRepository};
use crate::service::ServiceResult;
use log::info;
use rusqlite::Connection;

/// Creates an object with its group and tag links.
pub fn create_object(
    conn: &Connection,
    cache: &CacheCoordinator,
    new: &NewObject,
) -> ServiceResult<ObjectRecord> {
    let objects = SqliteObjectRepository::new(conn);
    let object = objects.create_object(new)?;
    info!(
        "event=object_created module=service status=ok object_id={}",
        object.id
    );
    cache.bump_for(EntityChange::Object);
    Ok(object)
}

/// Re-parents an object. A cyclic parent chain is rejected before any
/// write happens.
pub fn set_object_parent(
    conn: &Connection,
    cache: &CacheCoordinator,
    object_id: ObjectId,
    parent_id: Option<ObjectId>,
) -> ServiceResult<()> {
    let objects = SqliteObjectRepository::new(conn);
    objects.set_parent(object_id, parent_id)?;
    info!(
        "event=object_reparented module=service status=ok object_id={object_id} parent_id={parent_id:?}"
    );
    cache.bump_for(EntityChange::Object);
    Ok(())
}

/// Replaces the object's tag set.
pub fn set_object_tags(
    conn: &Connection,
    cache: &CacheCoordinator,
    object_id: ObjectId,
    tag_ids: &[TagId],
) -> ServiceResult<()> {
    let objects = SqliteObjectRepository::new(conn);
    objects.set_object_tags(object_id, tag_ids)?;
    info!(
        "event=object_tags_set module=service status=ok object_id={object_id} tags={}",
        tag_ids.len()
    );
    cache.bump_for(EntityChange::Object);
    Ok(())
}
