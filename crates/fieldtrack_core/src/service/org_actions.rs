//! Org mutation use cases.
//!
//! # Responsibility
//! - Run organizational writes and invalidate the facet caches they make
//!   stale.

use crate::cache::{CacheCoordinator, EntityChange};
use crate::model::{ActorId, Department, Engineer, GroupPermission, ObjectGroup, ObjectGroupId, Tag};
use crate::repo::org_repo::{NewEngineer, OrgRepository, SqliteOrgRepository};
use crate::service::ServiceResult;
use log::info;
use rusqlite::Connection;

/// Idempotently creates a tag.
pub fn create_tag(conn: &Connection, cache: &CacheCoordinator, name: &str) -> ServiceResult<Tag> {
    let org = SqliteOrgRepository::new(conn);
    let tag = org.ensure_tag(name)?;
    info!("event=tag_created module=service status=ok tag_id={}", tag.id);
    cache.bump_for(EntityChange::Tag);
    Ok(tag)
}

pub fn create_department(
    conn: &Connection,
    cache: &CacheCoordinator,
    name: &str,
) -> ServiceResult<Department> {
    let org = SqliteOrgRepository::new(conn);
    let department = org.create_department(name)?;
    info!(
        "event=department_created module=service status=ok department_id={}",
        department.id
    );
    cache.bump_for(EntityChange::Department);
    Ok(department)
}

pub fn create_engineer(
    conn: &Connection,
    cache: &CacheCoordinator,
    new: &NewEngineer,
) -> ServiceResult<Engineer> {
    let org = SqliteOrgRepository::new(conn);
    let engineer = org.create_engineer(new)?;
    info!(
        "event=engineer_created module=service status=ok engineer_id={}",
        engineer.id
    );
    cache.bump_for(EntityChange::Engineer);
    Ok(engineer)
}

pub fn create_object_group(
    conn: &Connection,
    cache: &CacheCoordinator,
    name: &str,
) -> ServiceResult<ObjectGroup> {
    let org = SqliteOrgRepository::new(conn);
    let group = org.create_object_group(name)?;
    info!(
        "event=object_group_created module=service status=ok group_id={}",
        group.id
    );
    cache.bump_for(EntityChange::ObjectGroup);
    Ok(group)
}

pub fn add_group_member(
    conn: &Connection,
    cache: &CacheCoordinator,
    group_id: ObjectGroupId,
    actor_id: ActorId,
    permission: GroupPermission,
) -> ServiceResult<()> {
    let org = SqliteOrgRepository::new(conn);
    org.add_group_member(group_id, actor_id, permission)?;
    info!(
        "event=group_member_added module=service status=ok group_id={group_id} actor_id={actor_id}"
    );
    cache.bump_for(EntityChange::ObjectGroup);
    Ok(())
}
