//! Task mutation use cases.
//!
//! # Responsibility
//! - Run task mutations end to end: permission check, write, action-log
//!   line, notifications, cache bump.
//!
//! # Invariants
//! - The entity write, its action-log line and its notification rows
//!   commit in one Immediate transaction, or not at all.
//! - Cache namespaces are bumped only after the transaction commits.
//! - Soft deletion is restricted to the creator and superusers.
//! - Every mutation that changes what others see notifies the affected
//!   actors through the sink.

use crate::cache::{CacheCoordinator, EntityChange};
use crate::model::{Actor, ActorId, EngineerId, Task, TaskId};
use crate::repo::org_repo::{OrgRepository, SqliteOrgRepository};
use crate::repo::task_repo::{NewTask, SqliteTaskRepository, TaskRepoError, TaskRepository};
use crate::service::events::{DomainEvent, NotificationSink};
use crate::service::{ServiceError, ServiceResult};
use chrono::{Local, TimeZone, Utc};
use log::info;
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Creates a task with its initial links and invalidates list pages.
pub fn create_task(
    conn: &Connection,
    cache: &CacheCoordinator,
    new: &NewTask,
) -> ServiceResult<Task> {
    let tasks = SqliteTaskRepository::new(conn);
    let task = tasks.create_task(new)?;
    info!(
        "event=task_created module=service status=ok task_id={} creator_id={}",
        task.id, task.creator_id
    );
    cache.bump_for(EntityChange::Task);
    Ok(task)
}

/// Assigns the acting actor's engineer profile to the task.
///
/// Requires an engineer profile. Taking a task you already hold is a
/// no-op; nothing is logged or notified twice.
pub fn take_task(
    conn: &Connection,
    cache: &CacheCoordinator,
    sink: &dyn NotificationSink,
    actor_id: ActorId,
    task_id: TaskId,
) -> ServiceResult<()> {
    let org = SqliteOrgRepository::new(conn);
    let engineer = org
        .engineer_for_actor(actor_id)?
        .ok_or(ServiceError::NoEngineer(actor_id))?;

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let tasks = SqliteTaskRepository::new(&tx);
    let inserted = tasks.add_engineer(task_id, engineer.id)?;
    if !inserted {
        return Ok(());
    }

    let now_ms = now_ms();
    let name = engineer.display_name();
    tasks.append_event_log(task_id, &action_line(now_ms, &format!("{name} took the task")))?;
    notify_task_creator(
        &tx,
        sink,
        &tasks,
        task_id,
        actor_id,
        &format!("{name} took task #{task_id}"),
        now_ms,
    )?;
    tx.commit()?;
    info!(
        "event=task_taken module=service status=ok task_id={task_id} engineer_id={}",
        engineer.id
    );
    cache.bump_for(EntityChange::Task);
    Ok(())
}

/// Replaces the task's engineer and department assignments.
///
/// Emits one event per engineer added or removed; each affected engineer
/// with a linked actor gets a notification.
pub fn set_assignees(
    conn: &Connection,
    cache: &CacheCoordinator,
    sink: &dyn NotificationSink,
    acting_actor_id: ActorId,
    task_id: TaskId,
    engineer_ids: &[EngineerId],
    department_ids: &[i64],
) -> ServiceResult<Vec<DomainEvent>> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let tasks = SqliteTaskRepository::new(&tx);
    let diff = tasks.set_assignees(task_id, engineer_ids, department_ids)?;

    let now_ms = now_ms();
    let actor_name = actor_display_name(&tx, acting_actor_id)?;
    let mut events = Vec::new();

    for engineer_id in &diff.added_engineers {
        events.push(DomainEvent::AssignmentAdded {
            task_id,
            engineer_id: *engineer_id,
        });
        notify_engineer(
            &tx,
            sink,
            *engineer_id,
            &format!("{actor_name} assigned you to task #{task_id}"),
            now_ms,
        )?;
    }
    for engineer_id in &diff.removed_engineers {
        events.push(DomainEvent::AssignmentRemoved {
            task_id,
            engineer_id: *engineer_id,
        });
        notify_engineer(
            &tx,
            sink,
            *engineer_id,
            &format!("{actor_name} removed you from task #{task_id}"),
            now_ms,
        )?;
    }
    if !events.is_empty() {
        tasks.append_event_log(
            task_id,
            &action_line(now_ms, &format!("{actor_name} changed the assignees")),
        )?;
    }
    tx.commit()?;
    info!(
        "event=task_assignees_set module=service status=ok task_id={task_id} added={} removed={}",
        diff.added_engineers.len(),
        diff.removed_engineers.len()
    );
    cache.bump_for(EntityChange::Task);
    Ok(events)
}

/// Marks a task done, logs the closing note and notifies its creator.
pub fn complete_task(
    conn: &Connection,
    cache: &CacheCoordinator,
    sink: &dyn NotificationSink,
    actor_id: ActorId,
    task_id: TaskId,
    note: &str,
) -> ServiceResult<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let tasks = SqliteTaskRepository::new(&tx);
    tasks.set_done(task_id, true)?;

    let now_ms = now_ms();
    let actor_name = actor_display_name(&tx, actor_id)?;
    let line = if note.is_empty() {
        format!("{actor_name} completed the task")
    } else {
        format!("{actor_name} completed the task: {note}")
    };
    tasks.append_event_log(task_id, &action_line(now_ms, &line))?;
    notify_task_creator(
        &tx,
        sink,
        &tasks,
        task_id,
        actor_id,
        &format!("{actor_name} completed task #{task_id}"),
        now_ms,
    )?;
    tx.commit()?;
    info!("event=task_completed module=service status=ok task_id={task_id}");
    cache.bump_for(EntityChange::Task);
    Ok(())
}

/// Reopens a completed task.
pub fn reopen_task(
    conn: &Connection,
    cache: &CacheCoordinator,
    actor_id: ActorId,
    task_id: TaskId,
) -> ServiceResult<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let tasks = SqliteTaskRepository::new(&tx);
    tasks.set_done(task_id, false)?;
    let actor_name = actor_display_name(&tx, actor_id)?;
    tasks.append_event_log(
        task_id,
        &action_line(now_ms(), &format!("{actor_name} reopened the task")),
    )?;
    tx.commit()?;
    info!("event=task_reopened module=service status=ok task_id={task_id}");
    cache.bump_for(EntityChange::Task);
    Ok(())
}

/// Tombstones a task. Only its creator or a superuser may do this.
pub fn soft_delete_task(
    conn: &Connection,
    cache: &CacheCoordinator,
    actor_id: ActorId,
    task_id: TaskId,
) -> ServiceResult<()> {
    let tasks = SqliteTaskRepository::new(conn);
    let task = tasks
        .get_task(task_id, false)?
        .ok_or(TaskRepoError::NotFound(task_id))?;

    let actor = load_actor(conn, actor_id)?;
    if task.creator_id != actor_id && !actor.is_superuser {
        return Err(ServiceError::PermissionDenied {
            actor_id,
            action: "delete this task",
        });
    }

    tasks.soft_delete_task(task_id)?;
    info!(
        "event=task_deleted module=service status=ok task_id={task_id} actor_id={actor_id}"
    );
    cache.bump_for(EntityChange::Task);
    Ok(())
}

/// Adds a comment and notifies the creator plus all assigned engineers,
/// skipping the comment's author.
pub fn comment_task(
    conn: &Connection,
    cache: &CacheCoordinator,
    sink: &dyn NotificationSink,
    author_id: ActorId,
    task_id: TaskId,
    text: &str,
) -> ServiceResult<DomainEvent> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let tasks = SqliteTaskRepository::new(&tx);
    let comment = tasks.add_comment(task_id, author_id, text)?;

    let now_ms = comment.created_at;
    let author_name = actor_display_name(&tx, author_id)?;
    let message = format!("{author_name} commented on task #{task_id}");

    notify_task_creator(&tx, sink, &tasks, task_id, author_id, &message, now_ms)?;
    for engineer_id in tasks.engineers_for_task(task_id)? {
        let recipient = engineer_actor_id(&tx, engineer_id)?;
        if let Some(recipient) = recipient {
            if recipient != author_id {
                sink.notify(&tx, recipient, &message, now_ms)?;
            }
        }
    }
    tx.commit()?;
    info!(
        "event=task_commented module=service status=ok task_id={task_id} comment_id={}",
        comment.id
    );
    cache.bump_for(EntityChange::Comment);
    Ok(DomainEvent::CommentAdded { task_id, author_id })
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Renders one action-log line: local timestamp, then the sentence.
fn action_line(timestamp_ms: i64, sentence: &str) -> String {
    let stamp = match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(moment) => moment.format("%d.%m.%Y %H:%M").to_string(),
        None => timestamp_ms.to_string(),
    };
    format!("{stamp} {sentence}\n")
}

fn load_actor(conn: &Connection, actor_id: ActorId) -> ServiceResult<Actor> {
    let org = SqliteOrgRepository::new(conn);
    Ok(org
        .get_actor(actor_id)?
        .ok_or(ServiceError::PermissionDenied {
            actor_id,
            action: "act without an account",
        })?)
}

fn actor_display_name(conn: &Connection, actor_id: ActorId) -> ServiceResult<String> {
    let org = SqliteOrgRepository::new(conn);
    if let Some(engineer) = org.engineer_for_actor(actor_id)? {
        return Ok(engineer.display_name());
    }
    Ok(load_actor(conn, actor_id)?.username)
}

fn engineer_actor_id(
    conn: &Connection,
    engineer_id: EngineerId,
) -> ServiceResult<Option<ActorId>> {
    let org = SqliteOrgRepository::new(conn);
    Ok(org.get_engineer(engineer_id)?.and_then(|e| e.actor_id))
}

fn notify_task_creator(
    conn: &Connection,
    sink: &dyn NotificationSink,
    tasks: &SqliteTaskRepository<'_>,
    task_id: TaskId,
    acting_actor_id: ActorId,
    message: &str,
    timestamp_ms: i64,
) -> ServiceResult<()> {
    let task = tasks
        .get_task(task_id, true)?
        .ok_or(TaskRepoError::NotFound(task_id))?;
    if task.creator_id != acting_actor_id {
        sink.notify(conn, task.creator_id, message, timestamp_ms)?;
    }
    Ok(())
}

fn notify_engineer(
    conn: &Connection,
    sink: &dyn NotificationSink,
    engineer_id: EngineerId,
    message: &str,
    timestamp_ms: i64,
) -> ServiceResult<()> {
    if let Some(actor_id) = engineer_actor_id(conn, engineer_id)? {
        sink.notify(conn, actor_id, message, timestamp_ms)?;
    }
    Ok(())
}
