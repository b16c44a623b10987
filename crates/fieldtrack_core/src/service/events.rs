//! Domain events and notification delivery.
//!
//! # Responsibility
//! - Name the task lifecycle events mutations emit.
//! - Deliver per-actor notifications through a pluggable sink.
//!
//! # Invariants
//! - Sinks receive the same connection the mutation runs on, so delivery
//!   commits or rolls back together with the triggering write.

use crate::db::DbError;
use crate::model::{ActorId, EngineerId, TaskId};
use log::info;
use rusqlite::{params, Connection};

/// Task lifecycle event emitted by the mutation services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainEvent {
    AssignmentAdded {
        task_id: TaskId,
        engineer_id: EngineerId,
    },
    AssignmentRemoved {
        task_id: TaskId,
        engineer_id: EngineerId,
    },
    StatusChanged { task_id: TaskId, is_done: bool },
    CommentAdded { task_id: TaskId, author_id: ActorId },
}

/// Receives rendered notifications for one actor.
pub trait NotificationSink {
    fn notify(
        &self,
        conn: &Connection,
        actor_id: ActorId,
        message: &str,
        timestamp_ms: i64,
    ) -> Result<(), DbError>;
}

/// Stores notifications in the `notifications` table.
#[derive(Debug, Default)]
pub struct SqliteNotificationSink;

impl NotificationSink for SqliteNotificationSink {
    fn notify(
        &self,
        conn: &Connection,
        actor_id: ActorId,
        message: &str,
        timestamp_ms: i64,
    ) -> Result<(), DbError> {
        conn.execute(
            "INSERT INTO notifications (actor_id, message, created_at) VALUES (?1, ?2, ?3);",
            params![actor_id, message, timestamp_ms],
        )?;
        info!("event=notification_stored module=service status=ok actor_id={actor_id}");
        Ok(())
    }
}

/// Sink that drops every notification; for callers without delivery.
#[derive(Debug, Default)]
pub struct NullNotificationSink;

impl NotificationSink for NullNotificationSink {
    fn notify(
        &self,
        _conn: &Connection,
        _actor_id: ActorId,
        _message: &str,
        _timestamp_ms: i64,
    ) -> Result<(), DbError> {
        Ok(())
    }
}
