//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical ticket record and its lifecycle helpers.
//!
//! # Invariants
//! - `creator_id` is fixed at creation and never changes.
//! - Tasks are never hard-deleted; `deleted` is the tombstone flag.
//! - A deleted task is excluded from every visibility rule, including
//!   the creator's own view.

use serde::{Deserialize, Serialize};

/// Stable identifier for a task.
pub type TaskId = i64;
/// Stable identifier for a tag.
pub type TagId = i64;
/// Stable identifier for a task comment.
pub type CommentId = i64;

/// Task and object priority scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Storage representation of a priority value.
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    /// Parses a storage/request value. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CRITICAL" => Some(Self::Critical),
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Canonical ticket record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub priority: Priority,
    pub is_done: bool,
    /// Soft-delete tombstone.
    pub deleted: bool,
    /// Deadline in epoch milliseconds. `None` means no deadline set.
    pub completion_time: Option<i64>,
    /// Creation timestamp in epoch milliseconds.
    pub create_time: i64,
    pub header: String,
    pub text: String,
    /// Append-only action log rendered under the task.
    pub completion_text: String,
    pub creator_id: i64,
}

impl Task {
    /// Marks this task as softly deleted (tombstoned).
    pub fn soft_delete(&mut self) {
        self.deleted = true;
    }

    /// Returns whether this task should be considered visible/active.
    pub fn is_active(&self) -> bool {
        !self.deleted
    }
}

/// Free-form label attachable to tasks and objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// Discussion entry under one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub task_id: TaskId,
    pub author_id: i64,
    pub text: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}
