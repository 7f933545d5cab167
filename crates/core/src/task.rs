// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task identity, priority, and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of a task document.
///
/// The id doubles as the vault filename: task `t1` is persisted as
/// `t1.json` in whichever folder mirrors its current status, and moving the
/// document between folders never rewrites it. Ids are opaque — producers
/// usually mint UUIDs, but any filename-safe string works.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<&str> for TaskId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Trace identifier threaded from a task through every log record and event
/// it touches.
///
/// Minted once when a task enters the system (or recovered from its
/// document) and carried verbatim across cycle, dispatch, and worker logs;
/// the core never interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh UUID-backed trace id for a task that arrived without one.
    pub fn mint() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<&str> for CorrelationId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Task priority levels, lowest to highest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// All priorities, lowest first.
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

/// Task execution status.
///
/// Transitions form the lifecycle state machine; the vault folder a task
/// document lives in is always derivable from its status (see
/// [`TaskStatus::can_transition`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Created,
    Queued,
    Dispatched,
    Executing,
    AwaitingApproval,
    Approved,
    Rejected,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Check if this status is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Rejected
        )
    }

    /// Check whether `self → to` is a legal lifecycle transition.
    pub fn can_transition(&self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Created, Queued)
                | (Queued, Dispatched)
                | (Queued, AwaitingApproval)
                | (Dispatched, Executing)
                | (Executing, Completed)
                | (Executing, Failed)
                | (AwaitingApproval, Approved)
                | (AwaitingApproval, Rejected)
                | (Approved, Executing)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Created => write!(f, "created"),
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::Dispatched => write!(f, "dispatched"),
            TaskStatus::Executing => write!(f, "executing"),
            TaskStatus::AwaitingApproval => write!(f, "awaiting_approval"),
            TaskStatus::Approved => write!(f, "approved"),
            TaskStatus::Rejected => write!(f, "rejected"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A unit of work, addressed to a worker by its `task_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// `domain:action` string matched against worker capabilities.
    #[serde(rename = "type")]
    pub task_type: String,
    /// Opaque payload; only the target worker interprets it.
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub requires_approval: bool,
    pub correlation_id: CorrelationId,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: TaskStatus,
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// Error produced when a vault document cannot be parsed into a [`Task`].
#[derive(Debug, thiserror::Error)]
#[error("invalid task field `{field}`: {message}")]
pub struct TaskParseError {
    pub field: &'static str,
    pub message: String,
}

impl TaskParseError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Task {
    /// Build a task from raw vault document content.
    ///
    /// Mirrors the tolerant scan-phase parse: missing fields fall back to
    /// defaults (`fallback_id` is the document id, priority is medium,
    /// `user_id` is "system", a fresh correlation id is minted), while a
    /// present-but-invalid field is an error so the caller can skip the
    /// document and keep scanning.
    pub fn parse(
        content: &Map<String, Value>,
        fallback_id: &str,
        default_timeout_ms: u64,
    ) -> Result<Self, TaskParseError> {
        let id = match content.get("id") {
            Some(v) => v
                .as_str()
                .map(TaskId::from)
                .ok_or_else(|| TaskParseError::new("id", "expected a string"))?,
            None => TaskId::new(fallback_id),
        };

        let task_type = content
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| TaskParseError::new("type", "missing or not a string"))?
            .to_string();

        let payload = match content.get("payload") {
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(TaskParseError::new("payload", "expected an object")),
            None => Map::new(),
        };

        let priority = match content.get("priority") {
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| TaskParseError::new("priority", e.to_string()))?,
            None => Priority::Medium,
        };

        let timeout_ms = match content.get("timeout_ms") {
            Some(v) => v
                .as_u64()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| TaskParseError::new("timeout_ms", "expected a positive integer"))?,
            None => default_timeout_ms,
        };

        let requires_approval = content
            .get("requires_approval")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let correlation_id = content
            .get("correlation_id")
            .and_then(Value::as_str)
            .map(CorrelationId::from)
            .unwrap_or_else(CorrelationId::mint);

        let user_id = content
            .get("user_id")
            .and_then(Value::as_str)
            .unwrap_or("system")
            .to_string();

        let created_at = match content.get("created_at") {
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| TaskParseError::new("created_at", e.to_string()))?,
            None => Utc::now(),
        };

        let status = match content.get("status") {
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| TaskParseError::new("status", e.to_string()))?,
            None => TaskStatus::Created,
        };

        Ok(Task {
            id,
            task_type,
            payload,
            priority,
            timeout_ms,
            requires_approval,
            correlation_id,
            user_id,
            created_at,
            status,
        })
    }

    /// Milliseconds this task has waited since creation, per the given
    /// wall-clock epoch. Saturates at zero for clocks behind `created_at`.
    pub fn age_ms(&self, now_epoch_ms: u64) -> u64 {
        let created_ms = self.created_at.timestamp_millis().max(0) as u64;
        now_epoch_ms.saturating_sub(created_ms)
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
