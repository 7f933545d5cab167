// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-side failures as values, and the execution result envelope.
//!
//! A worker never panics its way out of the dispatch boundary: every failure
//! is a [`TaskError`] carried inside a [`TaskResult`]. Error codes are open
//! strings (workers mint `HTTP_<code>` and service-specific codes), with the
//! core's own codes collected in [`codes`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error codes the core itself produces or classifies.
pub mod codes {
    /// Worker received a task type it did not advertise; non-recoverable.
    pub const UNKNOWN_TASK_TYPE: &str = "UNKNOWN_TASK_TYPE";
    /// No capable worker was found; recoverable — the task stays queued.
    pub const NO_AGENT_AVAILABLE: &str = "NO_AGENT_AVAILABLE";
    /// Workspace lookup miss; non-recoverable for the caller.
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// Generic worker fault; recoverable by default.
    pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";
    /// A worker invocation exceeded its deadline; recoverable.
    pub const TIMEOUT: &str = "TIMEOUT";
    /// All permitted attempts failed recoverably; non-recoverable.
    pub const RETRY_EXHAUSTED: &str = "RETRY_EXHAUSTED";
    /// Exception escaping the worker boundary; recoverable.
    pub const DISPATCH_ERROR: &str = "DISPATCH_ERROR";
}

/// An error produced while executing a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct TaskError {
    pub code: String,
    pub message: String,
    /// Whether retrying might succeed.
    pub recoverable: bool,
    /// Minimum wait before the next attempt, when the failing service says so.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl TaskError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            recoverable,
            retry_after_ms: None,
        }
    }

    /// Recoverable error with the given code.
    pub fn recoverable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, true)
    }

    /// Non-recoverable error with the given code.
    pub fn fatal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, false)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::fatal(codes::NOT_FOUND, message)
    }

    pub fn unknown_task_type(task_type: &str) -> Self {
        Self::fatal(
            codes::UNKNOWN_TASK_TYPE,
            format!("unknown task type: {}", task_type),
        )
    }

    pub fn no_agent_available(task_type: &str) -> Self {
        Self::recoverable(
            codes::NO_AGENT_AVAILABLE,
            format!("no agent available for task type: {}", task_type),
        )
    }

    /// Transport-level HTTP failure. Server-side statuses (>= 500) are
    /// recoverable; client-side statuses are not.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(format!("HTTP_{}", status), message, status >= 500)
    }

    pub fn with_retry_after_ms(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self
    }
}

/// Outcome of one task execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    /// Result payload on success; opaque to the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    #[serde(default)]
    pub execution_time_ms: u64,
    /// Set when the execution parked the work behind an approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<String>,
}

impl TaskResult {
    /// Successful result with the given payload.
    pub fn ok(data: Map<String, Value>) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Self::default()
        }
    }

    /// Failed result carrying the given error.
    pub fn err(error: TaskError) -> Self {
        Self {
            success: false,
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn with_execution_time_ms(mut self, ms: u64) -> Self {
        self.execution_time_ms = ms;
        self
    }

    /// Error code, or "unknown" for a failure without one.
    pub fn error_code(&self) -> &str {
        self.error.as_ref().map(|e| e.code.as_str()).unwrap_or("unknown")
    }

    /// Whether a retry of this result might succeed.
    pub fn is_recoverable(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.recoverable)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
