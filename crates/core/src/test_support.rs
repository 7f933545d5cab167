// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::agent::{Agent, Capability, HealthSnapshot};
use crate::clock::ManualClock;
use crate::error::{TaskError, TaskResult};
use crate::task::{CorrelationId, Priority, Task, TaskId, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

// ── Task builder ────────────────────────────────────────────────────────────

/// Builder for tasks with sensible test defaults.
pub struct TaskBuilder {
    id: TaskId,
    task_type: String,
    payload: Map<String, Value>,
    priority: Priority,
    timeout_ms: u64,
    requires_approval: bool,
    correlation_id: CorrelationId,
    user_id: String,
    created_at: DateTime<Utc>,
    status: TaskStatus,
}

impl TaskBuilder {
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            id: TaskId::new("task-1"),
            task_type: task_type.into(),
            payload: Map::new(),
            priority: Priority::Medium,
            timeout_ms: 30_000,
            requires_approval: false,
            correlation_id: CorrelationId::new("corr-1"),
            user_id: "test-user".to_string(),
            created_at: Utc
                .timestamp_millis_opt(ManualClock::ORIGIN_EPOCH_MS as i64)
                .single()
                .unwrap_or_default(),
            status: TaskStatus::Created,
        }
    }

    pub fn id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn requires_approval(mut self, yes: bool) -> Self {
        self.requires_approval = yes;
        self
    }

    pub fn correlation_id(mut self, id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = id.into();
        self
    }

    pub fn user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = id.into();
        self
    }

    /// Set creation time from epoch milliseconds (pairs with
    /// [`ManualClock::ORIGIN_EPOCH_MS`] for exact age arithmetic).
    pub fn created_at_epoch_ms(mut self, ms: u64) -> Self {
        self.created_at = Utc.timestamp_millis_opt(ms as i64).single().unwrap_or_default();
        self
    }

    pub fn payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> Task {
        Task {
            id: self.id,
            task_type: self.task_type,
            payload: self.payload,
            priority: self.priority,
            timeout_ms: self.timeout_ms,
            requires_approval: self.requires_approval,
            correlation_id: self.correlation_id,
            user_id: self.user_id,
            created_at: self.created_at,
            status: self.status,
        }
    }
}

// ── Stub agent ──────────────────────────────────────────────────────────────

/// Scriptable in-memory agent.
///
/// `execute` pops scripted results in order, then repeats the fallback
/// (success with empty data unless overridden). Optional execute/health
/// delays let tests exercise timeouts and load.
pub struct StubAgent {
    name: String,
    version: String,
    capabilities: Vec<Capability>,
    scripted: Mutex<VecDeque<TaskResult>>,
    fallback: TaskResult,
    execute_delay: Option<Duration>,
    health_delay: Option<Duration>,
    healthy: AtomicBool,
    calls: AtomicUsize,
    executed: Mutex<Vec<TaskId>>,
}

impl StubAgent {
    pub fn new(name: impl Into<String>, capability_names: &[&str]) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            capabilities: capability_names
                .iter()
                .map(|n| Capability::new(*n, "stub capability"))
                .collect(),
            scripted: Mutex::new(VecDeque::new()),
            fallback: TaskResult::ok(Map::new()),
            execute_delay: None,
            health_delay: None,
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Queue results returned by successive `execute` calls.
    pub fn with_results(self, results: Vec<TaskResult>) -> Self {
        *self.scripted.lock() = results.into();
        self
    }

    /// Result returned once the script is exhausted.
    pub fn with_fallback(mut self, result: TaskResult) -> Self {
        self.fallback = result;
        self
    }

    /// Sleep this long inside every `execute` call.
    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = Some(delay);
        self
    }

    /// Sleep this long inside every `health_check` call.
    pub fn with_health_delay(mut self, delay: Duration) -> Self {
        self.health_delay = Some(delay);
        self
    }

    pub fn with_healthy(self, healthy: bool) -> Self {
        self.healthy.store(healthy, Ordering::SeqCst);
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of `execute` calls observed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Ids of tasks executed, in order.
    pub fn executed(&self) -> Vec<TaskId> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl Agent for StubAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    async fn execute(&self, task: &Task) -> TaskResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.executed.lock().push(task.id.clone());

        if let Some(delay) = self.execute_delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.scripted.lock().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }

    async fn health_check(&self) -> HealthSnapshot {
        if let Some(delay) = self.health_delay {
            tokio::time::sleep(delay).await;
        }
        if self.healthy.load(Ordering::SeqCst) {
            HealthSnapshot::healthy()
        } else {
            HealthSnapshot::unhealthy("stub marked unhealthy")
        }
    }
}

/// Shorthand for a recoverable HTTP 503 failure result.
pub fn http_503_result() -> TaskResult {
    TaskResult::err(TaskError::http(503, "service unavailable"))
}

/// Shorthand for a non-recoverable bad-input failure result.
pub fn bad_input_result() -> TaskResult {
    TaskResult::err(TaskError::fatal("BAD_INPUT", "malformed payload"))
}
