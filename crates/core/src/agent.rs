// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker contract: capabilities, health, and the [`Agent`] trait.

use crate::error::TaskResult;
use crate::task::{Priority, Task};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A string-identified action a worker can perform.
///
/// `name` matches task `type` strings (`domain:action`). Schemas are opaque
/// JSON Schema blobs carried for external validators; the core never
/// interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requires_approval: bool,
    /// Default priority for tasks of this capability.
    #[serde(default)]
    pub priority: Priority,
    /// Default timeout for tasks of this capability.
    #[serde(default = "default_capability_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

fn default_capability_timeout_ms() -> u64 {
    30_000
}

impl Capability {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            requires_approval: false,
            priority: Priority::Medium,
            timeout_ms: default_capability_timeout_ms(),
            input_schema: None,
            output_schema: None,
        }
    }
}

/// Point-in-time health of a worker, refreshed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub healthy: bool,
    pub last_check: DateTime<Utc>,
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthSnapshot {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            last_check: Utc::now(),
            details: Map::new(),
            error: None,
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            last_check: Utc::now(),
            details: Map::new(),
            error: Some(error.into()),
        }
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }
}

/// Contract every worker implements to join the coordination loop.
///
/// The core holds workers as `Arc<dyn Agent>` and never inspects their
/// internals: routing goes through `can_handle`, execution through `execute`,
/// liveness through `health_check`.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique worker name.
    fn name(&self) -> &str;

    /// Semantic version string.
    fn version(&self) -> &str;

    /// Advertised capabilities; `can_handle` matches task types against these.
    fn capabilities(&self) -> &[Capability];

    /// Acquire resources before the first dispatch. Default: nothing to do.
    async fn initialize(&self) -> Result<(), crate::error::TaskError> {
        Ok(())
    }

    /// Execute a task. Failures are values: return a failed [`TaskResult`],
    /// never panic across this boundary.
    async fn execute(&self, task: &Task) -> TaskResult;

    /// Release resources. Default: nothing to do.
    async fn shutdown(&self) {}

    /// Report current health. Default: healthy with no details.
    async fn health_check(&self) -> HealthSnapshot {
        HealthSnapshot::healthy()
    }

    /// Whether this worker advertises the task's type.
    fn can_handle(&self, task: &Task) -> bool {
        self.capabilities().iter().any(|c| c.name == task.task_type)
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
