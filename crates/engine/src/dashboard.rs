// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard projection: a flat snapshot of system state rendered to
//! Markdown and written atomically.
//!
//! Rendering and writing never fail the cycle that triggered them — the
//! loop logs and moves on.

use crate::bus::EventBus;
use crate::runtime::LoopStatus;
use chrono::{DateTime, Utc};
use hive_core::{LogData, StructuredLogger};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

/// Task counters for the current session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub pending: usize,
    pub in_progress: usize,
    pub completed_today: u64,
    pub failed_today: u64,
}

/// One worker's row in the health table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHealthEntry {
    pub name: String,
    /// "healthy", "unhealthy", or "unknown" (never probed).
    pub status: String,
    /// Relative time of the last dispatch, e.g. "2m ago".
    pub last_activity: String,
    pub tasks_completed: u64,
}

/// One line of the recent-activity feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub action: String,
    /// "success", "failure", or "pending".
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Condensed pending approval shown on the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalSummary {
    pub id: String,
    pub action_type: String,
    pub requested_at: DateTime<Utc>,
    pub user_id: String,
    pub summary: String,
}

/// The full renderable snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    pub loop_status: LoopStatus,
    pub active_agents: usize,
    pub total_agents: usize,
    pub cycle_number: u64,
    pub pending_approvals: Vec<ApprovalSummary>,
    pub recent_activity: Vec<ActivityEntry>,
    pub task_stats: TaskStats,
    pub agent_health: Vec<AgentHealthEntry>,
    pub last_updated: DateTime<Utc>,
}

impl DashboardState {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Bounded ring buffer of recent task activity, fed from `task:*` events.
#[derive(Clone)]
pub struct ActivityFeed {
    entries: Arc<Mutex<VecDeque<ActivityEntry>>>,
    capacity: usize,
}

impl ActivityFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Subscribe to `task:*` on the bus, translating lifecycle events into
    /// feed lines.
    pub fn subscribe(&self, bus: &EventBus) {
        let feed = self.clone();
        bus.on("task:*", move |topic, data| {
            let result = match topic {
                "task:completed" => "success",
                "task:failed" => "failure",
                _ => "pending",
            };
            let source = data
                .get("taskId")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let details = data
                .get("error")
                .and_then(Value::as_str)
                .map(|s| s.to_string());
            feed.record(source, topic.to_string(), result.to_string(), details);
        });
    }

    pub fn record(&self, source: String, action: String, result: String, details: Option<String>) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(ActivityEntry {
            timestamp: Utc::now(),
            source,
            action,
            result,
            details,
        });
    }

    /// Most recent entries, newest first, capped at `limit`.
    pub fn recent(&self, limit: usize) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Renders [`DashboardState`] to Markdown and writes it atomically.
pub struct DashboardProjector {
    path: PathBuf,
    logger: StructuredLogger,
}

impl DashboardProjector {
    pub fn new(path: impl Into<PathBuf>, log_dir: Option<PathBuf>) -> Self {
        Self {
            path: path.into(),
            logger: StructuredLogger::new("loop:dashboard", log_dir),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Render the fixed Markdown template.
    pub fn render(state: &DashboardState) -> String {
        let ts = state.last_updated.format("%Y-%m-%d %H:%M:%S");
        let mut out = String::new();

        let _ = writeln!(out, "# Hive Dashboard");
        let _ = writeln!(out, "> Auto-generated at {}", ts);
        let _ = writeln!(out);
        let _ = writeln!(out, "## System Status");
        let _ = writeln!(
            out,
            "- **Coordination Loop**: {}",
            state.loop_status.to_string().to_uppercase()
        );
        let _ = writeln!(
            out,
            "- **Active Agents**: {}/{}",
            state.active_agents, state.total_agents
        );
        let _ = writeln!(out, "- **Current Cycle**: #{}", state.cycle_number);
        let _ = writeln!(out);

        let _ = writeln!(out, "## Agent Health");
        let _ = writeln!(out, "| Agent | Status | Last Activity | Tasks Completed |");
        let _ = writeln!(out, "|-------|--------|---------------|-----------------|");
        for agent in &state.agent_health {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                agent.name, agent.status, agent.last_activity, agent.tasks_completed
            );
        }
        let _ = writeln!(out);

        let _ = writeln!(
            out,
            "## Pending Approvals ({})",
            state.pending_approvals.len()
        );
        if state.pending_approvals.is_empty() {
            let _ = writeln!(out, "*No pending approvals*");
        } else {
            for approval in &state.pending_approvals {
                let _ = writeln!(out);
                let _ = writeln!(out, "### {}", approval.action_type);
                let _ = writeln!(out, "- **ID**: `{}`", approval.id);
                let _ = writeln!(
                    out,
                    "- **Requested**: {}",
                    approval.requested_at.format("%Y-%m-%d %H:%M:%S")
                );
                let _ = writeln!(out, "- **User**: {}", approval.user_id);
                let _ = writeln!(out, "- **Details**: {}", approval.summary);
            }
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "## Recent Activity");
        if state.recent_activity.is_empty() {
            let _ = writeln!(out, "*No recent activity*");
        } else {
            for activity in &state.recent_activity {
                let _ = write!(
                    out,
                    "- [{}] **{}**: {} - {}",
                    activity.timestamp.format("%H:%M:%S"),
                    activity.source,
                    activity.action,
                    activity.result
                );
                if let Some(details) = &activity.details {
                    let _ = write!(out, " ({})", details);
                }
                let _ = writeln!(out);
            }
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "## Task Queue");
        let _ = writeln!(out, "- **Pending**: {}", state.task_stats.pending);
        let _ = writeln!(out, "- **In Progress**: {}", state.task_stats.in_progress);
        let _ = writeln!(
            out,
            "- **Completed Today**: {}",
            state.task_stats.completed_today
        );
        let _ = writeln!(out, "- **Failed Today**: {}", state.task_stats.failed_today);
        let _ = writeln!(out);
        let _ = writeln!(out, "---");
        let _ = writeln!(out, "*Last updated: {}*", ts);

        out
    }

    /// Render and write via temp-file rename.
    pub async fn write(&self, state: &DashboardState) -> std::io::Result<()> {
        let content = Self::render(state);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = self.path.with_extension("tmp");
        if let Err(e) = tokio::fs::write(&temp, &content).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }

        self.logger.info(
            "write_dashboard",
            LogData::output(serde_json::json!({
                "path": self.path.display().to_string(),
                "size": content.len(),
            })),
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "dashboard_tests.rs"]
mod tests;
