// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability routing with health, load, and success-rate scoring.
//!
//! The dispatcher owns the worker registry and all per-worker bookkeeping
//! (stats and health snapshots). Candidate scoring starts from 100 and
//! applies: −50 for known-unhealthy workers, −10 per unit of current load
//! (with a hard cap at `max_agent_load`), +20 · success-rate, and up to +10
//! for fast average execution. Ties keep registration order.

use crate::bus::{topics, EventBus};
use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use hive_core::{
    Agent, Clock, HealthSnapshot, LogContext, LogData, StructuredLogger, Task, TaskError,
    TaskResult,
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Deadline for a single worker health probe.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Dispatcher tuning knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Penalise workers whose last health probe failed.
    pub prefer_healthy_agents: bool,
    /// Spread load: penalise loaded workers and cap per-worker concurrency.
    pub load_balance: bool,
    /// Concurrent tasks allowed per worker when load balancing.
    pub max_agent_load: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            prefer_healthy_agents: true,
            load_balance: true,
            max_agent_load: 3,
        }
    }
}

/// Runtime statistics for one worker. Owned exclusively by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentStats {
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
    pub current_load: u32,
    pub last_dispatch: Option<DateTime<Utc>>,
    pub avg_execution_time_ms: f64,
}

/// Registration summary exposed to the dashboard and operators.
#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub version: String,
    pub capabilities: Vec<String>,
    pub healthy: Option<bool>,
    pub current_load: u32,
    pub completed: u64,
    pub failed: u64,
}

struct AgentEntry {
    agent: Arc<dyn Agent>,
    stats: AgentStats,
    health: Option<HealthSnapshot>,
}

/// Worker registry and capability router.
///
/// The registry map is single-writer through the dispatcher's own methods;
/// readers get cloned snapshots.
pub struct Dispatcher<C: Clock> {
    config: DispatcherConfig,
    retry: RetryPolicy,
    clock: C,
    bus: Arc<EventBus>,
    logger: StructuredLogger,
    agents: Mutex<IndexMap<String, AgentEntry>>,
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(
        config: DispatcherConfig,
        retry: RetryPolicy,
        clock: C,
        bus: Arc<EventBus>,
        log_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            config,
            retry,
            clock,
            bus,
            logger: StructuredLogger::new("loop:dispatcher", log_dir),
            agents: Mutex::new(IndexMap::new()),
        }
    }

    /// Register a worker. Stats reset; a re-registration replaces the old
    /// entry in place.
    pub fn register(&self, agent: Arc<dyn Agent>) {
        let name = agent.name().to_string();
        let capabilities: Vec<String> = agent
            .capabilities()
            .iter()
            .map(|c| c.name.clone())
            .collect();

        self.agents.lock().insert(
            name.clone(),
            AgentEntry {
                agent,
                stats: AgentStats::default(),
                health: None,
            },
        );

        self.logger.info(
            "register_agent",
            LogData::input(json!({ "name": name, "capabilities": capabilities })),
        );
        self.bus.emit(
            topics::AGENT_STATUS,
            json!({ "action": "registered", "name": name, "capabilities": capabilities }),
        );
    }

    /// Remove a worker and its stats/health. Returns whether it was present.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.agents.lock().shift_remove(name).is_some();
        if removed {
            self.logger
                .info("unregister_agent", LogData::input(json!({ "name": name })));
            self.bus.emit(
                topics::AGENT_STATUS,
                json!({ "action": "unregistered", "name": name }),
            );
        }
        removed
    }

    /// Select the best capable worker for a task, or `None`.
    pub fn find_agent(&self, task: &Task) -> Option<Arc<dyn Agent>> {
        let agents = self.agents.lock();
        let mut best: Option<(Arc<dyn Agent>, f64)> = None;

        for entry in agents.values() {
            if !entry.agent.can_handle(task) {
                continue;
            }
            let score = self.score(&entry.stats, entry.health.as_ref());
            if score <= 0.0 {
                continue;
            }
            // Strict comparison keeps the earliest-registered worker on ties
            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((Arc::clone(&entry.agent), score));
            }
        }
        drop(agents);

        match &best {
            Some((agent, _)) => self.logger.info(
                "find_agent",
                LogData::input(json!({ "taskType": task.task_type, "taskId": task.id.as_str() }))
                    .with_output(json!({ "selected": agent.name() })),
            ),
            None => self.logger.warn(
                "find_agent:no_candidates",
                LogData::input(json!({ "taskType": task.task_type })),
            ),
        }

        best.map(|(agent, _)| agent)
    }

    fn score(&self, stats: &AgentStats, health: Option<&HealthSnapshot>) -> f64 {
        let mut score = 100.0;

        if self.config.prefer_healthy_agents {
            if let Some(health) = health {
                if !health.healthy {
                    score -= 50.0;
                }
            }
        }

        if self.config.load_balance {
            if stats.current_load >= self.config.max_agent_load {
                return 0.0;
            }
            score -= stats.current_load as f64 * 10.0;
        }

        if stats.dispatched > 0 {
            score += 20.0 * (stats.completed as f64 / stats.dispatched as f64);
        }

        if stats.avg_execution_time_ms > 0.0 {
            score += (10.0 - stats.avg_execution_time_ms / 1000.0).max(0.0);
        }

        score.max(0.0)
    }

    /// Route a task to its best worker and run it under the retry policy.
    ///
    /// Stats are bracketed around the invocation: dispatched/current_load up
    /// front, completed-or-failed plus load release on return.
    pub async fn dispatch(&self, task: &Task, cancel: &CancellationToken) -> TaskResult {
        let logger = self.logger.with_context(LogContext::new(
            task.correlation_id.clone(),
            Some(task.user_id.clone()),
        ));

        let Some(agent) = self.find_agent(task) else {
            logger.error(
                "dispatch:no_agent",
                hive_core::codes::NO_AGENT_AVAILABLE,
                &format!("no agent available for task type: {}", task.task_type),
                LogData::input(json!({ "taskId": task.id.as_str(), "type": task.task_type })),
            );
            return TaskResult::err(TaskError::no_agent_available(&task.task_type));
        };
        let name = agent.name().to_string();

        {
            let mut agents = self.agents.lock();
            if let Some(entry) = agents.get_mut(&name) {
                entry.stats.dispatched += 1;
                entry.stats.current_load += 1;
                entry.stats.last_dispatch = Some(Utc::now());
            }
        }

        logger.info(
            "dispatch",
            LogData::input(json!({
                "taskId": task.id.as_str(),
                "type": task.task_type,
                "agent": name,
            })),
        );

        let started = self.clock.now();
        let result = self.retry.execute(agent, task, cancel).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        {
            let mut agents = self.agents.lock();
            if let Some(entry) = agents.get_mut(&name) {
                let stats = &mut entry.stats;
                stats.current_load = stats.current_load.saturating_sub(1);
                if result.success {
                    stats.completed += 1;
                } else {
                    stats.failed += 1;
                }
                let finished = stats.completed + stats.failed;
                stats.avg_execution_time_ms = (stats.avg_execution_time_ms
                    * (finished - 1) as f64
                    + result.execution_time_ms as f64)
                    / finished as f64;
            }
        }

        logger.info(
            "dispatch:done",
            LogData::output(json!({
                "taskId": task.id.as_str(),
                "agent": name,
                "success": result.success,
                "error": result.error.as_ref().map(|e| e.code.clone()),
            }))
            .with_duration_ms(elapsed_ms),
        );

        result
    }

    /// Probe every worker's health under a bounded deadline.
    ///
    /// A probe that errors or overruns marks the worker unhealthy with the
    /// captured message. Emits one `agent:status`/health event per worker.
    pub async fn refresh_health(&self) {
        let probes: Vec<(String, Arc<dyn Agent>)> = {
            let agents = self.agents.lock();
            agents
                .iter()
                .map(|(name, entry)| (name.clone(), Arc::clone(&entry.agent)))
                .collect()
        };

        for (name, agent) in probes {
            let health = match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, agent.health_check())
                .await
            {
                Ok(health) => health,
                Err(_elapsed) => {
                    self.logger.error(
                        "refresh_health",
                        hive_core::codes::TIMEOUT,
                        "health check timed out",
                        LogData::input(json!({ "agent": name })),
                    );
                    HealthSnapshot::unhealthy("health check timed out")
                }
            };

            self.bus.emit(
                topics::AGENT_STATUS,
                json!({
                    "action": "health",
                    "name": name,
                    "healthy": health.healthy,
                    "details": health.details,
                }),
            );

            if let Some(entry) = self.agents.lock().get_mut(&name) {
                entry.health = Some(health);
            }
        }
    }

    /// Stats snapshot for one worker.
    pub fn stats(&self, name: &str) -> Option<AgentStats> {
        self.agents.lock().get(name).map(|e| e.stats.clone())
    }

    /// Stats snapshot for every worker, in registration order.
    pub fn all_stats(&self) -> IndexMap<String, AgentStats> {
        self.agents
            .lock()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.stats.clone()))
            .collect()
    }

    /// Last recorded health snapshot for one worker.
    pub fn health(&self, name: &str) -> Option<HealthSnapshot> {
        self.agents.lock().get(name).and_then(|e| e.health.clone())
    }

    /// Names of workers advertising a task type, in registration order.
    pub fn capable_agents(&self, task_type: &str) -> Vec<String> {
        self.agents
            .lock()
            .iter()
            .filter(|(_, entry)| {
                entry
                    .agent
                    .capabilities()
                    .iter()
                    .any(|c| c.name == task_type)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Registration summaries for every worker.
    pub fn registered_agents(&self) -> Vec<AgentInfo> {
        self.agents
            .lock()
            .iter()
            .map(|(name, entry)| AgentInfo {
                name: name.clone(),
                version: entry.agent.version().to_string(),
                capabilities: entry
                    .agent
                    .capabilities()
                    .iter()
                    .map(|c| c.name.clone())
                    .collect(),
                healthy: entry.health.as_ref().map(|h| h.healthy),
                current_load: entry.stats.current_load,
                completed: entry.stats.completed,
                failed: entry.stats.failed,
            })
            .collect()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.lock().len()
    }

    /// Ask every worker to release its resources.
    pub async fn shutdown_agents(&self) {
        let agents: Vec<Arc<dyn Agent>> = {
            let map = self.agents.lock();
            map.values().map(|e| Arc::clone(&e.agent)).collect()
        };
        for agent in agents {
            agent.shutdown().await;
        }
    }

    /// Test hook: overwrite a worker's stats.
    #[cfg(test)]
    pub(crate) fn set_stats(&self, name: &str, stats: AgentStats) {
        if let Some(entry) = self.agents.lock().get_mut(name) {
            entry.stats = stats;
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
