// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The autonomous coordination loop.
//!
//! A single driver task owns the cycle state machine:
//! scan `Needs_Action` → prioritise → dispatch a bounded active set →
//! barrier on completion → refresh health and dashboard → idle wait.
//! Cycles are strictly serial; the driver never starts a cycle while a
//! previous one is still executing. `stop` cancels every suspension point
//! and joins the driver under a bounded deadline.

use crate::bus::{topics, EventBus};
use crate::config::HiveConfig;
use crate::dashboard::{
    ActivityFeed, AgentHealthEntry, ApprovalSummary, DashboardProjector, DashboardState, TaskStats,
};
use crate::dispatcher::Dispatcher;
use crate::error::EngineError;
use crate::retry::RetryPolicy;
use crate::scheduler::Scheduler;
use chrono::{DateTime, Utc};
use hive_core::{
    Agent, Clock, LogContext, LogData, StructuredLogger, SystemClock, Task, TaskStatus,
};
use hive_vault::{Folder, Vault};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// Most pending approvals surfaced on the dashboard per cycle.
const DASHBOARD_APPROVAL_LIMIT: usize = 10;

/// Most activity-feed lines surfaced on the dashboard.
const DASHBOARD_ACTIVITY_LIMIT: usize = 10;

/// Deadline for the driver to drain after a stop signal.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Loop configuration (the closed option set).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub cycle_interval_ms: u64,
    pub max_concurrent_tasks: usize,
    pub task_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub vault_path: PathBuf,
    pub dashboard_path: PathBuf,
    pub log_path: Option<PathBuf>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: 5000,
            max_concurrent_tasks: 3,
            task_timeout_ms: 30_000,
            retry_attempts: 3,
            retry_backoff_ms: 1000,
            vault_path: PathBuf::from("./vault"),
            dashboard_path: PathBuf::from("./Dashboard.md"),
            log_path: None,
        }
    }
}

/// Lifecycle status of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    Running,
    Paused,
    #[default]
    Stopped,
}

impl fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopStatus::Running => write!(f, "running"),
            LoopStatus::Paused => write!(f, "paused"),
            LoopStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Phase within one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    #[default]
    Idle,
    Scanning,
    Dispatching,
    Executing,
    Updating,
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopPhase::Idle => write!(f, "idle"),
            LoopPhase::Scanning => write!(f, "scanning"),
            LoopPhase::Dispatching => write!(f, "dispatching"),
            LoopPhase::Executing => write!(f, "executing"),
            LoopPhase::Updating => write!(f, "updating"),
        }
    }
}

/// Observable loop state.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopState {
    pub status: LoopStatus,
    pub phase: LoopPhase,
    pub cycle_number: u64,
    pub last_cycle_time: Option<DateTime<Utc>>,
    pub tasks_in_flight: usize,
    pub pending_queue_size: usize,
    pub completed_total: u64,
    pub failed_total: u64,
    pub error: Option<String>,
}

/// Everything the driver and its executor subtasks share.
struct LoopCore<C: Clock> {
    config: LoopConfig,
    vault: Arc<Vault>,
    scheduler: Scheduler<C>,
    dispatcher: Arc<Dispatcher<C>>,
    bus: Arc<EventBus>,
    projector: DashboardProjector,
    feed: ActivityFeed,
    logger: StructuredLogger,
    state: Mutex<LoopState>,
}

/// The orchestration core: owns the cycle lifecycle and wires the vault,
/// scheduler, dispatcher, and projector together.
pub struct Orchestrator<C: Clock = SystemClock> {
    core: Arc<LoopCore<C>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    cancel: Mutex<CancellationToken>,
    pause: watch::Sender<bool>,
}

impl Orchestrator<SystemClock> {
    pub fn new(config: HiveConfig, bus: Arc<EventBus>) -> Self {
        Self::with_clock(config, bus, SystemClock)
    }
}

impl<C: Clock + 'static> Orchestrator<C> {
    pub fn with_clock(config: HiveConfig, bus: Arc<EventBus>, clock: C) -> Self {
        let HiveConfig {
            loop_: loop_config,
            scheduler: scheduler_config,
            dispatcher: dispatcher_config,
        } = config;

        let log_dir = loop_config.log_path.clone();
        let vault = Arc::new(Vault::new(loop_config.vault_path.clone(), log_dir.clone()));
        let retry = RetryPolicy {
            attempts: loop_config.retry_attempts,
            initial_backoff_ms: loop_config.retry_backoff_ms,
        };
        let dispatcher = Arc::new(Dispatcher::new(
            dispatcher_config,
            retry,
            clock.clone(),
            Arc::clone(&bus),
            log_dir.clone(),
        ));
        let scheduler = Scheduler::new(scheduler_config, clock);
        let projector =
            DashboardProjector::new(loop_config.dashboard_path.clone(), log_dir.clone());
        let feed = ActivityFeed::new(64);
        feed.subscribe(&bus);

        let (pause, _) = watch::channel(false);

        Self {
            core: Arc::new(LoopCore {
                config: loop_config,
                vault,
                scheduler,
                dispatcher,
                bus,
                projector,
                feed,
                logger: StructuredLogger::new("loop:cycle", log_dir),
                state: Mutex::new(LoopState::default()),
            }),
            driver: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
            pause,
        }
    }

    pub fn vault(&self) -> Arc<Vault> {
        Arc::clone(&self.core.vault)
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher<C>> {
        Arc::clone(&self.core.dispatcher)
    }

    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.core.bus)
    }

    /// Current state snapshot.
    pub fn state(&self) -> LoopState {
        self.core.state.lock().clone()
    }

    /// Initialize a worker and add it to the dispatcher registry.
    pub async fn register_agent(
        &self,
        agent: Arc<dyn Agent>,
    ) -> Result<(), hive_core::TaskError> {
        agent.initialize().await?;
        self.core.dispatcher.register(agent);
        Ok(())
    }

    pub fn unregister_agent(&self, name: &str) -> bool {
        self.core.dispatcher.unregister(name)
    }

    /// Persist a task into `Needs_Action` so the next scan picks it up.
    pub async fn enqueue_task(&self, task: &Task) -> Result<(), EngineError> {
        let mut content = match serde_json::to_value(task) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        content.insert("status".into(), json!(TaskStatus::Queued));
        self.core
            .vault
            .create(Folder::NeedsAction, task.id.as_str(), content)
            .await?;

        self.core.logger.info(
            "enqueue_task",
            LogData::input(json!({ "taskId": task.id.as_str(), "type": task.task_type })),
        );
        self.core.bus.emit(
            topics::TASK_QUEUED,
            json!({
                "taskId": task.id.as_str(),
                "type": task.task_type,
                "priority": task.priority,
            }),
        );
        Ok(())
    }

    /// Start the loop. Requires `stopped`.
    pub async fn start(&self) -> Result<(), EngineError> {
        {
            let state = self.core.state.lock();
            if state.status != LoopStatus::Stopped {
                return Err(EngineError::InvalidTransition(format!(
                    "cannot start from {}",
                    state.status
                )));
            }
        }

        self.core.logger.info("start", LogData::default());
        self.core.vault.initialize().await?;

        let cancel = CancellationToken::new();
        *self.cancel.lock() = cancel.clone();
        let _ = self.pause.send(false);

        {
            let mut state = self.core.state.lock();
            state.status = LoopStatus::Running;
            state.error = None;
        }

        let core = Arc::clone(&self.core);
        let pause_rx = self.pause.subscribe();
        let handle = tokio::spawn(core.run(cancel, pause_rx));
        *self.driver.lock() = Some(handle);

        self.core.bus.emit(
            topics::LOOP_CYCLE,
            json!({ "action": "started", "cycleNumber": self.state().cycle_number }),
        );
        Ok(())
    }

    /// Pause after the current cycle completes. Requires `running`.
    pub fn pause(&self) -> Result<(), EngineError> {
        {
            let mut state = self.core.state.lock();
            if state.status != LoopStatus::Running {
                return Err(EngineError::InvalidTransition(format!(
                    "cannot pause from {}",
                    state.status
                )));
            }
            state.status = LoopStatus::Paused;
        }
        self.core.logger.info("pause", LogData::default());
        let _ = self.pause.send(true);
        self.core.bus.emit(
            topics::LOOP_CYCLE,
            json!({ "action": "paused", "cycleNumber": self.state().cycle_number }),
        );
        Ok(())
    }

    /// Release a paused loop. Requires `paused`.
    pub fn resume(&self) -> Result<(), EngineError> {
        {
            let mut state = self.core.state.lock();
            if state.status != LoopStatus::Paused {
                return Err(EngineError::InvalidTransition(format!(
                    "cannot resume from {}",
                    state.status
                )));
            }
            state.status = LoopStatus::Running;
        }
        self.core.logger.info("resume", LogData::default());
        let _ = self.pause.send(false);
        self.core.bus.emit(
            topics::LOOP_CYCLE,
            json!({ "action": "resumed", "cycleNumber": self.state().cycle_number }),
        );
        Ok(())
    }

    /// Stop the loop: cancel all suspension points, join the driver under a
    /// bounded deadline, then force-cancel. Requires `running` or `paused`.
    pub async fn stop(&self) -> Result<(), EngineError> {
        {
            let state = self.core.state.lock();
            if state.status == LoopStatus::Stopped {
                return Err(EngineError::InvalidTransition(
                    "cannot stop an already stopped loop".to_string(),
                ));
            }
        }

        self.core.logger.info("stop", LogData::default());
        self.cancel.lock().cancel();
        let _ = self.pause.send(false);

        let handle = self.driver.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(STOP_JOIN_TIMEOUT, &mut handle)
                .await
                .is_err()
            {
                self.core.logger.warn("stop:join_timeout", LogData::default());
                handle.abort();
            }
        }

        self.core.dispatcher.shutdown_agents().await;

        {
            let mut state = self.core.state.lock();
            state.status = LoopStatus::Stopped;
            state.phase = LoopPhase::Idle;
            state.tasks_in_flight = 0;
        }

        self.core.bus.emit(
            topics::LOOP_CYCLE,
            json!({ "action": "stopped", "cycleNumber": self.state().cycle_number }),
        );
        Ok(())
    }
}

impl<C: Clock + 'static> LoopCore<C> {
    async fn run(self: Arc<Self>, cancel: CancellationToken, mut pause: watch::Receiver<bool>) {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            // Pause gate: hold between cycles until resumed or stopped.
            while *pause.borrow() {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    changed = pause.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }
            if cancel.is_cancelled() {
                break;
            }

            Arc::clone(&self).run_cycle(&cancel).await;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_millis(self.config.cycle_interval_ms)) => {}
            }
        }
    }

    async fn run_cycle(self: Arc<Self>, cancel: &CancellationToken) {
        let cycle_number = {
            let mut state = self.state.lock();
            state.cycle_number += 1;
            state.cycle_number
        };
        let timer = self.logger.start_timer();
        self.logger.info(
            "cycle:start",
            LogData::input(json!({ "cycleNumber": cycle_number })),
        );

        // Phase 1: scan for task documents
        self.set_phase(LoopPhase::Scanning);
        let tasks = self.scan().await;

        // Phase 2: prioritise and slice the active set
        self.set_phase(LoopPhase::Dispatching);
        let mut active = self.scheduler.prioritize(tasks);
        let pending = active.split_off(active.len().min(self.config.max_concurrent_tasks));
        {
            let mut state = self.state.lock();
            state.pending_queue_size = pending.len();
            state.tasks_in_flight = active.len();
        }

        // Phase 3: execute concurrently, barrier before advancing
        self.set_phase(LoopPhase::Executing);
        let executed = active.len();
        let mut subtasks = JoinSet::new();
        for task in active {
            let core = Arc::clone(&self);
            let cancel = cancel.clone();
            subtasks.spawn(async move { core.execute_task(task, &cancel).await });
        }
        while let Some(joined) = subtasks.join_next().await {
            if joined.is_err() {
                self.logger.error(
                    "cycle:subtask_panicked",
                    hive_core::codes::EXECUTION_ERROR,
                    "executor subtask panicked",
                    LogData::default(),
                );
                self.state.lock().error = Some("executor subtask panicked".to_string());
            }
        }

        // Phase 4: refresh health and project the dashboard
        self.set_phase(LoopPhase::Updating);
        self.dispatcher.refresh_health().await;
        self.update_dashboard().await;

        {
            let mut state = self.state.lock();
            state.last_cycle_time = Some(Utc::now());
            state.phase = LoopPhase::Idle;
        }

        let duration_ms = timer();
        self.logger.info(
            "cycle:complete",
            LogData::output(json!({
                "cycleNumber": cycle_number,
                "tasksExecuted": executed,
            }))
            .with_duration_ms(duration_ms),
        );
        self.bus.emit(
            topics::LOOP_CYCLE,
            json!({
                "action": "cycleComplete",
                "cycleNumber": cycle_number,
                "tasksExecuted": executed,
                "durationMs": duration_ms,
            }),
        );
    }

    /// List and parse every document in `Needs_Action`. Unreadable or
    /// unparsable documents are logged and skipped; the scan never halts.
    async fn scan(&self) -> Vec<Task> {
        let ids = match self.vault.list(Folder::NeedsAction).await {
            Ok(ids) => ids,
            Err(e) => {
                self.logger.error(
                    "scan:error",
                    "SCAN_ERROR",
                    &e.to_string(),
                    LogData::default(),
                );
                self.state.lock().error = Some(e.to_string());
                return Vec::new();
            }
        };

        let mut tasks = Vec::new();
        for id in ids {
            let doc = match self.vault.read(Folder::NeedsAction, &id).await {
                Ok(doc) => doc,
                Err(e) => {
                    self.logger.warn(
                        "scan:unreadable",
                        LogData::input(json!({ "id": id, "error": e.to_string() })),
                    );
                    continue;
                }
            };
            match Task::parse(&doc.content, &id, self.config.task_timeout_ms) {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    self.logger.error(
                        "parse_task:error",
                        "PARSE_ERROR",
                        &e.to_string(),
                        LogData::input(json!({ "id": id })),
                    );
                }
            }
        }

        self.logger.info(
            "scan:complete",
            LogData::output(json!({ "tasksFound": tasks.len() })),
        );
        tasks
    }

    /// Run one task end to end: dispatch under retry policy, then settle the
    /// document — `Done` on success, left in `Needs_Action` on failure for a
    /// later cycle.
    async fn execute_task(&self, task: Task, cancel: &CancellationToken) {
        let logger = self.logger.with_context(LogContext::new(
            task.correlation_id.clone(),
            Some(task.user_id.clone()),
        ));
        logger.info(
            "execute:start",
            LogData::input(json!({ "taskId": task.id.as_str(), "type": task.task_type })),
        );
        self.bus.emit(
            topics::TASK_STARTED,
            json!({ "taskId": task.id.as_str(), "type": task.task_type }),
        );

        let result = self.dispatcher.dispatch(&task, cancel).await;

        if result.success {
            let mut patch = serde_json::Map::new();
            patch.insert("status".into(), json!(TaskStatus::Completed));
            patch.insert(
                "result".into(),
                serde_json::Value::Object(result.data.clone().unwrap_or_default()),
            );
            patch.insert("completed_at".into(), json!(Utc::now()));

            if let Err(e) = self
                .vault
                .move_document(
                    task.id.as_str(),
                    Folder::NeedsAction,
                    Folder::Done,
                    Some(patch),
                )
                .await
            {
                logger.error(
                    "execute:settle",
                    "SETTLE_ERROR",
                    &e.to_string(),
                    LogData::input(json!({ "taskId": task.id.as_str() })),
                );
                self.state.lock().error = Some(e.to_string());
            }

            {
                let mut state = self.state.lock();
                state.completed_total += 1;
                state.tasks_in_flight = state.tasks_in_flight.saturating_sub(1);
            }
            logger.info(
                "execute:complete",
                LogData::output(json!({ "taskId": task.id.as_str(), "success": true }))
                    .with_duration_ms(result.execution_time_ms),
            );
            self.bus.emit(
                topics::TASK_COMPLETED,
                json!({
                    "taskId": task.id.as_str(),
                    "success": true,
                    "data": result.data,
                }),
            );
        } else {
            let code = result.error_code().to_string();
            {
                let mut state = self.state.lock();
                state.failed_total += 1;
                state.tasks_in_flight = state.tasks_in_flight.saturating_sub(1);
            }
            logger.warn(
                "execute:failed",
                LogData::output(json!({ "taskId": task.id.as_str(), "error": code }))
                    .with_duration_ms(result.execution_time_ms),
            );
            self.bus.emit(
                topics::TASK_FAILED,
                json!({ "taskId": task.id.as_str(), "error": code }),
            );
        }
    }

    /// Project current state into the dashboard artifact and announce it.
    async fn update_dashboard(&self) {
        let infos = self.dispatcher.registered_agents();
        let all_stats = self.dispatcher.all_stats();
        let now_ms = Utc::now().timestamp_millis().max(0) as u64;

        let agent_health: Vec<AgentHealthEntry> = infos
            .iter()
            .map(|info| {
                let last_activity = all_stats
                    .get(&info.name)
                    .and_then(|s| s.last_dispatch)
                    .map(|at| {
                        let then_ms = at.timestamp_millis().max(0) as u64;
                        hive_core::format_ago(now_ms.saturating_sub(then_ms) / 1000)
                    })
                    .unwrap_or_else(|| "never".to_string());
                AgentHealthEntry {
                    name: info.name.clone(),
                    status: match info.healthy {
                        Some(true) => "healthy".to_string(),
                        Some(false) => "unhealthy".to_string(),
                        None => "unknown".to_string(),
                    },
                    last_activity,
                    tasks_completed: info.completed,
                }
            })
            .collect();
        let active_agents = infos.iter().filter(|i| i.healthy == Some(true)).count();

        let pending_approvals = self.pending_approval_summaries().await;

        let snapshot = self.state.lock().clone();
        let dashboard = DashboardState {
            loop_status: snapshot.status,
            active_agents,
            total_agents: infos.len(),
            cycle_number: snapshot.cycle_number,
            pending_approvals,
            recent_activity: self.feed.recent(DASHBOARD_ACTIVITY_LIMIT),
            task_stats: TaskStats {
                pending: snapshot.pending_queue_size,
                in_progress: snapshot.tasks_in_flight,
                completed_today: snapshot.completed_total,
                failed_today: snapshot.failed_total,
            },
            agent_health,
            last_updated: Utc::now(),
        };

        if let Err(e) = self.projector.write(&dashboard).await {
            self.logger.error(
                "update_dashboard:error",
                "DASHBOARD_ERROR",
                &e.to_string(),
                LogData::default(),
            );
            return;
        }

        self.bus.emit(topics::DASHBOARD_UPDATE, dashboard.to_value());
    }

    async fn pending_approval_summaries(&self) -> Vec<ApprovalSummary> {
        let Ok(ids) = self.vault.list(Folder::PendingApproval).await else {
            return Vec::new();
        };

        let mut summaries = Vec::new();
        for id in ids.into_iter().take(DASHBOARD_APPROVAL_LIMIT) {
            let Ok(doc) = self.vault.read(Folder::PendingApproval, &id).await else {
                continue;
            };
            let text = |key: &str| {
                doc.content
                    .get(key)
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            summaries.push(ApprovalSummary {
                id,
                action_type: text("action_type"),
                requested_at: doc.created_at,
                user_id: text("user_id"),
                summary: text("summary"),
            });
        }
        summaries
    }

    fn set_phase(&self, phase: LoopPhase) {
        self.state.lock().phase = phase;
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
