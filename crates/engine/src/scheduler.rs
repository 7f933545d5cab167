// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority scheduling with starvation prevention.
//!
//! Scoring is pure over the batch and the clock:
//!
//! `score = priority_weight + age_weight · age_secs + starvation_bonus`
//!
//! where the starvation bonus applies only to low/medium tasks that have
//! waited past the threshold, growing 5 points per second of overage. Old
//! low-priority work therefore eventually outranks fresh medium-priority
//! work.

use hive_core::{Clock, Priority, Task};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Scheduler tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Base score per priority level.
    pub priority_weights: HashMap<Priority, f64>,
    /// Score added per second of task age.
    pub age_weight: f64,
    /// Age beyond which low/medium tasks accrue the starvation bonus.
    pub starvation_threshold_ms: u64,
    /// Most tasks a single `next_batch` call returns.
    pub max_batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            priority_weights: HashMap::from([
                (Priority::Critical, 100.0),
                (Priority::High, 50.0),
                (Priority::Medium, 25.0),
                (Priority::Low, 10.0),
            ]),
            age_weight: 0.1,
            starvation_threshold_ms: 60_000,
            max_batch_size: 10,
        }
    }
}

/// Bonus points per second a starving task has waited past the threshold.
const STARVATION_RATE_PER_SEC: f64 = 5.0;

/// Fallback weight for a priority missing from the config map.
const DEFAULT_PRIORITY_WEIGHT: f64 = 25.0;

/// Stateless priority scorer. Deterministic given the batch and the clock.
#[derive(Debug, Clone)]
pub struct Scheduler<C: Clock> {
    config: SchedulerConfig,
    clock: C,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(config: SchedulerConfig, clock: C) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Order a batch by descending score; ties resolve oldest-first.
    pub fn prioritize(&self, tasks: Vec<Task>) -> Vec<Task> {
        if tasks.is_empty() {
            return tasks;
        }

        let now_ms = self.clock.epoch_ms();
        let mut scored: Vec<(Task, f64)> = tasks
            .into_iter()
            .map(|task| {
                let score = self.score(&task, now_ms);
                (task, score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.0.created_at.cmp(&b.0.created_at))
        });

        scored.into_iter().map(|(task, _)| task).collect()
    }

    /// Score one task against the given wall-clock epoch.
    pub fn score(&self, task: &Task, now_epoch_ms: u64) -> f64 {
        let mut score = *self
            .config
            .priority_weights
            .get(&task.priority)
            .unwrap_or(&DEFAULT_PRIORITY_WEIGHT);

        let age_ms = task.age_ms(now_epoch_ms);
        score += self.config.age_weight * (age_ms as f64 / 1000.0);

        if matches!(task.priority, Priority::Low | Priority::Medium)
            && age_ms > self.config.starvation_threshold_ms
        {
            let over_secs = (age_ms - self.config.starvation_threshold_ms) as f64 / 1000.0;
            score += over_secs * STARVATION_RATE_PER_SEC;
        }

        score
    }

    /// Hint that a task should bypass queueing. The loop still enforces its
    /// concurrency bound.
    pub fn should_execute_now(&self, task: &Task) -> bool {
        matches!(task.priority, Priority::Critical | Priority::High)
    }

    /// Prioritize and return the top of the batch: at most `max_count`
    /// (defaulting to `max_batch_size`) tasks passing `filter`.
    pub fn next_batch<F>(&self, tasks: Vec<Task>, max_count: Option<usize>, filter: F) -> Vec<Task>
    where
        F: Fn(&Task) -> bool,
    {
        let max_count = max_count.unwrap_or(self.config.max_batch_size);
        let eligible: Vec<Task> = tasks.into_iter().filter(|t| filter(t)).collect();
        let mut ordered = self.prioritize(eligible);
        ordered.truncate(max_count);
        ordered
    }

    /// Rough queue-wait estimate: 5 s per task ahead, scaled down for higher
    /// priorities.
    pub fn estimate_wait_ms(&self, task: &Task, queue_position: usize) -> u64 {
        let base_wait = queue_position as f64 * 5000.0;
        let factor = match task.priority {
            Priority::Critical => 0.1,
            Priority::High => 0.5,
            Priority::Medium => 1.0,
            Priority::Low => 1.5,
        };
        (base_wait * factor) as u64
    }
}

/// Per-priority queue statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub by_priority: HashMap<Priority, usize>,
}

/// Priority-ordered task queue.
///
/// Kept sorted via the scheduler on every enqueue; callers guard shared
/// access externally.
pub struct TaskQueue<C: Clock> {
    scheduler: Scheduler<C>,
    tasks: Vec<Task>,
}

impl<C: Clock> TaskQueue<C> {
    pub fn new(scheduler: Scheduler<C>) -> Self {
        Self {
            scheduler,
            tasks: Vec::new(),
        }
    }

    /// Add a task and return its position after re-prioritization.
    pub fn enqueue(&mut self, task: Task) -> usize {
        let id = task.id.clone();
        self.tasks.push(task);
        self.tasks = self.scheduler.prioritize(std::mem::take(&mut self.tasks));
        self.position(id.as_str()).unwrap_or(self.tasks.len() - 1)
    }

    /// Remove and return up to `count` tasks from the front.
    pub fn dequeue(&mut self, count: usize) -> Vec<Task> {
        let count = count.min(self.tasks.len());
        self.tasks.drain(..count).collect()
    }

    /// Look at the front of the queue without removing.
    pub fn peek(&self, count: usize) -> &[Task] {
        &self.tasks[..count.min(self.tasks.len())]
    }

    /// Remove a specific task. Returns whether it was present.
    pub fn remove(&mut self, task_id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != task_id);
        self.tasks.len() < before
    }

    /// Zero-based queue position of a task.
    pub fn position(&self, task_id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop everything; returns how many tasks were cleared.
    pub fn clear(&mut self) -> usize {
        let count = self.tasks.len();
        self.tasks.clear();
        count
    }

    pub fn stats(&self) -> QueueStats {
        let mut by_priority: HashMap<Priority, usize> =
            Priority::ALL.iter().map(|p| (*p, 0)).collect();
        for task in &self.tasks {
            *by_priority.entry(task.priority).or_insert(0) += 1;
        }
        QueueStats {
            total: self.tasks.len(),
            by_priority,
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
