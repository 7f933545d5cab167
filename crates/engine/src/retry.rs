// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timeout-bounded execution with exponential backoff.
//!
//! Each attempt runs the worker under the task's deadline. Recoverable
//! failures (including deadline overruns and panics across the worker
//! boundary) are retried with doubling backoff; a non-recoverable failure
//! returns immediately. Backoff sleeps observe cancellation, so a loop stop
//! never waits out a backoff window.

use hive_core::{codes, Agent, Task, TaskError, TaskResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry tuning: attempt count and initial backoff.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff_ms: 1000,
        }
    }
}

/// Outcome of a single bounded attempt.
enum Attempt {
    Done(TaskResult),
    Cancelled,
}

impl RetryPolicy {
    /// Run `task` on `agent` under this policy.
    ///
    /// The worker's `execute` is called at most `attempts` times. The
    /// returned result's `execution_time_ms` counts time inside attempts
    /// only, never inter-attempt backoff.
    pub async fn execute(
        &self,
        agent: Arc<dyn Agent>,
        task: &Task,
        cancel: &CancellationToken,
    ) -> TaskResult {
        let mut backoff_ms = self.initial_backoff_ms;
        let mut executing_ms: u64 = 0;
        let mut last_error: Option<TaskError> = None;

        for attempt in 1..=self.attempts.max(1) {
            if cancel.is_cancelled() {
                return cancelled_result(executing_ms);
            }

            let attempt_start = std::time::Instant::now();
            let outcome = run_attempt(Arc::clone(&agent), task, cancel).await;
            executing_ms += attempt_start.elapsed().as_millis() as u64;

            let result = match outcome {
                Attempt::Cancelled => return cancelled_result(executing_ms),
                Attempt::Done(result) => result,
            };

            if result.success || !result.is_recoverable() {
                return result.with_execution_time_ms(executing_ms);
            }

            let retry_after_ms = result.error.as_ref().and_then(|e| e.retry_after_ms);
            last_error = result.error;

            if attempt < self.attempts {
                tracing::warn!(
                    task_id = %task.id,
                    attempt,
                    backoff_ms,
                    error = %last_error.as_ref().map(|e| e.code.as_str()).unwrap_or("unknown"),
                    "attempt failed, backing off"
                );
                let sleep_ms = backoff_ms.max(retry_after_ms.unwrap_or(0));
                tokio::select! {
                    _ = cancel.cancelled() => return cancelled_result(executing_ms),
                    _ = tokio::time::sleep(Duration::from_millis(sleep_ms)) => {}
                }
                backoff_ms *= 2;
            }
        }

        let last_message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        TaskResult::err(TaskError::fatal(
            codes::RETRY_EXHAUSTED,
            format!(
                "failed after {} attempts: {}",
                self.attempts.max(1),
                last_message
            ),
        ))
        .with_execution_time_ms(executing_ms)
    }
}

/// One attempt: the worker call, bounded by the task deadline and the
/// cancellation token. Runs on its own tokio task so a panicking worker
/// surfaces as `DISPATCH_ERROR` instead of unwinding the loop.
async fn run_attempt(agent: Arc<dyn Agent>, task: &Task, cancel: &CancellationToken) -> Attempt {
    let timeout = Duration::from_millis(task.timeout_ms);
    let owned_task = task.clone();
    let handle = tokio::spawn(async move { agent.execute(&owned_task).await });
    let abort = handle.abort_handle();

    tokio::select! {
        _ = cancel.cancelled() => {
            abort.abort();
            Attempt::Cancelled
        }
        joined = tokio::time::timeout(timeout, handle) => match joined {
            Ok(Ok(result)) => Attempt::Done(result),
            Ok(Err(_join_error)) => Attempt::Done(TaskResult::err(TaskError::recoverable(
                codes::DISPATCH_ERROR,
                "worker panicked during execute",
            ))),
            Err(_elapsed) => {
                abort.abort();
                Attempt::Done(TaskResult::err(TaskError::recoverable(
                    codes::TIMEOUT,
                    format!("task timed out after {}ms", task.timeout_ms),
                )))
            }
        }
    }
}

fn cancelled_result(executing_ms: u64) -> TaskResult {
    TaskResult::err(TaskError::fatal(
        codes::EXECUTION_ERROR,
        "execution cancelled",
    ))
    .with_execution_time_ms(executing_ms)
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
