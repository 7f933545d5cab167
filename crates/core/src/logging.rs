// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured JSONL logging with correlation propagation.
//!
//! Every component logs through a [`StructuredLogger`] carrying a `source`
//! (`loop:cycle`, `agent:calendar`, ...) and an optional [`LogContext`] of
//! `{correlation_id, user_id}` that tags each record. Records append to
//! `<log_dir>/<category>/YYYY-MM-DD.jsonl`, one JSON object per line.
//!
//! Logging must not break the engine: write failures are reported via
//! `tracing` and swallowed.

use crate::task::CorrelationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::PathBuf;
use std::time::Instant;

/// Log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Correlation pair threaded from a task through every log record it touches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    pub correlation_id: CorrelationId,
    pub user_id: Option<String>,
}

impl LogContext {
    pub fn new(correlation_id: impl Into<CorrelationId>, user_id: Option<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            user_id,
        }
    }
}

/// Structured payload of a record: what went in, what came out, how long.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl LogData {
    pub fn input(value: Value) -> Self {
        Self {
            input: Some(value),
            ..Self::default()
        }
    }

    pub fn output(value: Value) -> Self {
        Self {
            output: Some(value),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, value: Value) -> Self {
        self.output = Some(value);
        self
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }
}

/// Error block attached to `error`-level records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// One JSONL record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: String,
    pub action: String,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub data: LogData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<LogErrorDetail>,
}

/// Structured JSONL logger bound to one source.
///
/// Cheap to clone; `with_context` derives a logger that stamps every record
/// with a task's correlation pair.
#[derive(Clone)]
pub struct StructuredLogger {
    source: String,
    log_dir: Option<PathBuf>,
    context: Option<LogContext>,
}

impl StructuredLogger {
    pub fn new(source: impl Into<String>, log_dir: Option<PathBuf>) -> Self {
        Self {
            source: source.into(),
            log_dir,
            context: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Derive a logger carrying the given correlation context.
    pub fn with_context(&self, context: LogContext) -> Self {
        Self {
            source: self.source.clone(),
            log_dir: self.log_dir.clone(),
            context: Some(context),
        }
    }

    pub fn debug(&self, action: &str, data: LogData) {
        tracing::debug!(source = %self.source, action, "log");
        self.write(self.entry(LogLevel::Debug, action, data, None));
    }

    pub fn info(&self, action: &str, data: LogData) {
        tracing::info!(source = %self.source, action, "log");
        self.write(self.entry(LogLevel::Info, action, data, None));
    }

    pub fn warn(&self, action: &str, data: LogData) {
        tracing::warn!(source = %self.source, action, "log");
        self.write(self.entry(LogLevel::Warn, action, data, None));
    }

    pub fn error(&self, action: &str, code: &str, message: &str, data: LogData) {
        tracing::error!(source = %self.source, action, code, message, "log");
        let detail = LogErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
            stack: None,
        };
        self.write(self.entry(LogLevel::Error, action, data, Some(detail)));
    }

    /// Start a timer; the returned closure yields elapsed milliseconds.
    pub fn start_timer(&self) -> impl FnOnce() -> u64 {
        let start = Instant::now();
        move || start.elapsed().as_millis() as u64
    }

    fn entry(
        &self,
        level: LogLevel,
        action: &str,
        data: LogData,
        error: Option<LogErrorDetail>,
    ) -> LogEntry {
        let (correlation_id, user_id) = match &self.context {
            Some(ctx) => (ctx.correlation_id.as_str().to_string(), ctx.user_id.clone()),
            None => (String::new(), None),
        };
        LogEntry {
            timestamp: Utc::now(),
            level,
            source: self.source.clone(),
            action: action.to_string(),
            correlation_id,
            user_id,
            data,
            error,
        }
    }

    fn write(&self, entry: LogEntry) {
        let Some(log_dir) = &self.log_dir else {
            return;
        };

        let dir = log_dir.join(category_for_source(&self.source));
        let file = dir.join(format!("{}.jsonl", entry.timestamp.format("%Y-%m-%d")));

        let result = (|| -> std::io::Result<()> {
            fs::create_dir_all(&dir)?;
            let line = serde_json::to_string(&entry)?;
            let mut f = OpenOptions::new().create(true).append(true).open(&file)?;
            writeln!(f, "{}", line)?;
            Ok(())
        })();

        if let Err(e) = result {
            tracing::warn!(
                source = %self.source,
                path = %file.display(),
                error = %e,
                "failed to write log record"
            );
        }
    }
}

/// Map a `prefix:rest` source to its log subdirectory.
///
/// `agent:*` records land in `agents/`, `loop:*` in `loop/`, everything else
/// in `system/`.
fn category_for_source(source: &str) -> &'static str {
    match source.split(':').next() {
        Some("agent") | Some("agents") => "agents",
        Some("loop") => "loop",
        _ => "system",
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
