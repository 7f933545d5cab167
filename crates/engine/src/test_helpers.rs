// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::bus::EventBus;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Record every `(topic, data)` pair emitted on a pattern.
pub fn recorder(bus: &EventBus, pattern: &str) -> Arc<Mutex<Vec<(String, Value)>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.on(pattern, move |topic, data| {
        sink.lock().push((topic.to_string(), data.clone()));
    });
    seen
}

/// Stream `(topic, data)` pairs matching a pattern over a channel, for
/// awaiting specific events in async tests.
pub fn topic_channel(
    bus: &EventBus,
    pattern: &str,
) -> tokio::sync::mpsc::UnboundedReceiver<(String, Value)> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    bus.on(pattern, move |topic, data| {
        let _ = tx.send((topic.to_string(), data.clone()));
    });
    rx
}
