//! Shared fixtures for behavioural specs.

#![allow(dead_code)]

use hive_engine::{EventBus, HiveConfig, Orchestrator};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Fast-cycling config rooted in a tempdir.
pub fn test_config(dir: &Path) -> HiveConfig {
    let mut config = HiveConfig::default();
    config.loop_.vault_path = dir.join("vault");
    config.loop_.dashboard_path = dir.join("Dashboard.md");
    config.loop_.cycle_interval_ms = 20;
    config.loop_.retry_backoff_ms = 5;
    config
}

/// Orchestrator plus its injected bus.
pub fn orchestrator(dir: &Path) -> (Arc<Orchestrator>, Arc<EventBus>) {
    orchestrator_with(dir, |_| {})
}

/// Orchestrator with config tweaks on top of [`test_config`].
pub fn orchestrator_with(
    dir: &Path,
    tweak: impl FnOnce(&mut HiveConfig),
) -> (Arc<Orchestrator>, Arc<EventBus>) {
    let mut config = test_config(dir);
    tweak(&mut config);
    let bus = Arc::new(EventBus::new());
    let orch = Arc::new(Orchestrator::new(config, Arc::clone(&bus)));
    (orch, bus)
}

/// Stream `(topic, data)` pairs matching a pattern over a channel.
pub fn topic_channel(bus: &EventBus, pattern: &str) -> UnboundedReceiver<(String, Value)> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    bus.on(pattern, move |topic, data| {
        let _ = tx.send((topic.to_string(), data.clone()));
    });
    rx
}

/// Await the next event satisfying `pred`, with a 5 s guard.
pub async fn wait_for(
    rx: &mut UnboundedReceiver<(String, Value)>,
    pred: impl Fn(&str, &Value) -> bool,
) -> (String, Value) {
    loop {
        let (topic, data) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if pred(&topic, &data) {
            return (topic, data);
        }
    }
}

/// Build a JSON object from a `serde_json::json!` value.
pub fn obj(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}
