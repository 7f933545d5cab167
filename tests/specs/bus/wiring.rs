//! Bus wiring: the core works with an injected bus and with the optional
//! process-wide bus.

use crate::prelude::*;
use hive_core::test_support::StubAgent;
use hive_core::Agent;
use hive_engine::{topics, EventBus, Orchestrator};
use std::sync::Arc;

#[tokio::test]
async fn injected_bus_carries_loop_events() {
    let dir = tempfile::tempdir().unwrap();
    let (orch, bus) = orchestrator(dir.path());
    let mut cycles = topic_channel(&bus, topics::LOOP_CYCLE);

    orch.start().await.unwrap();
    let (_, started) = wait_for(&mut cycles, |_, d| d["action"] == "started").await;
    assert!(started["cycleNumber"].is_u64());
    orch.stop().await.unwrap();
}

#[tokio::test]
async fn global_bus_serves_as_the_process_wide_default() {
    let global = EventBus::global();
    assert!(
        Arc::ptr_eq(&global, &EventBus::global()),
        "global() returns one shared instance"
    );

    let dir = tempfile::tempdir().unwrap();
    let orch = Arc::new(Orchestrator::new(test_config(dir.path()), EventBus::global()));
    let mut events = topic_channel(&global, topics::AGENT_STATUS);

    let agent = Arc::new(StubAgent::new("global-worker", &["a:b"]));
    orch.register_agent(agent as Arc<dyn Agent>).await.unwrap();

    let (_, registered) = wait_for(&mut events, |_, d| d["action"] == "registered").await;
    assert_eq!(registered["name"], "global-worker");
}
