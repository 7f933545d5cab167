//! S1: an empty workspace cycles cleanly.

use crate::prelude::*;
use hive_engine::topics;

#[tokio::test]
async fn empty_workspace_two_cycles_then_stop() {
    let dir = tempfile::tempdir().unwrap();
    let (orch, bus) = orchestrator(dir.path());
    let mut cycles = topic_channel(&bus, topics::LOOP_CYCLE);
    let mut dashboards = topic_channel(&bus, topics::DASHBOARD_UPDATE);

    orch.start().await.unwrap();

    for _ in 0..2 {
        let (_, data) = wait_for(&mut cycles, |_, d| d["action"] == "cycleComplete").await;
        assert_eq!(data["tasksExecuted"], 0);
    }
    // The dashboard is projected once per cycle
    for _ in 0..2 {
        wait_for(&mut dashboards, |_, _| true).await;
    }

    orch.stop().await.unwrap();

    let state = orch.state();
    assert!(state.error.is_none(), "no errors on an empty workspace");
    assert_eq!(state.completed_total, 0);
    assert_eq!(state.failed_total, 0);
    assert!(dir.path().join("Dashboard.md").exists());
}
