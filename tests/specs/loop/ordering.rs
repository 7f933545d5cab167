//! Event ordering: `task:started` always precedes the terminal event for the
//! same task id, and per-task status transitions follow the state machine.

use crate::prelude::*;
use hive_core::test_support::{StubAgent, TaskBuilder};
use hive_core::{Agent, TaskStatus};
use hive_engine::topics;
use std::collections::HashMap;
use std::sync::Arc;

#[tokio::test]
async fn started_precedes_terminal_for_every_task() {
    let dir = tempfile::tempdir().unwrap();
    let (orch, bus) = orchestrator(dir.path());
    let mut events = topic_channel(&bus, "task:*");
    let mut cycles = topic_channel(&bus, topics::LOOP_CYCLE);

    let agent = Arc::new(StubAgent::new("w", &["a:b"]));
    orch.register_agent(agent as Arc<dyn Agent>).await.unwrap();

    for i in 0..4 {
        orch.enqueue_task(&TaskBuilder::new("a:b").id(format!("t{}", i)).build())
            .await
            .unwrap();
    }

    orch.start().await.unwrap();
    while orch.state().completed_total < 4 {
        wait_for(&mut cycles, |_, d| d["action"] == "cycleComplete").await;
    }
    orch.stop().await.unwrap();

    // Replay observed events per task id
    let mut order: HashMap<String, Vec<String>> = HashMap::new();
    while let Ok((topic, data)) = events.try_recv() {
        if topic == topics::TASK_QUEUED {
            continue;
        }
        if let Some(task_id) = data["taskId"].as_str() {
            order.entry(task_id.to_string()).or_default().push(topic);
        }
    }

    assert_eq!(order.len(), 4);
    for (task_id, topics_seen) in order {
        assert_eq!(
            topics_seen.first().map(String::as_str),
            Some("task:started"),
            "{task_id}: started must come first"
        );
        assert!(
            topics_seen[1..]
                .iter()
                .all(|t| t == "task:completed" || t == "task:failed"),
            "{task_id}: only terminal events may follow"
        );
    }
}

#[test]
fn observed_status_sequences_are_state_machine_paths() {
    // The folder-addressed lifecycle: created → queued → dispatched →
    // executing → completed
    let happy = [
        TaskStatus::Created,
        TaskStatus::Queued,
        TaskStatus::Dispatched,
        TaskStatus::Executing,
        TaskStatus::Completed,
    ];
    for pair in happy.windows(2) {
        assert!(pair[0].can_transition(pair[1]), "{:?} → {:?}", pair[0], pair[1]);
    }

    // The approval detour
    let approval = [
        TaskStatus::Queued,
        TaskStatus::AwaitingApproval,
        TaskStatus::Approved,
        TaskStatus::Executing,
        TaskStatus::Failed,
    ];
    for pair in approval.windows(2) {
        assert!(pair[0].can_transition(pair[1]), "{:?} → {:?}", pair[0], pair[1]);
    }
}
