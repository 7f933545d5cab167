//! S4: a non-recoverable failure is never retried.

use crate::prelude::*;
use hive_core::test_support::StubAgent;
use hive_core::{Agent, TaskError, TaskResult};
use hive_engine::topics;
use hive_vault::Folder;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn fatal_error_fails_after_single_attempt() {
    let dir = tempfile::tempdir().unwrap();
    // One long cycle: the failed document must not be re-dispatched before
    // the assertions run.
    let (orch, bus) = orchestrator_with(dir.path(), |c| c.loop_.cycle_interval_ms = 60_000);
    let mut events = topic_channel(&bus, topics::TASK_FAILED);

    let agent = Arc::new(
        StubAgent::new("strict", &["email:send"])
            .with_fallback(TaskResult::err(TaskError::fatal("BAD_INPUT", "missing to"))),
    );
    orch.register_agent(Arc::clone(&agent) as Arc<dyn Agent>)
        .await
        .unwrap();

    let vault = orch.vault();
    vault.initialize().await.unwrap();
    vault
        .create(
            Folder::NeedsAction,
            "t1",
            obj(json!({ "id": "t1", "type": "email:send", "user_id": "u" })),
        )
        .await
        .unwrap();

    orch.start().await.unwrap();
    let (_, failed) = wait_for(&mut events, |_, d| d["taskId"] == "t1").await;
    orch.stop().await.unwrap();

    assert_eq!(failed["error"], "BAD_INPUT");
    assert_eq!(agent.calls(), 1, "no retry after a non-recoverable error");
    assert!(vault.list(Folder::Done).await.unwrap().is_empty());
}
