//! S3: a recoverable failure is retried to exhaustion within one dispatch.

use crate::prelude::*;
use hive_core::test_support::StubAgent;
use hive_core::{codes, Agent, TaskError, TaskResult};
use hive_engine::topics;
use hive_vault::Folder;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn three_recoverable_failures_exhaust_retries() {
    let dir = tempfile::tempdir().unwrap();
    // One long cycle: the failed document must not be re-dispatched before
    // the assertions run.
    let (orch, bus) = orchestrator_with(dir.path(), |c| c.loop_.cycle_interval_ms = 60_000);
    let mut events = topic_channel(&bus, topics::TASK_FAILED);

    let agent = Arc::new(
        StubAgent::new("flaky", &["calendar:fetch"])
            .with_fallback(TaskResult::err(TaskError::http(503, "unavailable"))),
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
            obj(json!({ "id": "t1", "type": "calendar:fetch", "user_id": "u" })),
        )
        .await
        .unwrap();

    orch.start().await.unwrap();
    let (_, failed) = wait_for(&mut events, |_, d| d["taskId"] == "t1").await;
    orch.stop().await.unwrap();

    assert_eq!(failed["error"], codes::RETRY_EXHAUSTED);
    assert_eq!(agent.calls(), 3, "retry_attempts bounds execute calls");
    assert!(vault.list(Folder::Done).await.unwrap().is_empty());
    assert_eq!(
        vault.list(Folder::NeedsAction).await.unwrap(),
        vec!["t1"],
        "failed document stays for later cycles"
    );
}
