//! S2: a dropped task document flows to Done with its result patched in.

use crate::prelude::*;
use hive_core::test_support::StubAgent;
use hive_core::{Agent, TaskResult};
use hive_engine::topics;
use hive_vault::Folder;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn dropped_document_executes_and_lands_in_done() {
    let dir = tempfile::tempdir().unwrap();
    let (orch, bus) = orchestrator(dir.path());
    let mut events = topic_channel(&bus, "task:*");

    let agent = Arc::new(
        StubAgent::new("calendar-agent", &["calendar:fetch"])
            .with_fallback(TaskResult::ok(obj(json!({ "events": [] })))),
    );
    orch.register_agent(Arc::clone(&agent) as Arc<dyn Agent>)
        .await
        .unwrap();

    // Producers drop documents straight into Needs_Action
    let vault = orch.vault();
    vault.initialize().await.unwrap();
    vault
        .create(
            Folder::NeedsAction,
            "t1",
            obj(json!({
                "id": "t1",
                "type": "calendar:fetch",
                "priority": "medium",
                "payload": {},
                "user_id": "u",
            })),
        )
        .await
        .unwrap();

    orch.start().await.unwrap();

    let (topic, started) = wait_for(&mut events, |t, _| t == topics::TASK_STARTED).await;
    assert_eq!(topic, "task:started");
    assert_eq!(started["taskId"], "t1");

    let (_, completed) = wait_for(&mut events, |t, _| t == topics::TASK_COMPLETED).await;
    assert_eq!(completed["taskId"], "t1");
    assert_eq!(completed["success"], true);

    orch.stop().await.unwrap();

    let doc = vault.read(Folder::Done, "t1").await.unwrap();
    assert_eq!(doc.content["result"]["events"], json!([]));
    assert!(doc.content.get("completed_at").is_some());
    assert!(vault.list(Folder::NeedsAction).await.unwrap().is_empty());
    assert_eq!(agent.calls(), 1);
}
