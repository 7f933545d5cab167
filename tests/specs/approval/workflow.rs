//! S6: the HITL approval state machine over vault folders.

use crate::prelude::*;
use hive_engine::{
    topics, ApprovalDraft, ApprovalStatus, Approvals, EngineError, EventBus,
};
use hive_vault::{Folder, Vault};
use std::sync::Arc;

async fn fixture() -> (tempfile::TempDir, Approvals, Arc<EventBus>, Arc<Vault>) {
    let dir = tempfile::tempdir().unwrap();
    let vault = Arc::new(Vault::new(dir.path().join("vault"), None));
    vault.initialize().await.unwrap();
    let bus = Arc::new(EventBus::new());
    let approvals = Approvals::new(Arc::clone(&vault), Arc::clone(&bus), None);
    (dir, approvals, bus, vault)
}

#[tokio::test]
async fn create_approve_then_second_approve_is_not_found() {
    let (_dir, approvals, bus, vault) = fixture().await;
    let mut pending_events = topic_channel(&bus, topics::APPROVAL_PENDING);
    let mut resolved_events = topic_channel(&bus, topics::APPROVAL_RESOLVED);

    let request = approvals
        .create(ApprovalDraft::new(
            "send_email",
            "Send the quarterly update",
            "u1",
        ))
        .await
        .unwrap();

    let (_, pending) = wait_for(&mut pending_events, |_, _| true).await;
    assert_eq!(pending["actionType"], "send_email");
    assert_eq!(
        vault.list(Folder::PendingApproval).await.unwrap(),
        vec![request.id.clone()]
    );

    let resolved = approvals
        .approve(&request.id, Some("a"), None)
        .await
        .unwrap();
    assert_eq!(resolved.status, ApprovalStatus::Approved);

    let (_, event) = wait_for(&mut resolved_events, |_, _| true).await;
    assert_eq!(event["status"], "approved");
    assert_eq!(event["approverId"], "a");

    let doc = vault.read(Folder::Approved, &request.id).await.unwrap();
    assert_eq!(doc.content["status"], "approved");
    assert!(vault.list(Folder::PendingApproval).await.unwrap().is_empty());

    // Idempotence probe: the document has already moved
    let err = approvals
        .approve(&request.id, Some("a"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ApprovalNotFound(_)));
}

#[tokio::test]
async fn reject_records_reason_and_is_terminal() {
    let (_dir, approvals, _bus, vault) = fixture().await;

    let request = approvals
        .create(ApprovalDraft::new("wire_funds", "Wire 10k", "u1"))
        .await
        .unwrap();

    approvals
        .reject(&request.id, Some("cfo"), "amount above limit")
        .await
        .unwrap();

    let doc = vault.read(Folder::Rejected, &request.id).await.unwrap();
    assert_eq!(doc.content["status"], "rejected");
    assert_eq!(doc.content["reason"], "amount above limit");

    // Neither approve nor reject can act on it again
    assert!(approvals.approve(&request.id, None, None).await.is_err());
    assert!(approvals.reject(&request.id, None, "again").await.is_err());
}
