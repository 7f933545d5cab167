// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-in-the-loop approval workflow over vault folders.
//!
//! An approval request is a document whose folder is its state:
//! `Pending_Approval → Approved | Rejected`. Resolution moves the document
//! atomically, so a second resolution of the same id observes `NOT_FOUND` —
//! approvals are effectively at-most-once.

use crate::bus::{topics, EventBus};
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use hive_core::{LogData, StructuredLogger};
use hive_vault::{Folder, Vault, VaultError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Risk classification shown to the human approver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

/// Lifecycle state of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    /// The folder that stores requests in this state.
    pub fn folder(&self) -> Folder {
        match self {
            ApprovalStatus::Pending => Folder::PendingApproval,
            ApprovalStatus::Approved => Folder::Approved,
            ApprovalStatus::Rejected => Folder::Rejected,
        }
    }
}

/// A persisted approval request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub action_type: String,
    #[serde(default)]
    pub action_data: Map<String, Value>,
    pub summary: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub risk_level: RiskLevel,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejector_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Inputs for a new approval request.
#[derive(Debug, Clone)]
pub struct ApprovalDraft {
    pub action_type: String,
    pub action_data: Map<String, Value>,
    pub summary: String,
    pub user_id: String,
    pub agent_name: Option<String>,
    pub risk_level: RiskLevel,
    pub correlation_id: Option<String>,
}

impl ApprovalDraft {
    pub fn new(
        action_type: impl Into<String>,
        summary: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            action_data: Map::new(),
            summary: summary.into(),
            user_id: user_id.into(),
            agent_name: None,
            risk_level: RiskLevel::Medium,
            correlation_id: None,
        }
    }

    pub fn action_data(mut self, data: Map<String, Value>) -> Self {
        self.action_data = data;
        self
    }

    pub fn agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = Some(name.into());
        self
    }

    pub fn risk_level(mut self, level: RiskLevel) -> Self {
        self.risk_level = level;
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// The approval state machine.
pub struct Approvals {
    vault: Arc<Vault>,
    bus: Arc<EventBus>,
    ids: Box<dyn Fn() -> String + Send + Sync>,
    logger: StructuredLogger,
}

impl Approvals {
    /// Approvals minting UUID request ids.
    pub fn new(vault: Arc<Vault>, bus: Arc<EventBus>, log_dir: Option<PathBuf>) -> Self {
        Self::with_id_source(vault, bus, || uuid::Uuid::new_v4().to_string(), log_dir)
    }

    /// Approvals with a caller-supplied id source. Tests use a counter so
    /// request ids are predictable.
    pub fn with_id_source(
        vault: Arc<Vault>,
        bus: Arc<EventBus>,
        ids: impl Fn() -> String + Send + Sync + 'static,
        log_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            vault,
            bus,
            ids: Box::new(ids),
            logger: StructuredLogger::new("approval:workflow", log_dir),
        }
    }

    /// File a new request into `Pending_Approval` and announce it.
    pub async fn create(&self, draft: ApprovalDraft) -> Result<ApprovalRequest, EngineError> {
        let request = ApprovalRequest {
            id: (self.ids)(),
            action_type: draft.action_type,
            action_data: draft.action_data,
            summary: draft.summary,
            user_id: draft.user_id,
            agent_name: draft.agent_name,
            risk_level: draft.risk_level,
            status: ApprovalStatus::Pending,
            created_at: Utc::now(),
            correlation_id: draft.correlation_id,
            approved_at: None,
            approver_id: None,
            notes: None,
            rejected_at: None,
            rejector_id: None,
            reason: None,
        };

        self.vault
            .create(Folder::PendingApproval, &request.id, to_content(&request))
            .await?;

        self.bus.emit(
            topics::APPROVAL_PENDING,
            json!({
                "id": request.id,
                "actionType": request.action_type,
                "summary": request.summary,
                "riskLevel": request.risk_level,
            }),
        );
        self.logger.info(
            "create",
            LogData::output(json!({
                "approvalId": request.id,
                "actionType": request.action_type,
            })),
        );

        Ok(request)
    }

    /// Resolve a pending request as approved.
    pub async fn approve(
        &self,
        approval_id: &str,
        approver_id: Option<&str>,
        notes: Option<&str>,
    ) -> Result<ApprovalRequest, EngineError> {
        let mut patch = Map::new();
        patch.insert("status".into(), json!(ApprovalStatus::Approved));
        patch.insert("approved_at".into(), json!(Utc::now()));
        if let Some(approver_id) = approver_id {
            patch.insert("approver_id".into(), json!(approver_id));
        }
        if let Some(notes) = notes {
            patch.insert("notes".into(), json!(notes));
        }

        let doc = self
            .move_resolving(approval_id, Folder::Approved, patch)
            .await?;

        self.bus.emit(
            topics::APPROVAL_RESOLVED,
            json!({
                "id": approval_id,
                "status": "approved",
                "approverId": approver_id,
            }),
        );
        self.logger.info(
            "approve",
            LogData::output(json!({ "approvalId": approval_id })),
        );

        parse_request(approval_id, doc.content)
    }

    /// Resolve a pending request as rejected. A reason is required.
    pub async fn reject(
        &self,
        approval_id: &str,
        rejector_id: Option<&str>,
        reason: &str,
    ) -> Result<ApprovalRequest, EngineError> {
        let mut patch = Map::new();
        patch.insert("status".into(), json!(ApprovalStatus::Rejected));
        patch.insert("rejected_at".into(), json!(Utc::now()));
        patch.insert("reason".into(), json!(reason));
        if let Some(rejector_id) = rejector_id {
            patch.insert("rejector_id".into(), json!(rejector_id));
        }

        let doc = self
            .move_resolving(approval_id, Folder::Rejected, patch)
            .await?;

        self.bus.emit(
            topics::APPROVAL_RESOLVED,
            json!({
                "id": approval_id,
                "status": "rejected",
                "rejectorId": rejector_id,
                "reason": reason,
            }),
        );
        self.logger.info(
            "reject",
            LogData::output(json!({ "approvalId": approval_id, "reason": reason })),
        );

        parse_request(approval_id, doc.content)
    }

    /// Requests in one state, optionally filtered by owner, in folder
    /// listing order (lexical by id), capped at `limit`.
    pub async fn list(
        &self,
        status: ApprovalStatus,
        user_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ApprovalRequest>, EngineError> {
        let folder = status.folder();
        let ids = self.vault.list(folder).await?;

        let mut requests = Vec::new();
        for id in ids {
            if requests.len() >= limit {
                break;
            }
            let doc = match self.vault.read(folder, &id).await {
                Ok(doc) => doc,
                Err(VaultError::NotFound { .. }) => continue,
                Err(e) => return Err(e.into()),
            };
            let Ok(request) = parse_request(&id, doc.content) else {
                self.logger.warn(
                    "list:skip_malformed",
                    LogData::input(json!({ "id": id })),
                );
                continue;
            };
            if let Some(user_id) = user_id {
                if request.user_id != user_id {
                    continue;
                }
            }
            requests.push(request);
        }
        Ok(requests)
    }

    /// Probe all three folders for a request, pending first.
    pub async fn get(&self, approval_id: &str) -> Result<ApprovalRequest, EngineError> {
        for status in [
            ApprovalStatus::Pending,
            ApprovalStatus::Approved,
            ApprovalStatus::Rejected,
        ] {
            match self.vault.read(status.folder(), approval_id).await {
                Ok(doc) => return parse_request(approval_id, doc.content),
                Err(VaultError::NotFound { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::ApprovalNotFound(approval_id.to_string()))
    }

    async fn move_resolving(
        &self,
        approval_id: &str,
        to: Folder,
        patch: Map<String, Value>,
    ) -> Result<hive_vault::Document, EngineError> {
        self.vault
            .move_document(approval_id, Folder::PendingApproval, to, Some(patch))
            .await
            .map_err(|e| match e {
                VaultError::NotFound { .. } => {
                    EngineError::ApprovalNotFound(approval_id.to_string())
                }
                other => other.into(),
            })
    }
}

fn to_content(request: &ApprovalRequest) -> Map<String, Value> {
    match serde_json::to_value(request) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn parse_request(id: &str, content: Map<String, Value>) -> Result<ApprovalRequest, EngineError> {
    serde_json::from_value(Value::Object(content))
        .map_err(|_| EngineError::MalformedApproval(id.to_string()))
}

#[cfg(test)]
#[path = "approval_tests.rs"]
mod tests;
