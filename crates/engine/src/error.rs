// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use hive_vault::VaultError;
use thiserror::Error;

/// Errors that can occur in the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("approval not found: {0}")]
    ApprovalNotFound(String),
    #[error("malformed approval document: {0}")]
    MalformedApproval(String),
    #[error("invalid lifecycle transition: {0}")]
    InvalidTransition(String),
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
    #[error("invalid config: {0}")]
    Config(String),
}
