// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for vault operations

use crate::folder::Folder;
use thiserror::Error;

/// Errors that can occur during vault operations
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("document not found: {folder}/{id}")]
    NotFound { folder: Folder, id: String },
    #[error("document already exists: {folder}/{id}")]
    AlreadyExists { folder: Folder, id: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid document json: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaultError {
    pub(crate) fn not_found(folder: Folder, id: &str) -> Self {
        Self::NotFound {
            folder,
            id: id.to_string(),
        }
    }

    pub(crate) fn already_exists(folder: Folder, id: &str) -> Self {
        Self::AlreadyExists {
            folder,
            id: id.to_string(),
        }
    }

    /// Whether this error is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::NotFound { .. })
    }
}
