// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The vault store: atomic, folder-addressed JSON document operations.

use crate::document::{self, Document};
use crate::error::VaultError;
use crate::folder::Folder;
use chrono::Utc;
use hive_core::{LogData, StructuredLogger};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Subdirectories of `Logs/` created at initialization.
const LOG_CATEGORIES: [&str; 3] = ["agents", "loop", "system"];

/// Folder-addressed document store rooted at one directory.
///
/// All writes are temp-file-plus-rename: a reader either sees the previous
/// complete document or the new complete document, never a partial one. The
/// temp suffix is `.tmp`, which [`Vault::list`] never enumerates.
pub struct Vault {
    root: PathBuf,
    logger: StructuredLogger,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>, log_dir: Option<PathBuf>) -> Self {
        Self {
            root: root.into(),
            logger: StructuredLogger::new("vault:store", log_dir),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a folder.
    pub fn folder_path(&self, folder: Folder) -> PathBuf {
        self.root.join(folder.dir_name())
    }

    fn document_path(&self, folder: Folder, id: &str) -> PathBuf {
        self.folder_path(folder).join(format!("{}.json", id))
    }

    fn temp_path(&self, folder: Folder, id: &str) -> PathBuf {
        self.folder_path(folder).join(format!("{}.tmp", id))
    }

    /// Create all vault folders, including the `Logs/` category tree.
    pub async fn initialize(&self) -> Result<(), VaultError> {
        for folder in Folder::ALL {
            fs::create_dir_all(self.folder_path(folder)).await?;
        }
        let logs = self.folder_path(Folder::Logs);
        for category in LOG_CATEGORIES {
            fs::create_dir_all(logs.join(category)).await?;
        }
        self.logger.info(
            "initialize",
            LogData::input(serde_json::json!({ "root": self.root.display().to_string() })),
        );
        Ok(())
    }

    /// Write a new document. Fails with [`VaultError::AlreadyExists`] when the
    /// target id is already present in the folder.
    pub async fn create(
        &self,
        folder: Folder,
        id: &str,
        content: Map<String, Value>,
    ) -> Result<Document, VaultError> {
        let path = self.document_path(folder, id);
        if path_exists(&path).await {
            return Err(VaultError::already_exists(folder, id));
        }

        let now = Utc::now();
        let stamped = document::stamp(content.clone(), folder, now, now);
        self.write_atomic(folder, id, &stamped).await?;

        self.logger.info(
            "create",
            LogData::input(serde_json::json!({
                "folder": folder.dir_name(),
                "id": id,
            })),
        );

        Ok(Document {
            id: id.to_string(),
            folder,
            content,
            created_at: now,
            modified_at: now,
        })
    }

    /// Read a document, stripping the metadata envelope.
    pub async fn read(&self, folder: Folder, id: &str) -> Result<Document, VaultError> {
        let raw = self.read_raw(folder, id).await?;
        Ok(Document::from_raw(id, folder, raw))
    }

    /// Move a document between folders, optionally merging `patch` into its
    /// content.
    ///
    /// The destination is materialised atomically before the source is
    /// unlinked, so a crash in between leaves at worst both copies (with the
    /// destination authoritative), never neither. A concurrent move of the
    /// same id resolves to one winner; the loser observes `NotFound`.
    pub async fn move_document(
        &self,
        id: &str,
        from: Folder,
        to: Folder,
        patch: Option<Map<String, Value>>,
    ) -> Result<Document, VaultError> {
        let mut raw = self.read_raw(from, id).await?;

        let meta = raw.remove(document::METADATA_KEY);
        let created_at = meta
            .as_ref()
            .and_then(|m| m.get("created_at"))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_else(Utc::now);

        if let Some(patch) = patch {
            for (key, value) in patch {
                raw.insert(key, value);
            }
        }

        let now = Utc::now();
        let stamped = document::stamp(raw.clone(), to, created_at, now);
        self.write_atomic(to, id, &stamped).await?;

        // Unlink the source; losing a concurrent-move race surfaces here.
        if let Err(e) = fs::remove_file(self.document_path(from, id)).await {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(VaultError::not_found(from, id));
            }
            return Err(e.into());
        }

        self.logger.info(
            "move_document",
            LogData::input(serde_json::json!({
                "id": id,
                "from": from.dir_name(),
                "to": to.dir_name(),
            })),
        );

        Ok(Document {
            id: id.to_string(),
            folder: to,
            content: raw,
            created_at,
            modified_at: now,
        })
    }

    /// List document ids in a folder, lexically sorted.
    ///
    /// Only `*.json` entries count; temp files are invisible here.
    pub async fn list(&self, folder: Folder) -> Result<Vec<String>, VaultError> {
        let path = self.folder_path(folder);
        if !path_exists(&path).await {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name.strip_suffix(".json") {
                if entry.file_type().await?.is_file() {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Delete a document.
    pub async fn delete(&self, folder: Folder, id: &str) -> Result<(), VaultError> {
        match fs::remove_file(self.document_path(folder, id)).await {
            Ok(()) => {
                self.logger.info(
                    "delete",
                    LogData::input(serde_json::json!({
                        "folder": folder.dir_name(),
                        "id": id,
                    })),
                );
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VaultError::not_found(folder, id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_raw(&self, folder: Folder, id: &str) -> Result<Map<String, Value>, VaultError> {
        let path = self.document_path(folder, id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VaultError::not_found(folder, id));
            }
            Err(e) => return Err(e.into()),
        };
        let value: Value = serde_json::from_slice(&bytes)?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(VaultError::Json(serde::de::Error::custom(
                "document root must be a JSON object",
            ))),
        }
    }

    async fn write_atomic(
        &self,
        folder: Folder,
        id: &str,
        content: &Map<String, Value>,
    ) -> Result<(), VaultError> {
        fs::create_dir_all(self.folder_path(folder)).await?;

        let temp = self.temp_path(folder, id);
        let target = self.document_path(folder, id);
        let bytes = serde_json::to_vec_pretty(content)?;

        if let Err(e) = fs::write(&temp, &bytes).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

async fn path_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
