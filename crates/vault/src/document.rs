// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Vault documents and the `_vault_metadata` envelope.

use crate::folder::Folder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which the store keeps its bookkeeping inside each JSON file.
pub(crate) const METADATA_KEY: &str = "_vault_metadata";

/// Store-owned metadata persisted alongside document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Metadata {
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub folder: Folder,
}

/// A document read from the vault: content with metadata stripped out.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document id (filename without the `.json` extension).
    pub id: String,
    /// Folder the document was read from.
    pub folder: Folder,
    /// Content with the metadata envelope removed.
    pub content: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Document {
    /// Split raw file JSON into content and metadata.
    ///
    /// Unknown keys inside `_vault_metadata` are ignored; a missing or
    /// malformed envelope falls back to `now` timestamps and the folder the
    /// file was found in, so hand-dropped files are still readable.
    pub(crate) fn from_raw(id: &str, folder: Folder, mut raw: Map<String, Value>) -> Document {
        let meta = raw
            .remove(METADATA_KEY)
            .and_then(|v| parse_metadata(&v))
            .unwrap_or_else(|| {
                let now = Utc::now();
                Metadata {
                    created_at: now,
                    modified_at: now,
                    folder,
                }
            });

        Document {
            id: id.to_string(),
            folder,
            content: raw,
            created_at: meta.created_at,
            modified_at: meta.modified_at,
        }
    }
}

/// Tolerant metadata parse: required fields only, extra keys dropped.
fn parse_metadata(value: &Value) -> Option<Metadata> {
    let map = value.as_object()?;
    let created_at = serde_json::from_value(map.get("created_at")?.clone()).ok()?;
    let modified_at = serde_json::from_value(map.get("modified_at")?.clone()).ok()?;
    let folder = serde_json::from_value(map.get("folder")?.clone()).ok()?;
    Some(Metadata {
        created_at,
        modified_at,
        folder,
    })
}

/// Attach (or refresh) the metadata envelope on raw content before writing.
pub(crate) fn stamp(
    mut content: Map<String, Value>,
    folder: Folder,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
) -> Map<String, Value> {
    let meta = Metadata {
        created_at,
        modified_at,
        folder,
    };
    // Serializing a Metadata cannot fail; fall back to dropping the envelope
    // rather than the write.
    if let Ok(value) = serde_json::to_value(&meta) {
        content.insert(METADATA_KEY.to_string(), value);
    }
    content
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
