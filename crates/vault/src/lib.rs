// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hive-vault: Folder-addressed atomic JSON document store
//!
//! The vault is the on-disk source of truth for task and approval documents.
//! Each document is a JSON file named `<id>.json` living in exactly one of a
//! closed set of folders; a task's folder mirrors its lifecycle status.
//! Writes go through a temp-file-plus-rename discipline so readers never
//! observe partial content.

pub mod document;
pub mod error;
pub mod folder;
pub mod store;
pub mod watcher;

pub use document::Document;
pub use error::VaultError;
pub use folder::Folder;
pub use store::Vault;
pub use watcher::{VaultEvent, VaultWatcher};
