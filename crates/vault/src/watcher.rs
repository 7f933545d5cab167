// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Poll-based change notifications for vault folders.
//!
//! The watcher is an optimisation over scanning: consumers (the loop, the
//! approval workflow) can react between cycles instead of waiting for the
//! next poll of their own. Semantically it is equivalent to polling — every
//! event it reports is observable by listing folders.

use crate::folder::Folder;
use crate::store::Vault;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A change observed in a vault folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
    Created { folder: Folder, id: String },
    Modified { folder: Folder, id: String },
    Moved { from: Folder, to: Folder, id: String },
    Deleted { folder: Folder, id: String },
}

/// Fingerprint used to detect in-place modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: SystemTime,
    len: u64,
}

/// Background poller diffing folder listings into [`VaultEvent`]s.
pub struct VaultWatcher {
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl VaultWatcher {
    /// Spawn a watcher polling at `interval`. Events arrive on the returned
    /// channel; the watcher stops when cancelled or when the receiver drops.
    pub fn spawn(vault: Arc<Vault>, interval: Duration) -> (Self, mpsc::Receiver<VaultEvent>) {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(64);

        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut seen: HashMap<String, (Folder, Fingerprint)> = snapshot(&vault).await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                let current = snapshot(&vault).await;
                for event in diff(&seen, &current) {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                seen = current;
            }
        });

        (Self { cancel, handle }, rx)
    }

    /// Cancel the poll loop and wait for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

/// Document folders the watcher observes (everything but `Logs`).
const WATCHED: [Folder; 6] = [
    Folder::Plans,
    Folder::NeedsAction,
    Folder::Done,
    Folder::PendingApproval,
    Folder::Approved,
    Folder::Rejected,
];

async fn snapshot(vault: &Vault) -> HashMap<String, (Folder, Fingerprint)> {
    let mut map = HashMap::new();
    for folder in WATCHED {
        let Ok(ids) = vault.list(folder).await else {
            continue;
        };
        for id in ids {
            let path: PathBuf = vault.folder_path(folder).join(format!("{}.json", id));
            let Ok(meta) = tokio::fs::metadata(&path).await else {
                continue;
            };
            let Ok(modified) = meta.modified() else {
                continue;
            };
            map.insert(
                id,
                (
                    folder,
                    Fingerprint {
                        modified,
                        len: meta.len(),
                    },
                ),
            );
        }
    }
    map
}

/// Diff two snapshots into events. Ids are unique across folders, so a
/// folder change for a surviving id is a move.
fn diff(
    old: &HashMap<String, (Folder, Fingerprint)>,
    new: &HashMap<String, (Folder, Fingerprint)>,
) -> Vec<VaultEvent> {
    let mut events = Vec::new();

    for (id, (folder, fingerprint)) in new {
        match old.get(id) {
            None => events.push(VaultEvent::Created {
                folder: *folder,
                id: id.clone(),
            }),
            Some((old_folder, _)) if old_folder != folder => events.push(VaultEvent::Moved {
                from: *old_folder,
                to: *folder,
                id: id.clone(),
            }),
            Some((_, old_fingerprint)) if old_fingerprint != fingerprint => {
                events.push(VaultEvent::Modified {
                    folder: *folder,
                    id: id.clone(),
                })
            }
            Some(_) => {}
        }
    }

    for (id, (folder, _)) in old {
        if !new.contains_key(id) {
            events.push(VaultEvent::Deleted {
                folder: *folder,
                id: id.clone(),
            });
        }
    }

    events
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
