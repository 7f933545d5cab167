// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed set of vault folders.

use hive_core::TaskStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A vault folder. The on-disk directory name is the `Display` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Folder {
    #[serde(rename = "Plans")]
    Plans,
    #[serde(rename = "Needs_Action")]
    NeedsAction,
    #[serde(rename = "Done")]
    Done,
    #[serde(rename = "Pending_Approval")]
    PendingApproval,
    #[serde(rename = "Approved")]
    Approved,
    #[serde(rename = "Rejected")]
    Rejected,
    #[serde(rename = "Logs")]
    Logs,
}

impl Folder {
    /// All folders, in initialization order.
    pub const ALL: [Folder; 7] = [
        Folder::Plans,
        Folder::NeedsAction,
        Folder::Done,
        Folder::PendingApproval,
        Folder::Approved,
        Folder::Rejected,
        Folder::Logs,
    ];

    /// On-disk directory name.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Folder::Plans => "Plans",
            Folder::NeedsAction => "Needs_Action",
            Folder::Done => "Done",
            Folder::PendingApproval => "Pending_Approval",
            Folder::Approved => "Approved",
            Folder::Rejected => "Rejected",
            Folder::Logs => "Logs",
        }
    }

    /// The folder that mirrors a task status, if the status is folder-backed.
    ///
    /// Active statuses (queued/dispatched/executing) all live in
    /// `Needs_Action`; `Created` has no folder until the task is queued.
    pub fn for_status(status: TaskStatus) -> Option<Folder> {
        match status {
            TaskStatus::Created => None,
            TaskStatus::Queued | TaskStatus::Dispatched | TaskStatus::Executing => {
                Some(Folder::NeedsAction)
            }
            TaskStatus::AwaitingApproval => Some(Folder::PendingApproval),
            TaskStatus::Approved => Some(Folder::Approved),
            TaskStatus::Rejected => Some(Folder::Rejected),
            TaskStatus::Completed => Some(Folder::Done),
            TaskStatus::Failed => Some(Folder::NeedsAction),
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[cfg(test)]
#[path = "folder_tests.rs"]
mod tests;
