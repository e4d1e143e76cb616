// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build and task status, and the task-kind tags that bind lifecycle hooks
//! to status transitions.

use serde::{Deserialize, Serialize};

/// Status of a build or of a single task.
///
/// Builds and tasks share one status vocabulary: a build advances
/// `pending → running → {finished | failed | aborted}`, and each task
/// passes through the same states while it executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Admitted but not yet promoted by the queue
    Pending,
    /// Currently executing
    Running,
    /// Completed with exit code zero
    Finished,
    /// Nonzero exit, start error, or abnormal completion
    Failed,
    /// Abort signal consumed before completion
    Aborted,
}

impl ItemStatus {
    /// Check if this status is terminal. Terminal statuses are entered at
    /// most once and never left.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Aborted)
    }
}

crate::simple_display! {
    ItemStatus {
        Pending => "pending",
        Running => "running",
        Finished => "finished",
        Failed => "failed",
        Aborted => "aborted",
    }
}

/// Kind of a task within a job.
///
/// `Main` tasks form the primary sequence. Every other kind is a lifecycle
/// hook that runs when the build enters the matching status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Main,
    Pending,
    Running,
    Finished,
    Failed,
    Aborted,
}

impl TaskKind {
    /// The hook kind that fires when a build enters `status`.
    pub fn for_status(status: ItemStatus) -> Self {
        match status {
            ItemStatus::Pending => Self::Pending,
            ItemStatus::Running => Self::Running,
            ItemStatus::Finished => Self::Finished,
            ItemStatus::Failed => Self::Failed,
            ItemStatus::Aborted => Self::Aborted,
        }
    }

    pub fn is_main(self) -> bool {
        self == Self::Main
    }
}

crate::simple_display! {
    TaskKind {
        Main => "main",
        Pending => "pending",
        Running => "running",
        Finished => "finished",
        Failed => "failed",
        Aborted => "aborted",
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
