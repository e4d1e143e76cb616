// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcast payloads, doubling as durable history records.

use crate::status::{ItemStatus, TaskKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Point-in-time view of one task within a build update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: u32,
    pub kind: TaskKind,
    pub status: ItemStatus,
    /// Epoch milliseconds; zero until the task first runs
    #[serde(default)]
    pub started_at_ms: u64,
    #[serde(default)]
    pub duration_ms: u64,
}

/// Payload of a `build:update:<id>` broadcast and the record stored per
/// build in the history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildUpdateData {
    pub id: i64,
    pub name: String,
    pub status: ItemStatus,
    pub tasks: Vec<TaskSnapshot>,
    #[serde(default)]
    pub params: Vec<HashMap<String, String>>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Epoch milliseconds; zero until the build enters `running`
    #[serde(default)]
    pub started_at_ms: u64,
    /// Total duration, set once at entry into a terminal state
    #[serde(default)]
    pub duration_ms: u64,
}

/// Payload of a `build:log:<id>` broadcast: one fully formatted log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLogData {
    pub task_id: u32,
    /// Formatted line: elapsed prefix, ANSI stripped, newline appended
    pub data: String,
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
