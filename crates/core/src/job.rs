// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job and task descriptions.
//!
//! A [`Job`] is immutable once loaded: a named, ordered list of shell tasks
//! plus execution policy (timeout, artifact patterns, default parameters).
//! Mutable per-run state lives on the build, not here.

use crate::status::TaskKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// One shell command within a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Stable task ID, unique within the job
    pub id: u32,
    pub kind: TaskKind,
    /// Shell command, executed under `bash -c`
    pub command: String,
}

impl Task {
    pub fn new(id: u32, kind: TaskKind, command: impl Into<String>) -> Self {
        Self { id, kind, command: command.into() }
    }

    /// A task in the primary sequence.
    pub fn main(id: u32, command: impl Into<String>) -> Self {
        Self::new(id, TaskKind::Main, command)
    }
}

/// Static description of a build: tasks, parameters, artifacts, timeout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub tasks: Vec<Task>,
    /// Wall-clock limit for the whole build; fires an abort when exceeded
    #[serde(default)]
    pub timeout: Option<Duration>,
    /// Glob patterns expanded against the workspace root (`**` crosses
    /// directory boundaries)
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Parameter maps concatenated into the task environment, in order;
    /// later entries override earlier ones
    #[serde(default)]
    pub default_params: Vec<HashMap<String, String>>,
    /// How many builds of this job may run at once. Recorded here; enforced
    /// by the trigger layer, not the core queue.
    #[serde(default)]
    pub concurrency: u32,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    crate::setters! {
        set {
            tasks: Vec<Task>,
            default_params: Vec<HashMap<String, String>>,
            artifacts: Vec<String>,
            concurrency: u32,
        }
        option {
            timeout: Duration,
        }
    }

    /// Tasks in the primary sequence, in declaration order.
    pub fn main_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.kind.is_main())
    }

    /// Lifecycle hooks of the given kind, in declaration order.
    pub fn hook_tasks(&self, kind: TaskKind) -> impl Iterator<Item = &Task> + '_ {
        self.tasks.iter().filter(move |t| t.kind == kind)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
