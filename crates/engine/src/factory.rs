// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build creation.
//!
//! The factory allocates the build ID, provisions the build's directories,
//! copies the triggering job file verbatim into the wakespace, and hands
//! the build to the queue. Any filesystem failure aborts creation and
//! propagates unchanged; a build either exists completely or not at all.

use crate::broadcast::Broadcaster;
use crate::build::Build;
use crate::config::Config;
use crate::error::EngineError;
use crate::queue::Queue;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use wake_core::Job;
use wake_storage::HistoryStore;

pub struct BuildFactory {
    config: Config,
    queue: Arc<Queue>,
    history: HistoryStore,
    broadcaster: Broadcaster,
}

impl BuildFactory {
    pub fn new(
        config: Config,
        queue: Arc<Queue>,
        history: HistoryStore,
        broadcaster: Broadcaster,
    ) -> Self {
        Self { config, queue, history, broadcaster }
    }

    /// Create a build for `job` and enqueue it.
    ///
    /// `job_path` is the file the job was loaded from; it is copied
    /// byte-for-byte into the wakespace as `build<ext>` so the build can be
    /// inspected and re-run later even if the job definition changes.
    pub async fn create(&self, job: Job, job_path: &Path) -> Result<Arc<Build>, EngineError> {
        let id = self.history.next_build_id()?;

        let workspace = self.config.workspace_dir(id);
        fs::create_dir_all(&workspace)?;
        tracing::info!(build_id = id, workspace = %workspace.display(), "workspace created");

        let wakespace = self.config.wakespace_dir(id);
        fs::create_dir_all(&wakespace)?;
        fs::create_dir_all(self.config.artifacts_dir(id))?;
        tracing::info!(build_id = id, wakespace = %wakespace.display(), "wakespace created");

        let build_config = self.config.build_config_path(id);
        fs::copy(job_path, &build_config)?;
        tracing::info!(build_id = id, config = %build_config.display(), "job file copied");

        let build = Build::new(
            id,
            job,
            self.config.clone(),
            self.broadcaster.clone(),
            self.history.clone(),
        );
        self.queue.add(Arc::clone(&build)).await;
        Ok(build)
    }
}

/// Read the effective build configuration for a past or current build.
///
/// The newer `build_plan<ext>` takes precedence when present; otherwise the
/// verbatim `build<ext>` copy is returned. Parsing is left to the job-file
/// layer.
pub fn build_config(config: &Config, build_id: i64) -> std::io::Result<String> {
    let plan = config.build_plan_path(build_id);
    if plan.exists() {
        return fs::read_to_string(plan);
    }
    fs::read_to_string(config.build_config_path(build_id))
}

#[cfg(test)]
#[path = "factory_tests.rs"]
mod tests;
