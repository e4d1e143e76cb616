// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration and filesystem layout.
//!
//! One `Config` is built at startup and passed explicitly to the factory,
//! queue, and builds. All per-build paths hang off `work_dir`:
//!
//! ```text
//! <work_dir>/workspace/<id>/            task working directory
//! <work_dir>/wakespace/<id>/            build metadata
//! <work_dir>/wakespace/<id>/build<ext>  verbatim copy of the job file
//! <work_dir>/wakespace/<id>/task_<n>.log
//! <work_dir>/wakespace/<id>/artifacts/  collected artifacts
//! ```

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of all build state
    pub work_dir: PathBuf,
    /// Directory the job files are loaded from; exposed to tasks as
    /// `WAKE_CONFIG_DIR`
    pub job_dir: PathBuf,
    /// Public hostname, used for `WAKE_URL` when serving TLS
    pub hostname: String,
    pub port: u16,
    /// Queue concurrency cap applied at startup
    pub concurrent_builds: usize,
    /// Job file extension including the dot, e.g. `.yaml`
    pub jobs_ext: String,
}

impl Config {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        Self {
            job_dir: work_dir.join("jobs"),
            work_dir,
            hostname: "localhost".to_string(),
            port: 8081,
            concurrent_builds: 2,
            jobs_ext: ".yaml".to_string(),
        }
    }

    wake_core::setters! {
        into {
            job_dir: PathBuf,
            hostname: String,
            jobs_ext: String,
        }
        set {
            port: u16,
            concurrent_builds: usize,
        }
    }

    /// Per-build scratch directory where tasks execute.
    pub fn workspace_dir(&self, build_id: i64) -> PathBuf {
        self.work_dir.join("workspace").join(build_id.to_string())
    }

    /// Per-build metadata directory.
    pub fn wakespace_dir(&self, build_id: i64) -> PathBuf {
        self.work_dir.join("wakespace").join(build_id.to_string())
    }

    pub fn artifacts_dir(&self, build_id: i64) -> PathBuf {
        self.wakespace_dir(build_id).join("artifacts")
    }

    /// Verbatim copy of the job file that triggered the build.
    pub fn build_config_path(&self, build_id: i64) -> PathBuf {
        self.wakespace_dir(build_id).join(format!("build{}", self.jobs_ext))
    }

    /// Effective plan in the newer format, written by the trigger layer.
    pub fn build_plan_path(&self, build_id: i64) -> PathBuf {
        self.wakespace_dir(build_id).join(format!("build_plan{}", self.jobs_ext))
    }

    pub fn task_log_path(&self, build_id: i64, task_id: u32) -> PathBuf {
        self.wakespace_dir(build_id).join(format!("task_{task_id}.log"))
    }

    /// Base URL advertised to tasks as `WAKE_URL`.
    pub fn base_url(&self) -> String {
        if self.port == 443 {
            format!("https://{}/", self.hostname)
        } else {
            format!("http://localhost:{}/", self.port)
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
