// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build state machine.
//!
//! A build drives one job instance `pending → running → {finished | failed
//! | aborted}`. Each transition runs the lifecycle hooks of the matching
//! kind, and every transition ends with exactly one publish: the history
//! record is written first, then the `build:update` broadcast goes out.
//!
//! Pending hooks run on their own task so enqueueing is not delayed; the
//! stored join handle is awaited at the next transition, so a build never
//! enters `running` while its pending hooks are still going. All other
//! hooks run inline within the transition.

use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::logger::LogPipeline;
use crate::queue::Queue;
use crate::runner::TaskRunner;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wake_core::{epoch_ms, BuildUpdateData, ItemStatus, Job, TaskKind, TaskSnapshot};
use wake_storage::HistoryStore;

/// Mutable per-build view of one task. The job's task list is immutable;
/// execution state lives here, indexed in parallel with `job.tasks`.
struct TaskState {
    id: u32,
    kind: TaskKind,
    command: String,
    status: ItemStatus,
    started_at: Option<Instant>,
    started_at_ms: u64,
    duration: Option<Duration>,
}

impl TaskState {
    fn new(task: &wake_core::Task) -> Self {
        Self {
            id: task.id,
            kind: task.kind,
            command: task.command.clone(),
            status: ItemStatus::Pending,
            started_at: None,
            started_at_ms: 0,
            duration: None,
        }
    }

    fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            kind: self.kind,
            status: self.status,
            started_at_ms: self.started_at_ms,
            duration_ms: self.duration.unwrap_or_default().as_millis() as u64,
        }
    }
}

struct BuildState {
    status: ItemStatus,
    tasks: Vec<TaskState>,
    params: Vec<HashMap<String, String>>,
    artifacts: Vec<String>,
    started_at: Option<Instant>,
    started_at_ms: u64,
    duration: Option<Duration>,
    /// Join handle for the asynchronously running pending hooks; awaited at
    /// the next transition
    pending_hooks: Option<JoinHandle<()>>,
    timeout_timer: Option<JoinHandle<()>>,
}

/// One execution instance of a job.
pub struct Build {
    pub id: i64,
    pub job: Job,
    config: Config,
    history: HistoryStore,
    broadcaster: Broadcaster,
    logs: LogPipeline,
    /// Abort signal observed by main tasks; cancelled at most once
    cancel: CancellationToken,
    me: Weak<Build>,
    state: Mutex<BuildState>,
}

impl Build {
    pub fn new(
        id: i64,
        job: Job,
        config: Config,
        broadcaster: Broadcaster,
        history: HistoryStore,
    ) -> Arc<Self> {
        let logs = LogPipeline::new(id, config.wakespace_dir(id), broadcaster.clone());
        let tasks = job.tasks.iter().map(TaskState::new).collect();
        let params = job.default_params.clone();
        Arc::new_cyclic(|me| Self {
            id,
            job,
            config,
            history,
            broadcaster,
            logs,
            cancel: CancellationToken::new(),
            me: me.clone(),
            state: Mutex::new(BuildState {
                status: ItemStatus::Pending,
                tasks,
                params,
                artifacts: Vec::new(),
                started_at: None,
                started_at_ms: 0,
                duration: None,
                pending_hooks: None,
                timeout_timer: None,
            }),
        })
    }

    pub fn status(&self) -> ItemStatus {
        self.state.lock().status
    }

    /// Execute the primary task sequence. Invoked by the queue when the
    /// build is promoted; drives the build to a terminal state.
    pub(crate) async fn run(&self, queue: &Arc<Queue>) {
        self.set_status(queue, ItemStatus::Running).await;

        let main_indexes: Vec<usize> = {
            let state = self.state.lock();
            state
                .tasks
                .iter()
                .enumerate()
                .filter(|(_, t)| t.kind.is_main())
                .map(|(i, _)| i)
                .collect()
        };

        for index in main_indexes {
            self.begin_task(index);
            self.publish_update();

            let status = self.exec_task(index, self.cancel.clone()).await;
            self.finish_task(index, status);
            self.publish_update();

            match status {
                ItemStatus::Failed => {
                    self.set_status(queue, ItemStatus::Failed).await;
                    return;
                }
                ItemStatus::Aborted => {
                    self.set_status(queue, ItemStatus::Aborted).await;
                    return;
                }
                _ => {}
            }
        }

        self.set_status(queue, ItemStatus::Finished).await;
    }

    /// Enter a new status and run its transition effects.
    ///
    /// Terminal states are entered at most once; a transition requested
    /// after that is dropped. Exactly one history write and one broadcast
    /// happen per entered status, after the transition effects.
    pub(crate) async fn set_status(&self, queue: &Arc<Queue>, status: ItemStatus) {
        {
            let mut state = self.state.lock();
            if state.status.is_terminal() {
                tracing::debug!(
                    build_id = self.id,
                    current = %state.status,
                    requested = %status,
                    "ignoring transition out of terminal state"
                );
                return;
            }
            state.status = status;
        }
        tracing::info!(build_id = self.id, %status, "build status");

        // Wait for outstanding pending hooks before anything else runs.
        let pending_hooks = self.state.lock().pending_hooks.take();
        if let Some(handle) = pending_hooks {
            if let Err(e) = handle.await {
                tracing::warn!(build_id = self.id, error = %e, "pending hook task failed");
            }
        }

        match status {
            ItemStatus::Pending => {
                // Pending hooks must not delay enqueueing; they get their
                // own task and the handle above blocks the next transition.
                if let Some(build) = self.me.upgrade() {
                    let handle = tokio::spawn(async move {
                        build.run_hooks(TaskKind::Pending).await;
                    });
                    self.state.lock().pending_hooks = Some(handle);
                }
            }
            ItemStatus::Running => {
                {
                    let mut state = self.state.lock();
                    state.started_at = Some(Instant::now());
                    state.started_at_ms = epoch_ms();
                }
                self.arm_timeout(queue);
                self.run_hooks(TaskKind::Running).await;
            }
            ItemStatus::Finished => {
                self.collect_artifacts();
                self.run_hooks(TaskKind::Finished).await;
                self.finalize();
                self.cleanup(queue);
            }
            ItemStatus::Failed => {
                self.run_hooks(TaskKind::Failed).await;
                self.finalize();
                self.cleanup(queue);
            }
            ItemStatus::Aborted => {
                self.run_hooks(TaskKind::Aborted).await;
                self.finalize();
                self.cleanup(queue);
            }
        }

        self.publish_update();
    }

    /// Deliver the abort signal. Idempotent: once the build is terminal
    /// (or the token already cancelled) this has no further effect.
    pub fn request_abort(&self) {
        let state = self.state.lock();
        if !state.status.is_terminal() {
            self.cancel.cancel();
        }
    }

    /// Drain the buffered task log to disk.
    pub fn flush_logs(&self) {
        self.logs.flush();
    }

    /// Run the lifecycle hooks of one kind, sequentially.
    ///
    /// Hooks observe a fresh cancellation token: the build's own token is
    /// consumed by the main sequence, and an abort must not also kill the
    /// hooks that run on the resulting transition.
    async fn run_hooks(&self, kind: TaskKind) {
        let hook_indexes: Vec<usize> = {
            let state = self.state.lock();
            state
                .tasks
                .iter()
                .enumerate()
                .filter(|(_, t)| t.kind == kind)
                .map(|(i, _)| i)
                .collect()
        };

        for index in hook_indexes {
            self.begin_task(index);
            let status = self.exec_task(index, CancellationToken::new()).await;
            self.finish_task(index, status);
        }
    }

    fn begin_task(&self, index: usize) {
        let mut state = self.state.lock();
        let task = &mut state.tasks[index];
        task.status = ItemStatus::Running;
        task.started_at = Some(Instant::now());
        task.started_at_ms = epoch_ms();
    }

    fn finish_task(&self, index: usize, status: ItemStatus) {
        let mut state = self.state.lock();
        let task = &mut state.tasks[index];
        task.status = status;
        task.duration = task.started_at.map(|t| t.elapsed());
    }

    /// Run one task under supervision and return its terminal status.
    async fn exec_task(&self, index: usize, cancel: CancellationToken) -> ItemStatus {
        let (task_id, command, started_at) = {
            let state = self.state.lock();
            let task = &state.tasks[index];
            (task.id, task.command.clone(), task.started_at.unwrap_or_else(Instant::now))
        };

        tracing::info!(build_id = self.id, task_id, "task started");
        if let Err(e) = self.logs.open_task(task_id, &command, started_at) {
            tracing::error!(build_id = self.id, task_id, error = %e, "failed to open task log");
            return ItemStatus::Failed;
        }

        let runner = TaskRunner {
            command,
            cwd: self.config.workspace_dir(self.id),
            env: self.task_env(),
        };
        let status = runner.run(&cancel, &self.logs).await;
        self.logs.finish_task();

        tracing::info!(build_id = self.id, task_id, %status, "task completed");
        status
    }

    /// Environment injected into every task, on top of the inherited
    /// process environment. Param maps apply in order; later keys win.
    fn task_env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("WAKE_BUILD_ID".to_string(), self.id.to_string()),
            (
                "WAKE_BUILD_WORKSPACE".to_string(),
                self.config.workspace_dir(self.id).display().to_string(),
            ),
            ("WAKE_JOB_NAME".to_string(), self.job.name.clone()),
            ("WAKE_CONFIG_DIR".to_string(), self.config.job_dir.display().to_string()),
            ("WAKE_URL".to_string(), self.config.base_url()),
        ];
        for params in &self.state.lock().params {
            for (key, value) in params {
                env.push((key.clone(), value.clone()));
            }
        }
        env
    }

    /// Arm the one-shot timeout that requests a queue-level abort.
    fn arm_timeout(&self, queue: &Arc<Queue>) {
        let Some(timeout) = self.job.timeout else { return };
        let queue = Arc::clone(queue);
        let build_id = self.id;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracing::warn!(build_id, "build timed out");
            if let Err(e) = queue.abort(build_id, ItemStatus::Aborted).await {
                tracing::warn!(build_id, error = %e, "timeout abort failed");
            }
        });
        self.state.lock().timeout_timer = Some(handle);
    }

    /// Copy workspace files matching the job's artifact patterns into the
    /// artifacts directory, preserving relative structure. Per-file
    /// failures are logged and skipped; the build does not fail.
    fn collect_artifacts(&self) {
        let workspace = self.config.workspace_dir(self.id);
        let artifacts_dir = self.config.artifacts_dir(self.id);

        for pattern in &self.job.artifacts {
            let full_pattern = workspace.join(pattern).to_string_lossy().into_owned();
            let paths = match glob::glob(&full_pattern) {
                Ok(paths) => paths,
                Err(e) => {
                    tracing::warn!(
                        build_id = self.id,
                        pattern = %pattern,
                        error = %e,
                        "invalid artifact pattern"
                    );
                    continue;
                }
            };

            for entry in paths {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::warn!(build_id = self.id, error = %e, "unreadable artifact path");
                        continue;
                    }
                };
                if path.is_dir() {
                    continue;
                }
                let Ok(rel) = path.strip_prefix(&workspace) else { continue };
                let dest = artifacts_dir.join(rel);
                if let Some(parent) = dest.parent() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        tracing::warn!(
                            build_id = self.id,
                            artifact = %rel.display(),
                            error = %e,
                            "failed to create artifact directory"
                        );
                        continue;
                    }
                }
                match std::fs::copy(&path, &dest) {
                    Ok(_) => {
                        tracing::info!(
                            build_id = self.id,
                            artifact = %rel.display(),
                            "collected artifact"
                        );
                        self.state.lock().artifacts.push(rel.to_string_lossy().into_owned());
                    }
                    Err(e) => {
                        tracing::warn!(
                            build_id = self.id,
                            artifact = %rel.display(),
                            error = %e,
                            "failed to copy artifact"
                        );
                    }
                }
            }
        }
    }

    /// Set the total duration, exactly once. A build aborted while still
    /// queued never started; its duration is zero.
    fn finalize(&self) {
        let mut state = self.state.lock();
        if state.duration.is_none() {
            state.duration = Some(state.started_at.map(|t| t.elapsed()).unwrap_or_default());
        }
    }

    /// Stop the timeout timer and release the queue slot. Take runs after
    /// every removal so the queue keeps making progress.
    fn cleanup(&self, queue: &Arc<Queue>) {
        if let Some(timer) = self.state.lock().timeout_timer.take() {
            timer.abort();
        }
        queue.remove(self.id);
        queue.take();
    }

    /// Write the current record to history, then broadcast it. The store
    /// write lands first so a subscriber reading history on receipt never
    /// sees an older record than the message it just got.
    fn publish_update(&self) {
        let data = self.update_data();
        if let Err(e) = self.history.put_update(&data) {
            tracing::warn!(build_id = self.id, error = %e, "failed to persist build update");
        }
        self.broadcaster.publish(format!("build:update:{}", self.id), &data);
    }

    fn update_data(&self) -> BuildUpdateData {
        let state = self.state.lock();
        BuildUpdateData {
            id: self.id,
            name: self.job.name.clone(),
            status: state.status,
            tasks: state.tasks.iter().map(TaskState::snapshot).collect(),
            params: state.params.clone(),
            artifacts: state.artifacts.clone(),
            started_at_ms: state.started_at_ms,
            duration_ms: state.duration.unwrap_or_default().as_millis() as u64,
        }
    }
}
