// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task log pipeline.
//!
//! Each line a task produces is prefixed with the elapsed time since the
//! task started, stripped of ANSI color escapes, terminated with a newline,
//! written to the task's durable log file, and fanned out to subscribers as
//! a `build:log:<id>` message.
//!
//! Only one task runs at a time within a build, so the pipeline holds a
//! single current writer. The writer is buffered; it drains when the task
//! finishes and on an explicit flush request.

use crate::broadcast::Broadcaster;
use parking_lot::Mutex;
use regex::Regex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Instant;
use wake_core::{format_elapsed, TaskLogData};

static ANSI_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\x1b\\[[0-9;]*m").expect("constant regex pattern is valid"));

/// Remove ANSI color escape sequences from a log line.
pub fn strip_ansi(line: &str) -> String {
    ANSI_COLOR.replace_all(line, "").into_owned()
}

struct TaskLog {
    task_id: u32,
    started_at: Instant,
    writer: BufWriter<File>,
}

/// Formats, persists, and fans out the log output of one build.
pub struct LogPipeline {
    build_id: i64,
    /// Wakespace directory holding the `task_<id>.log` files
    dir: PathBuf,
    broadcaster: Broadcaster,
    current: Mutex<Option<TaskLog>>,
}

impl LogPipeline {
    pub fn new(build_id: i64, dir: PathBuf, broadcaster: Broadcaster) -> Self {
        Self { build_id, dir, broadcaster, current: Mutex::new(None) }
    }

    /// Open the log file for a task and record the executed command as the
    /// synthetic first entry.
    pub fn open_task(
        &self,
        task_id: u32,
        command: &str,
        started_at: Instant,
    ) -> std::io::Result<()> {
        let path = self.dir.join(format!("task_{task_id}.log"));
        let file = File::create(path)?;
        *self.current.lock() =
            Some(TaskLog { task_id, started_at, writer: BufWriter::new(file) });
        self.append(command);
        Ok(())
    }

    /// Process one output line: prefix, strip, persist, broadcast.
    ///
    /// A no-op when no task log is open. File write failures are traced and
    /// do not stop the stream; the broadcast still goes out.
    pub fn append(&self, line: &str) {
        let (task_id, formatted) = {
            let mut guard = self.current.lock();
            let Some(log) = guard.as_mut() else { return };
            let elapsed = format_elapsed(log.started_at.elapsed());
            let formatted = format!("[{elapsed:>10}] {}\n", strip_ansi(line));
            if let Err(e) = log.writer.write_all(formatted.as_bytes()) {
                tracing::warn!(
                    build_id = self.build_id,
                    task_id = log.task_id,
                    error = %e,
                    "failed to write task log"
                );
            }
            (log.task_id, formatted)
        };

        self.broadcaster.publish(
            format!("build:log:{}", self.build_id),
            &TaskLogData { task_id, data: formatted },
        );
    }

    /// Flush and close the current task log.
    pub fn finish_task(&self) {
        if let Some(mut log) = self.current.lock().take() {
            if let Err(e) = log.writer.flush() {
                tracing::warn!(
                    build_id = self.build_id,
                    task_id = log.task_id,
                    error = %e,
                    "failed to flush task log"
                );
            }
        }
    }

    /// Drain the buffered writer without closing it. Exposed to the HTTP
    /// layer as `FlushLogs`.
    pub fn flush(&self) {
        let mut guard = self.current.lock();
        if let Some(log) = guard.as_mut() {
            if let Err(e) = log.writer.flush() {
                tracing::warn!(
                    build_id = self.build_id,
                    task_id = log.task_id,
                    error = %e,
                    "failed to flush task log"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "logger_tests.rs"]
mod tests;
