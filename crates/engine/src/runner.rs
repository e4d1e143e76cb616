// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervised execution of a single shell task.
//!
//! Runs the command under `bash -c`, streams stdout and stderr line by line
//! into the log pipeline in arrival order, and resolves to a terminal
//! [`ItemStatus`]. The select loop watches both output streams and the
//! cancellation token; on abort the child is killed and any lines already
//! buffered in the pipes are still drained before the runner returns.

use crate::logger::LogPipeline;
use futures_util::StreamExt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use wake_core::ItemStatus;

/// Longest single output line the runner accepts. Lines beyond this fail
/// the task instead of being split.
pub const MAX_LINE_BYTES: usize = 512 * 1024;

type LineStream<R> = FramedRead<R, LinesCodec>;

fn lines<R: AsyncRead>(reader: R) -> LineStream<R> {
    FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES))
}

/// One shell command plus the context it executes in.
pub struct TaskRunner {
    pub command: String,
    pub cwd: PathBuf,
    /// Extra environment on top of the inherited process env; applied in
    /// order, so later duplicates override earlier ones
    pub env: Vec<(String, String)>,
}

impl TaskRunner {
    /// Run the command to completion, streaming output into `logs`.
    ///
    /// Returns `Finished` on a clean zero exit, `Aborted` when the
    /// cancellation token fired before completion, and `Failed` for
    /// everything else: spawn errors, oversized output lines, nonzero or
    /// abnormal exits.
    pub async fn run(&self, cancel: &CancellationToken, logs: &LogPipeline) -> ItemStatus {
        let mut command = Command::new("bash");
        command
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.cwd)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(command = %self.command, error = %e, "failed to start task");
                return ItemStatus::Failed;
            }
        };

        let mut stdout = child.stdout.take().map(lines);
        let mut stderr = child.stderr.take().map(lines);

        let mut aborted = false;
        let mut stream_error = false;

        while stdout.is_some() || stderr.is_some() {
            tokio::select! {
                line = next_line(&mut stdout), if stdout.is_some() => {
                    match line {
                        Some(Ok(line)) => logs.append(&line),
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "stdout stream error");
                            stream_error = true;
                            // An oversized line is discarded by the codec and
                            // the stream continues; an I/O error will not recover.
                            if matches!(e, LinesCodecError::Io(_)) {
                                stdout = None;
                            }
                        }
                        None => stdout = None,
                    }
                }
                line = next_line(&mut stderr), if stderr.is_some() => {
                    match line {
                        Some(Ok(line)) => logs.append(&line),
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "stderr stream error");
                            stream_error = true;
                            if matches!(e, LinesCodecError::Io(_)) {
                                stderr = None;
                            }
                        }
                        None => stderr = None,
                    }
                }
                _ = cancel.cancelled(), if !aborted => {
                    logs.append("Aborted.");
                    aborted = true;
                    if let Err(e) = child.start_kill() {
                        tracing::warn!(error = %e, "failed to kill task process");
                    }
                }
            }
        }

        // Both pipes are closed; collect the exit status.
        let status = child.wait().await;

        if aborted {
            return ItemStatus::Aborted;
        }
        match status {
            Ok(exit) if exit.success() && !stream_error => ItemStatus::Finished,
            Ok(exit) => {
                tracing::debug!(
                    command = %self.command,
                    code = exit.code().unwrap_or(-1),
                    stream_error,
                    "task did not finish cleanly"
                );
                ItemStatus::Failed
            }
            Err(e) => {
                tracing::error!(command = %self.command, error = %e, "failed to reap task");
                ItemStatus::Failed
            }
        }
    }
}

/// Next frame from an optional stream; pends forever when the stream is
/// already gone so the disabled select branch never resolves.
async fn next_line<R: AsyncRead + Unpin>(
    stream: &mut Option<LineStream<R>>,
) -> Option<Result<String, LinesCodecError>> {
    match stream {
        Some(inner) => inner.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
