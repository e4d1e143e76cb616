// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::broadcast::Broadcaster;
use std::time::{Duration, Instant};

struct Fixture {
    _dir: tempfile::TempDir,
    logs: LogPipeline,
    log_path: std::path::PathBuf,
    cwd: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let cwd = dir.path().join("workspace");
    std::fs::create_dir_all(&cwd).unwrap();
    let logs = LogPipeline::new(1, dir.path().to_path_buf(), Broadcaster::default());
    logs.open_task(1, "test task", Instant::now()).unwrap();
    let log_path = dir.path().join("task_1.log");
    Fixture { _dir: dir, logs, log_path, cwd }
}

fn runner(fx: &Fixture, command: &str) -> TaskRunner {
    TaskRunner { command: command.to_string(), cwd: fx.cwd.clone(), env: vec![] }
}

fn read_log(fx: &Fixture) -> String {
    fx.logs.finish_task();
    std::fs::read_to_string(&fx.log_path).unwrap()
}

#[tokio::test]
async fn zero_exit_finishes() {
    let fx = fixture();
    let status = runner(&fx, "echo out; echo err >&2").run(&CancellationToken::new(), &fx.logs).await;
    assert_eq!(status, ItemStatus::Finished);
    let log = read_log(&fx);
    assert!(log.contains("] out\n"));
    assert!(log.contains("] err\n"));
}

#[tokio::test]
async fn nonzero_exit_fails() {
    let fx = fixture();
    let status = runner(&fx, "exit 3").run(&CancellationToken::new(), &fx.logs).await;
    assert_eq!(status, ItemStatus::Failed);
}

#[tokio::test]
async fn output_before_failure_is_streamed() {
    let fx = fixture();
    let status = runner(&fx, "echo before; exit 1").run(&CancellationToken::new(), &fx.logs).await;
    assert_eq!(status, ItemStatus::Failed);
    assert!(read_log(&fx).contains("] before\n"));
}

#[tokio::test]
async fn cancellation_aborts_and_drains_buffered_output() {
    let fx = fixture();
    let cancel = CancellationToken::new();
    let task = runner(&fx, "echo early; sleep 30; echo late");

    let started = Instant::now();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        })
    };
    let status = task.run(&cancel, &fx.logs).await;
    handle.await.unwrap();

    assert_eq!(status, ItemStatus::Aborted);
    assert!(started.elapsed() < Duration::from_secs(5));
    let log = read_log(&fx);
    assert!(log.contains("] early\n"), "pre-abort output drained: {log}");
    assert!(log.contains("] Aborted.\n"));
    assert!(!log.contains("late"));
}

#[tokio::test]
async fn pre_cancelled_token_aborts_immediately() {
    let fx = fixture();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let status = runner(&fx, "sleep 30").run(&cancel, &fx.logs).await;
    assert_eq!(status, ItemStatus::Aborted);
}

#[tokio::test]
async fn long_lines_within_the_floor_are_not_split() {
    let fx = fixture();
    // 100 KiB of a single line; well under the 512 KiB cap.
    let status = runner(&fx, "printf 'x%.0s' $(seq 1 102400); echo")
        .run(&CancellationToken::new(), &fx.logs)
        .await;
    assert_eq!(status, ItemStatus::Finished);
    let log = read_log(&fx);
    let long = log.lines().find(|l| l.contains("xxx")).unwrap();
    assert_eq!(long.matches('x').count(), 102_400);
}

#[tokio::test]
async fn oversized_line_fails_the_task() {
    let fx = fixture();
    // One line over the 512 KiB cap; the task itself exits zero.
    let command = format!("printf 'y%.0s' $(seq 1 {}); echo", MAX_LINE_BYTES + 1024);
    let status = runner(&fx, &command).run(&CancellationToken::new(), &fx.logs).await;
    assert_eq!(status, ItemStatus::Failed);
}

#[tokio::test]
async fn spawn_error_fails() {
    let dir = tempfile::tempdir().unwrap();
    let logs = LogPipeline::new(1, dir.path().to_path_buf(), Broadcaster::default());
    let task = TaskRunner {
        command: "true".to_string(),
        cwd: dir.path().join("does-not-exist"),
        env: vec![],
    };
    let status = task.run(&CancellationToken::new(), &logs).await;
    assert_eq!(status, ItemStatus::Failed);
}

#[tokio::test]
async fn env_overrides_apply_in_order() {
    let fx = fixture();
    let task = TaskRunner {
        command: "echo \"$GREETING\"".to_string(),
        cwd: fx.cwd.clone(),
        env: vec![
            ("GREETING".to_string(), "first".to_string()),
            ("GREETING".to_string(), "second".to_string()),
        ],
    };
    let status = task.run(&CancellationToken::new(), &fx.logs).await;
    assert_eq!(status, ItemStatus::Finished);
    let log = read_log(&fx);
    assert!(log.contains("] second\n"));
    assert!(!log.contains("] first\n"));
}
