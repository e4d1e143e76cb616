// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::broadcast::Broadcaster;
use crate::config::Config;
use std::time::Duration;
use wake_core::{Job, Task};
use wake_storage::HistoryStore;

struct Fixture {
    _dir: tempfile::TempDir,
    config: Config,
    history: HistoryStore,
    broadcaster: Broadcaster,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(dir.path());
    Fixture {
        _dir: dir,
        config,
        history: HistoryStore::open_in_memory().unwrap(),
        broadcaster: Broadcaster::default(),
    }
}

impl Fixture {
    fn build(&self, id: i64, job: Job) -> Arc<Build> {
        std::fs::create_dir_all(self.config.workspace_dir(id)).unwrap();
        std::fs::create_dir_all(self.config.wakespace_dir(id)).unwrap();
        Build::new(id, job, self.config.clone(), self.broadcaster.clone(), self.history.clone())
    }
}

fn quick_job() -> Job {
    Job::new("quick").tasks(vec![Task::main(1, "true")])
}

async fn wait_terminal(build: &Arc<Build>) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !build.status().is_terminal() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("build did not reach a terminal state");
}

#[tokio::test]
async fn add_enqueues_in_pending_and_promotes() {
    let fx = fixture();
    let queue = Queue::new(1);
    let build = fx.build(1, quick_job());

    queue.add(Arc::clone(&build)).await;
    wait_terminal(&build).await;
    assert_eq!(build.status(), ItemStatus::Finished);
    assert_eq!(queue.active_count(), 0);
    assert_eq!(queue.queued_count(), 0);
}

#[tokio::test]
async fn cap_zero_keeps_builds_queued() {
    let fx = fixture();
    let queue = Queue::new(0);
    let build = fx.build(1, quick_job());

    queue.add(Arc::clone(&build)).await;
    assert_eq!(build.status(), ItemStatus::Pending);
    assert_eq!(queue.queued_count(), 1);
    assert_eq!(queue.active_count(), 0);
}

#[tokio::test]
async fn raising_the_cap_takes_effect_on_next_take() {
    let fx = fixture();
    let queue = Queue::new(0);
    let build = fx.build(1, quick_job());

    queue.add(Arc::clone(&build)).await;
    queue.set_concurrency(1);
    queue.take();
    wait_terminal(&build).await;
    assert_eq!(build.status(), ItemStatus::Finished);
}

#[tokio::test]
async fn take_now_bypasses_the_cap() {
    let fx = fixture();
    let queue = Queue::new(0);
    let build = fx.build(1, quick_job());

    queue.add(Arc::clone(&build)).await;
    queue.take_now(1).unwrap();
    wait_terminal(&build).await;
    assert_eq!(build.status(), ItemStatus::Finished);
}

#[tokio::test]
async fn take_now_of_unknown_build_errors() {
    let _fx = fixture();
    let queue = Queue::new(0);
    assert!(matches!(queue.take_now(42), Err(EngineError::BuildNotFound(42))));
}

#[tokio::test]
async fn abort_of_queued_build_transitions_directly() {
    let fx = fixture();
    let queue = Queue::new(0);
    let build = fx.build(1, quick_job());

    queue.add(Arc::clone(&build)).await;
    queue.abort(1, ItemStatus::Aborted).await.unwrap();
    assert_eq!(build.status(), ItemStatus::Aborted);
    assert_eq!(queue.queued_count(), 0);

    // Never started: zero duration in the stored record.
    let record = fx.history.get_update(1).unwrap().unwrap();
    assert_eq!(record.duration_ms, 0);
    assert_eq!(record.started_at_ms, 0);
}

#[tokio::test]
async fn abort_of_unknown_build_errors() {
    let _fx = fixture();
    let queue = Queue::new(2);
    assert!(matches!(
        queue.abort(7, ItemStatus::Aborted).await,
        Err(EngineError::BuildNotFound(7))
    ));
}

#[tokio::test]
async fn flush_logs_requires_an_active_build() {
    let fx = fixture();
    let queue = Queue::new(0);
    let build = fx.build(1, quick_job());

    queue.add(Arc::clone(&build)).await;
    // Still queued, not active.
    assert!(matches!(queue.flush_logs(1), Err(EngineError::BuildNotFound(1))));
}
