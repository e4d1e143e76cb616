// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build admission queue.
//!
//! Builds wait in FIFO order and are promoted to `running` while the
//! active count stays under the concurrency cap. `take_now` bypasses both
//! the cap and the ordering. The mutex-guarded inner state is only held
//! for short, non-reentrant bookkeeping; builds execute on their own
//! spawned tasks.

use crate::build::Build;
use crate::error::EngineError;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use wake_core::ItemStatus;

struct Inner {
    pending: VecDeque<Arc<Build>>,
    active: HashMap<i64, Arc<Build>>,
    concurrency: usize,
}

pub struct Queue {
    inner: Mutex<Inner>,
    me: Weak<Queue>,
}

impl Queue {
    pub fn new(concurrency: usize) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                active: HashMap::new(),
                concurrency,
            }),
            me: me.clone(),
        })
    }

    /// Change the concurrency cap. Takes effect on the next `take`;
    /// already-running builds are unaffected.
    pub fn set_concurrency(&self, concurrency: usize) {
        self.inner.lock().concurrency = concurrency;
    }

    /// Admit a newly created build: transition it to `pending` (which runs
    /// its pending hooks and publishes the first update), enqueue it, and
    /// try to promote.
    pub async fn add(&self, build: Arc<Build>) {
        if let Some(queue) = self.me.upgrade() {
            build.set_status(&queue, ItemStatus::Pending).await;
        }
        self.inner.lock().pending.push_back(build);
        self.take();
    }

    /// Promote the oldest queued build if a slot is free. No-op otherwise.
    pub fn take(&self) {
        let build = {
            let mut inner = self.inner.lock();
            if inner.active.len() >= inner.concurrency {
                return;
            }
            let Some(build) = inner.pending.pop_front() else { return };
            inner.active.insert(build.id, Arc::clone(&build));
            build
        };
        tracing::info!(build_id = build.id, "starting build");
        self.spawn_run(build);
    }

    /// Promote the named queued build immediately, ignoring the cap.
    pub fn take_now(&self, build_id: i64) -> Result<(), EngineError> {
        let build = {
            let mut inner = self.inner.lock();
            let position = inner
                .pending
                .iter()
                .position(|b| b.id == build_id)
                .ok_or(EngineError::BuildNotFound(build_id))?;
            let Some(build) = inner.pending.remove(position) else {
                return Err(EngineError::BuildNotFound(build_id));
            };
            inner.active.insert(build.id, Arc::clone(&build));
            build
        };
        tracing::info!(build_id, "starting build on demand");
        self.spawn_run(build);
        Ok(())
    }

    /// Abort a build. A build still waiting in the queue transitions
    /// directly to `status`; a running build gets the abort signal and
    /// reaches `aborted` through its task loop. Safe to call repeatedly:
    /// only the first delivery has an effect.
    pub async fn abort(&self, build_id: i64, status: ItemStatus) -> Result<(), EngineError> {
        enum Target {
            Queued(Arc<Build>),
            Active(Arc<Build>),
        }

        let target = {
            let mut inner = self.inner.lock();
            if let Some(position) = inner.pending.iter().position(|b| b.id == build_id) {
                match inner.pending.remove(position) {
                    Some(build) => Target::Queued(build),
                    None => return Err(EngineError::BuildNotFound(build_id)),
                }
            } else if let Some(build) = inner.active.get(&build_id) {
                Target::Active(Arc::clone(build))
            } else {
                return Err(EngineError::BuildNotFound(build_id));
            }
        };

        match target {
            Target::Queued(build) => {
                tracing::info!(build_id, %status, "aborting queued build");
                if let Some(queue) = self.me.upgrade() {
                    build.set_status(&queue, status).await;
                }
            }
            Target::Active(build) => {
                tracing::info!(build_id, "aborting running build");
                build.request_abort();
            }
        }
        Ok(())
    }

    /// Flush the named build's buffered task log to disk.
    pub fn flush_logs(&self, build_id: i64) -> Result<(), EngineError> {
        let build = self
            .inner
            .lock()
            .active
            .get(&build_id)
            .cloned()
            .ok_or(EngineError::BuildNotFound(build_id))?;
        build.flush_logs();
        Ok(())
    }

    /// Drop a build from the active set after its cleanup. Callers follow
    /// with `take` to keep the queue draining.
    pub fn remove(&self, build_id: i64) {
        self.inner.lock().active.remove(&build_id);
    }

    /// Builds currently promoted (running or in a transition).
    pub fn active_count(&self) -> usize {
        self.inner.lock().active.len()
    }

    /// Builds still waiting for a slot.
    pub fn queued_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    fn spawn_run(&self, build: Arc<Build>) {
        let Some(queue) = self.me.upgrade() else { return };
        tokio::spawn(async move {
            build.run(&queue).await;
        });
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
