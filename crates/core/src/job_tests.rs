// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::status::TaskKind;

fn sample_job() -> Job {
    Job::new("deploy")
        .tasks(vec![
            Task::new(0, TaskKind::Pending, "notify-start"),
            Task::main(1, "make build"),
            Task::main(2, "make test"),
            Task::new(3, TaskKind::Failed, "notify-failure"),
        ])
        .timeout(Duration::from_secs(300))
}

#[test]
fn main_tasks_preserve_declaration_order() {
    let job = sample_job();
    let ids: Vec<u32> = job.main_tasks().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn hook_tasks_filter_by_kind() {
    let job = sample_job();
    let pending: Vec<&Task> = job.hook_tasks(TaskKind::Pending).collect();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].command, "notify-start");
    assert_eq!(job.hook_tasks(TaskKind::Aborted).count(), 0);
}

#[test]
fn job_defaults_are_empty() {
    let job = Job::new("lint");
    assert_eq!(job.name, "lint");
    assert!(job.tasks.is_empty());
    assert!(job.timeout.is_none());
    assert!(job.artifacts.is_empty());
    assert!(job.default_params.is_empty());
}

#[test]
fn job_serde_round_trip() {
    let job = sample_job()
        .artifacts(vec!["out/**".to_string()])
        .default_params(vec![HashMap::from([("ENV".to_string(), "ci".to_string())])]);
    let json = serde_json::to_string(&job).unwrap();
    let back: Job = serde_json::from_str(&json).unwrap();
    assert_eq!(back, job);
}
