// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn paths_hang_off_work_dir() {
    let config = Config::new("/var/wake");
    assert_eq!(config.workspace_dir(7), PathBuf::from("/var/wake/workspace/7"));
    assert_eq!(config.wakespace_dir(7), PathBuf::from("/var/wake/wakespace/7"));
    assert_eq!(config.artifacts_dir(7), PathBuf::from("/var/wake/wakespace/7/artifacts"));
    assert_eq!(config.task_log_path(7, 3), PathBuf::from("/var/wake/wakespace/7/task_3.log"));
}

#[test]
fn config_file_paths_use_jobs_ext() {
    let config = Config::new("/var/wake").jobs_ext(".yml");
    assert_eq!(config.build_config_path(1), PathBuf::from("/var/wake/wakespace/1/build.yml"));
    assert_eq!(
        config.build_plan_path(1),
        PathBuf::from("/var/wake/wakespace/1/build_plan.yml")
    );
}

#[test]
fn base_url_scheme_depends_on_port() {
    let config = Config::new("/w").hostname("ci.example.com").port(443);
    assert_eq!(config.base_url(), "https://ci.example.com/");

    let config = Config::new("/w").port(8081);
    assert_eq!(config.base_url(), "http://localhost:8081/");
}
