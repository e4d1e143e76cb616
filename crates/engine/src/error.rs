// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use thiserror::Error;

/// Errors surfaced by the queue, factory, and control operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("build {0} not found")]
    BuildNotFound(i64),
    #[error("storage error: {0}")]
    Storage(#[from] wake_storage::StorageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
