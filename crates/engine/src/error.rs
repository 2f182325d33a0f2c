// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors from the reaper coordinator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReaperError {
    #[error("reaper has been shut down")]
    Stopped,
    #[error("a reaper instance is already installed")]
    AlreadyInstalled,
}
