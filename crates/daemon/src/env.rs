// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve the config file: REAPER_CONFIG > XDG_CONFIG_HOME/reaper > ~/.config/reaper
pub fn config_path() -> Result<PathBuf, LifecycleError> {
    if let Ok(path) = std::env::var("REAPER_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("reaper/reaper.toml"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoConfigDir)?;
    Ok(PathBuf::from(home).join(".config/reaper/reaper.toml"))
}

/// Log filter directive. `REAPER_LOG` wins over `RUST_LOG`.
pub fn log_filter() -> Option<String> {
    ["REAPER_LOG", "RUST_LOG"]
        .iter()
        .find_map(|key| std::env::var(key).ok())
        .filter(|s| !s.is_empty())
}

/// Directory for daily-rolling log files. Unset means stderr only.
pub fn log_dir() -> Option<PathBuf> {
    std::env::var("REAPER_LOG_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Overrides `image_pull_backoff_limit` from the config file.
pub fn image_pull_backoff_limit() -> Option<u32> {
    std::env::var("REAPER_IMAGE_PULL_BACKOFF_LIMIT").ok().and_then(|s| s.parse::<u32>().ok())
}

/// Shutdown drain timeout (default 5s, configurable via `REAPER_DRAIN_TIMEOUT_MS`).
pub fn drain_timeout() -> Duration {
    std::env::var("REAPER_DRAIN_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
