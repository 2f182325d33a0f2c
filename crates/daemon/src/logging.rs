// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber setup.
//!
//! Logs go to stderr. When `REAPER_LOG_DIR` is set they are also written to a
//! daily-rolling `reaperd.log` in that directory.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::lifecycle::LifecycleError;

const LOG_FILE: &str = "reaperd.log";

/// Keeps the file writer alive. Dropping it flushes pending lines.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Build the filter from `REAPER_LOG`/`RUST_LOG`, defaulting to `info`.
pub fn filter(directive: Option<&str>) -> EnvFilter {
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

pub fn setup_logging(log_dir: Option<&Path>) -> Result<LogGuard, LifecycleError> {
    let filter = filter(crate::env::log_filter().as_deref());
    let stderr = fmt::layer().with_writer(std::io::stderr);

    let Some(dir) = log_dir else {
        tracing_subscriber::registry().with(filter).with(stderr).init();
        return Ok(LogGuard { _file: None });
    };

    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();
    Ok(LogGuard { _file: Some(guard) })
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
