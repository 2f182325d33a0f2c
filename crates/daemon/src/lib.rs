// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reaper daemon library
//!
//! Config loading, logging and lifecycle wiring behind the `reaperd` binary.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod audit;
pub mod config;
pub mod env;
pub mod lifecycle;
pub mod logging;

pub use config::{ConfigError, Settings};
pub use lifecycle::{Daemon, LifecycleError, ReloadSummary};
