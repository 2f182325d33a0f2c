// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! reaper-engine: reconciles build agents with the pods backing them.
//!
//! One [`CloudPodWatcher`](watcher) task per cloud feeds pod events through
//! the correlation index and the termination policies. The [`Reaper`]
//! coordinator owns the set of watchers and is the only place that opens,
//! replaces or closes them.

mod activation;
pub mod clouds;
pub mod config;
pub mod correlation;
mod error;
mod events;
pub mod listener;
pub mod policy;
mod reaper;
pub mod reasons;
pub mod retention;
mod watcher;

pub use clouds::{CloudChange, CloudStore};
pub use config::ReaperConfig;
pub use error::ReaperError;
pub use listener::{Listeners, PodEventListener};
pub use policy::{
    ContainerTerminatedPolicy, ImagePullBackOffPolicy, PodFailedPolicy, PolicyInput,
    TerminationPolicy,
};
pub use reaper::{Reaper, ReaperBuilder};
pub use reasons::TerminationReasons;
pub use retention::RetentionHook;
pub use watcher::WatchState;

#[cfg(test)]
mod test_helpers;
