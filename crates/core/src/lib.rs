// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! reaper-core: domain types for reconciling build agents with their pods

pub mod macros;

pub mod agent;
pub mod cause;
pub mod clock;
pub mod cloud;
pub mod event;
pub mod id;
pub mod pod;
pub mod retention;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{AgentRecord, PodRef, PodTemplateRef};
#[cfg(any(test, feature = "test-support"))]
pub use agent::AgentRecordBuilder;
pub use cause::{is_ignorable_reason, OfflineCause, Termination};
pub use clock::{Clock, FakeClock, SystemClock};
pub use cloud::{Cloud, CloudInstanceId, DEFAULT_NAMESPACE};
pub use event::{PodAction, PodEvent, WatchStatus, HTTP_GONE};
pub use id::short;
pub use retention::PodRetention;
