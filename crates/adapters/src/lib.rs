// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the systems the reaper talks to: Kubernetes API servers and
//! the agent registry.

pub mod cluster;
pub mod registry;

pub use cluster::{
    ClusterClient, ClusterConnector, ClusterError, KubeConnector, PodWatch, WatchSettings,
};
#[cfg(any(test, feature = "test-support"))]
pub use cluster::{ClusterCall, FakeCluster, FakeConnector};
pub use registry::{AgentRegistry, ComputerState, NodeRegistry, RegistryError, TerminateHook};
