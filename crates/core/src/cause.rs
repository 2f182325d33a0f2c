// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offline causes and termination decisions.

use crate::agent::PodRef;
use std::fmt;

/// Why an agent's computer was taken offline by the reaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfflineCause {
    PodDeleted {
        pod: PodRef,
    },
    ContainerTerminated {
        pod: PodRef,
        container: String,
        exit_code: i32,
        reason: Option<String>,
    },
    PodFailed {
        pod: PodRef,
        phase: String,
        reason: Option<String>,
    },
    ImagePullBackOff {
        pod: PodRef,
        container: String,
        reason: String,
        occurrences: u32,
    },
}

impl OfflineCause {
    pub fn pod(&self) -> &PodRef {
        match self {
            OfflineCause::PodDeleted { pod }
            | OfflineCause::ContainerTerminated { pod, .. }
            | OfflineCause::PodFailed { pod, .. }
            | OfflineCause::ImagePullBackOff { pod, .. } => pod,
        }
    }
}

impl fmt::Display for OfflineCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfflineCause::PodDeleted { pod } => write!(f, "Pod {} was deleted", pod),
            OfflineCause::ContainerTerminated { pod, container, exit_code, reason } => {
                write!(f, "Container {} in pod {} terminated (exit code {}", container, pod, exit_code)?;
                if let Some(reason) = reason {
                    write!(f, ", reason {}", reason)?;
                }
                f.write_str(")")
            }
            OfflineCause::PodFailed { pod, phase, reason } => {
                write!(f, "Pod {} is in phase {}", pod, phase)?;
                if let Some(reason) = reason {
                    write!(f, " ({})", reason)?;
                }
                Ok(())
            }
            OfflineCause::ImagePullBackOff { pod, container, reason, occurrences } => write!(
                f,
                "Container {} in pod {} stuck in {} ({} events)",
                container, pod, reason, occurrences
            ),
        }
    }
}

/// A policy's decision to terminate an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    /// Short machine-readable reason, e.g. `OOMKilled` or `Evicted`.
    pub reason: String,
    pub cause: OfflineCause,
}

impl Termination {
    pub fn new(reason: impl Into<String>, cause: OfflineCause) -> Self {
        Self { reason: reason.into(), cause }
    }
}

/// Reasons for which a failed build step may be retried without concern:
/// the pod ran to completion or hit its own deadline.
pub fn is_ignorable_reason(reason: &str) -> bool {
    matches!(reason, "Completed" | "DeadlineExceeded")
}

#[cfg(test)]
#[path = "cause_tests.rs"]
mod tests;
