// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pod watch events, as delivered by one watch stream.

use crate::pod;
use k8s_openapi::api::core::v1::Pod;

/// HTTP status the API server uses when a watch's history was compacted.
pub const HTTP_GONE: u16 = 410;

/// Status carried by an `Error` watch event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchStatus {
    pub code: u16,
    pub reason: String,
    pub message: String,
}

impl WatchStatus {
    pub fn new(code: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code, reason: reason.into(), message: message.into() }
    }

    /// The watch's resource version is too old; a fresh watch is required.
    pub fn is_gone(&self) -> bool {
        self.code == HTTP_GONE
    }
}

/// One event from a pod watch.
#[derive(Debug, Clone, PartialEq)]
pub enum PodEvent {
    Added(Pod),
    Modified(Pod),
    Deleted(Pod),
    /// Resumption marker; carries no pod change.
    Bookmark { resource_version: String },
    Error(WatchStatus),
}

/// The kind of a [`PodEvent`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PodAction {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
}

crate::simple_display! {
    PodAction {
        Added => "ADDED",
        Modified => "MODIFIED",
        Deleted => "DELETED",
        Bookmark => "BOOKMARK",
        Error => "ERROR",
    }
}

impl PodEvent {
    pub fn action(&self) -> PodAction {
        match self {
            PodEvent::Added(_) => PodAction::Added,
            PodEvent::Modified(_) => PodAction::Modified,
            PodEvent::Deleted(_) => PodAction::Deleted,
            PodEvent::Bookmark { .. } => PodAction::Bookmark,
            PodEvent::Error(_) => PodAction::Error,
        }
    }

    /// The pod snapshot, for events that carry one.
    pub fn pod(&self) -> Option<&Pod> {
        match self {
            PodEvent::Added(pod) | PodEvent::Modified(pod) | PodEvent::Deleted(pod) => Some(pod),
            PodEvent::Bookmark { .. } | PodEvent::Error(_) => None,
        }
    }

    /// Resource version to resume a watch from after this event.
    pub fn resource_version(&self) -> Option<&str> {
        match self {
            PodEvent::Bookmark { resource_version } => Some(resource_version),
            PodEvent::Error(_) => None,
            _ => self.pod().and_then(pod::resource_version),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
