// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configured Kubernetes clusters ("clouds").
//!
//! A cloud is identified by name within the running system, but two `Cloud`
//! values with the same name may describe different connection parameters
//! (the operator edited the cloud in place). Every constructed `Cloud` gets a
//! fresh [`CloudInstanceId`]; the watch machinery binds to that instance so an
//! outdated configuration can be told apart from the current one.

use crate::retention::PodRetention;
use std::fmt;

/// Namespace used when a cloud does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

crate::define_id! {
    /// Identity of one constructed `Cloud` value.
    pub struct CloudInstanceId("cld-");
}

/// A configured Kubernetes cluster usable as a provisioning target.
#[derive(Clone, PartialEq, Eq)]
pub struct Cloud {
    name: String,
    instance: CloudInstanceId,
    /// API server URL; `None` uses the in-cluster or kubeconfig default.
    pub server_url: Option<String>,
    pub namespace: Option<String>,
    pub skip_tls_verify: bool,
    /// PEM encoded CA certificate for the API server.
    pub server_certificate: Option<String>,
    /// Bearer token for the API server.
    pub token: Option<String>,
    pub pod_retention: PodRetention,
}

impl Cloud {
    /// Create a cloud with default connection parameters and a fresh instance id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: CloudInstanceId::new(),
            server_url: None,
            namespace: None,
            skip_tls_verify: false,
            server_certificate: None,
            token: None,
            pod_retention: PodRetention::default(),
        }
    }

    crate::setters! {
        set {
            skip_tls_verify: bool,
            pod_retention: PodRetention,
        }
        option {
            server_url: String,
            namespace: String,
            server_certificate: String,
            token: String,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> &CloudInstanceId {
        &self.instance
    }

    /// Namespace watched and queried for this cloud's pods.
    pub fn pod_namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// True when `other` is the very same configured object.
    pub fn is_same_instance(&self, other: &Cloud) -> bool {
        self.instance == other.instance
    }

    /// True when both clouds would open identical connections.
    ///
    /// Ignores the instance id and the retention policy, neither of which
    /// affects the watch.
    pub fn same_connection(&self, other: &Cloud) -> bool {
        self.name == other.name
            && self.server_url == other.server_url
            && self.pod_namespace() == other.pod_namespace()
            && self.skip_tls_verify == other.skip_tls_verify
            && self.server_certificate == other.server_certificate
            && self.token == other.token
    }
}

impl fmt::Debug for Cloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cloud")
            .field("name", &self.name)
            .field("instance", &self.instance)
            .field("server_url", &self.server_url)
            .field("namespace", &self.pod_namespace())
            .field("skip_tls_verify", &self.skip_tls_verify)
            .field("server_certificate", &self.server_certificate.as_ref().map(|_| "<pem>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("pod_retention", &self.pod_retention)
            .finish()
    }
}

impl fmt::Display for Cloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.instance.short(8))
    }
}

#[cfg(test)]
#[path = "cloud_tests.rs"]
mod tests;
