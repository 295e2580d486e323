//! Error types for rbacsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use rbacsync_core::{BindingKey, ConfigError, GroupId};

/// Failures talking to the cluster store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("unable to infer kubernetes config: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    #[error("rolebinding {0} already exists")]
    AlreadyExists(BindingKey),

    #[error("rolebinding {0} not found")]
    NotFound(BindingKey),

    /// The API returned an object without a field the engine relies on.
    #[error("object is missing {0}")]
    Malformed(&'static str),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures resolving a group to its members.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("group {0} not found")]
    GroupNotFound(GroupId),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid service account key at {path}: {source}")]
    InvalidKey {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to sign token request: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("directory returned {status} for {what}: {body}")]
    Status {
        status: u16,
        what: String,
        body: String,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid directory API base URL: {0}")]
    InvalidApiBase(String),

    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Failures building or encoding the counters.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("unable to register metric: {0}")]
    Registration(#[from] prometheus::Error),

    #[error("unable to encode metrics: {0}")]
    Encoding(String),
}

/// Cycle-fatal errors. Anything here aborts the current cycle before a
/// single mutation is made.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unable to list namespaces: {0}")]
    ListNamespaces(#[source] StoreError),

    #[error("unable to get current managed rolebindings: {0}")]
    ListBindings(#[source] StoreError),
}
