use std::net::SocketAddr;

use thiserror::Error;

use rbacsync_core::ConfigError;
use rbacsync_sync::{MetricsError, ResolveError, StoreError, SyncError};

/// Error surface for daemon startup and the one-shot commands.
///
/// Once the scheduler is running, cycle errors are logged and counted rather
/// than returned.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error ({context}): {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cluster store error: {0}")]
    Store(#[from] StoreError),

    #[error("directory error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("{task} task join failure: {reason}")]
    Task { task: &'static str, reason: String },
}

pub(crate) fn io_err(context: &'static str, source: std::io::Error) -> DaemonError {
    DaemonError::Io { context, source }
}
