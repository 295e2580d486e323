//! Error types for rbacsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while assembling or validating static configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading a configuration file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with the offending file path.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("update interval must be greater than zero")]
    ZeroInterval,

    #[error("default role list is empty")]
    NoDefaultRoles,

    #[error("default rolebinding prefix is empty")]
    EmptyPrefix,

    /// A required setting was not supplied, e.g. `--gcp-admin-user`.
    #[error("missing configuration: {0}")]
    Missing(&'static str),
}
