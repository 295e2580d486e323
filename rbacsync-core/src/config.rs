//! Static process configuration.
//!
//! Built once at startup (the CLI maps flags and environment onto it) and
//! handed to the engine by reference. Nothing here is re-read during a cycle.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::declaration::parse_role_list;
use crate::error::ConfigError;
use crate::types::RoleName;

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_ROLE: &str = "rbacsync-default";
pub const DEFAULT_ROLEBINDING_PREFIX: &str = "rbacsync-default";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Fallbacks applied when a namespace omits the roles or prefix annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDefaults {
    pub roles: Vec<RoleName>,
    pub binding_prefix: String,
}

impl Default for BindingDefaults {
    fn default() -> Self {
        Self {
            roles: vec![RoleName::from(DEFAULT_ROLE)],
            binding_prefix: DEFAULT_ROLEBINDING_PREFIX.to_string(),
        }
    }
}

impl BindingDefaults {
    /// Build defaults from the comma separated form used on the command line.
    pub fn from_csv(roles: &str, binding_prefix: &str) -> Self {
        Self {
            roles: parse_role_list(roles),
            binding_prefix: binding_prefix.trim().to_string(),
        }
    }
}

/// Where group membership is resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorySource {
    /// Google Admin Directory, via a service account acting for `admin_user`.
    Google {
        key_file: PathBuf,
        admin_user: String,
    },
    /// A YAML file mapping group ids to member lists.
    Static { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub update_interval: Duration,
    pub defaults: BindingDefaults,
    pub bind_address: SocketAddr,
    pub directory: DirectorySource,
    /// Explicit kubeconfig; `None` means in-cluster or inferred config.
    pub kubeconfig: Option<PathBuf>,
}

impl SyncConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.defaults.roles.is_empty() {
            return Err(ConfigError::NoDefaultRoles);
        }
        if self.defaults.binding_prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if let DirectorySource::Google {
            key_file,
            admin_user,
        } = &self.directory
        {
            if key_file.as_os_str().is_empty() {
                return Err(ConfigError::Missing("--serviceaccount-keyfile"));
            }
            if admin_user.trim().is_empty() {
                return Err(ConfigError::Missing("--gcp-admin-user"));
            }
        }
        Ok(())
    }
}
