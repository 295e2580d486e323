//! Configuration flags shared by every command that talks to the cluster.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use rbacsync_core::config::{
    DEFAULT_BIND_ADDRESS, DEFAULT_ROLE, DEFAULT_ROLEBINDING_PREFIX, DEFAULT_UPDATE_INTERVAL,
};
use rbacsync_core::{BindingDefaults, DirectorySource, SyncConfig};

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Kubeconfig file. In-cluster or inferred configuration when omitted.
    #[arg(long, env = "RBAC_SYNC_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Google service account JSON key with domain-wide delegation.
    #[arg(long, env = "RBAC_SYNC_SERVICEACCOUNT_KEYFILE")]
    pub serviceaccount_keyfile: Option<PathBuf>,

    /// Google Workspace admin the service account acts on behalf of.
    #[arg(long, env = "RBAC_SYNC_GCP_ADMIN_USER")]
    pub gcp_admin_user: Option<String>,

    /// YAML file mapping group ids to members. Replaces the Google directory.
    #[arg(long, env = "RBAC_SYNC_STATIC_GROUPS")]
    pub static_groups: Option<PathBuf>,

    /// Comma separated roles bound when a namespace names none.
    #[arg(long, env = "RBAC_SYNC_DEFAULT_ROLES", default_value = DEFAULT_ROLE)]
    pub default_roles: String,

    /// Rolebinding name prefix used when a namespace names none.
    #[arg(
        long,
        env = "RBAC_SYNC_DEFAULT_ROLEBINDING_PREFIX",
        default_value = DEFAULT_ROLEBINDING_PREFIX
    )]
    pub default_rolebinding_prefix: String,

    /// Seconds between reconciliation cycles.
    #[arg(
        long,
        env = "RBAC_SYNC_UPDATE_INTERVAL",
        default_value_t = DEFAULT_UPDATE_INTERVAL.as_secs()
    )]
    pub update_interval: u64,

    /// Address for the health, metrics and status endpoints.
    #[arg(long, env = "RBAC_SYNC_BIND_ADDRESS", default_value = DEFAULT_BIND_ADDRESS)]
    pub bind_address: SocketAddr,

    /// Emit logs as JSON lines.
    #[arg(long, env = "RBAC_SYNC_LOG_JSON")]
    pub log_json: bool,
}

impl ConfigArgs {
    /// Build and validate the engine configuration. `--static-groups` takes
    /// precedence over the Google directory flags.
    pub fn to_config(&self) -> Result<SyncConfig> {
        let directory = match &self.static_groups {
            Some(path) => DirectorySource::Static { path: path.clone() },
            None => DirectorySource::Google {
                key_file: self.serviceaccount_keyfile.clone().unwrap_or_default(),
                admin_user: self.gcp_admin_user.clone().unwrap_or_default(),
            },
        };

        let config = SyncConfig {
            update_interval: Duration::from_secs(self.update_interval),
            defaults: BindingDefaults::from_csv(
                &self.default_roles,
                &self.default_rolebinding_prefix,
            ),
            bind_address: self.bind_address,
            directory,
            kubeconfig: self.kubeconfig.clone(),
        };
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        config: ConfigArgs,
    }

    fn parse(args: &[&str]) -> ConfigArgs {
        let mut argv = vec!["rbac-sync"];
        argv.extend_from_slice(args);
        Harness::try_parse_from(argv).expect("parse").config
    }

    #[test]
    fn static_groups_select_the_static_directory() {
        let config = parse(&["--static-groups", "groups.yaml", "--default-roles", "admin, view"])
            .to_config()
            .expect("config");
        assert_eq!(
            config.directory,
            DirectorySource::Static {
                path: PathBuf::from("groups.yaml")
            }
        );
        assert_eq!(config.defaults.roles.len(), 2);
        assert_eq!(config.update_interval, DEFAULT_UPDATE_INTERVAL);
    }

    #[test]
    fn google_directory_needs_both_flags() {
        let args = parse(&["--serviceaccount-keyfile", "/sa.json"]);
        let err = args.to_config().unwrap_err();
        assert!(format!("{err:#}").contains("--gcp-admin-user"));
    }

    #[test]
    fn zero_interval_is_invalid() {
        let args = parse(&["--static-groups", "g.yaml", "--update-interval", "0"]);
        let err = args.to_config().unwrap_err();
        assert!(format!("{err:#}").contains("greater than zero"));
    }
}
