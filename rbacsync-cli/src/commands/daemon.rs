//! `rbac-sync daemon`: reconcile forever on the configured interval.

use anyhow::{Context, Result};
use clap::Args;

use rbacsync_daemon::start_blocking;

use crate::args::ConfigArgs;

/// Arguments for `rbac-sync daemon`.
#[derive(Args, Debug)]
pub struct DaemonArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl DaemonArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.to_config()?;
        start_blocking(config, self.config.log_json).context("daemon exited with error")
    }
}
