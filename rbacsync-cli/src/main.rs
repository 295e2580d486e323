//! rbac-sync: reconcile namespace RoleBindings with directory group membership.
//!
//! # Usage
//!
//! ```text
//! rbac-sync daemon [config flags]
//! rbac-sync sync [--dry-run] [--json] [config flags]
//! rbac-sync diff [--json] [config flags]
//! rbac-sync status [--url <daemon url>] [--json]
//! ```
//!
//! Config flags: `--kubeconfig`, `--serviceaccount-keyfile`, `--gcp-admin-user`,
//! `--static-groups`, `--default-roles`, `--default-rolebinding-prefix`,
//! `--update-interval`, `--bind-address`, `--log-json`. Each falls back to an
//! `RBAC_SYNC_*` environment variable.

mod args;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonArgs, diff::DiffArgs, status::StatusArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "rbac-sync",
    version,
    about = "Keep namespace RoleBindings in sync with directory group membership",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile on an interval and serve /healthz, /metrics and /status.
    Daemon(DaemonArgs),

    /// Run a single reconciliation cycle.
    Sync(SyncArgs),

    /// Show what a reconciliation cycle would change.
    Diff(DiffArgs),

    /// Query a running daemon's status endpoint.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Daemon(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}
