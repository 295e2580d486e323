//! `rbac-sync sync`: run exactly one reconciliation cycle.

use anyhow::{Context, Result};
use clap::Args;

use rbacsync_daemon::{init_tracing, plan_blocking, sync_blocking};
use rbacsync_sync::CycleReport;

use crate::args::ConfigArgs;
use crate::commands::diff::print_plan;

/// Arguments for `rbac-sync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Print the plan without mutating the cluster.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.to_config()?;
        init_tracing(self.config.log_json);

        if self.dry_run {
            let plan = plan_blocking(config).context("unable to plan reconciliation")?;
            return print_plan(&plan, self.json);
        }

        let report = sync_blocking(config).context("reconciliation cycle failed")?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report JSON")?
            );
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &CycleReport) {
    let status = if report.failed == 0 { "✓" } else { "✗" };
    println!(
        "{status} {} deleted, {} created, {} updated, {} failed ({} ms)",
        report.deleted, report.created, report.updated, report.failed, report.duration_ms
    );
    if report.mismatched > 0 {
        println!("  {} bindings had no match and were skipped", report.mismatched);
    }
    for held in &report.held {
        println!("  held {}: {}", held.namespace, held.error);
    }
}
