//! `rbac-sync status`: ask a running daemon how it is doing.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Deserialize;

/// Arguments for `rbac-sync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Base URL of the daemon's HTTP surface.
    #[arg(long, env = "RBAC_SYNC_STATUS_URL", default_value = "http://127.0.0.1:8080")]
    pub url: String,

    /// Emit the raw status JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    started_at: DateTime<Utc>,
    cycles: u64,
    aborted_cycles: u64,
    last_cycle_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_report: Option<ReportPayload>,
}

#[derive(Debug, Deserialize)]
struct ReportPayload {
    deleted: usize,
    created: usize,
    updated: usize,
    failed: usize,
    #[serde(default)]
    held: Vec<serde_json::Value>,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let url = format!("{}/status", self.url.trim_end_matches('/'));
        let body: serde_json::Value = ureq::get(&url)
            .call()
            .with_context(|| format!("failed to reach daemon at {url}"))?
            .into_json()
            .context("daemon returned invalid status JSON")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&body).context("failed to render status JSON")?
            );
            return Ok(());
        }

        let status: StatusPayload =
            serde_json::from_value(body).context("unexpected status payload")?;
        print_status(&status);
        Ok(())
    }
}

fn print_status(status: &StatusPayload) {
    println!(
        "rbac-sync up since {} | {} cycles | {} aborted",
        status.started_at.to_rfc3339(),
        status.cycles,
        status.aborted_cycles
    );
    match status.last_cycle_at {
        Some(at) => println!("last cycle: {}", at.to_rfc3339()),
        None => println!("last cycle: never"),
    }
    if let Some(report) = &status.last_report {
        println!(
            "  {} deleted, {} created, {} updated, {} failed, {} held",
            report.deleted,
            report.created,
            report.updated,
            report.failed,
            report.held.len()
        );
    }
    if let Some(error) = &status.last_error {
        println!("{} {error}", "last error:".red().bold());
    }
}
