//! `rbac-sync diff`: show what a reconciliation cycle would change.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use rbacsync_core::RoleBinding;
use rbacsync_daemon::{init_tracing, plan_blocking};
use rbacsync_sync::CyclePlan;

use crate::args::ConfigArgs;

/// Arguments for `rbac-sync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.to_config()?;
        init_tracing(self.config.log_json);
        let plan = plan_blocking(config).context("unable to plan reconciliation")?;
        print_plan(&plan, self.json)
    }
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "action")]
    action: &'static str,
    #[tabled(rename = "namespace")]
    namespace: String,
    #[tabled(rename = "rolebinding")]
    name: String,
    #[tabled(rename = "role")]
    role: String,
    #[tabled(rename = "subjects")]
    subjects: usize,
}

impl PlanRow {
    fn new(action: &'static str, binding: &RoleBinding) -> Self {
        Self {
            action,
            namespace: binding.namespace().to_string(),
            name: binding.name().to_string(),
            role: binding.role_ref.name.clone(),
            subjects: binding.subjects.len(),
        }
    }
}

/// Print a plan as a table, or as JSON.
pub(crate) fn print_plan(cycle: &CyclePlan, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(cycle).context("failed to serialize plan JSON")?
        );
        return Ok(());
    }

    let plan = &cycle.plan;
    let deletes = format!("{} to delete", plan.orphans.len());
    let creates = format!("{} to create", plan.additions.len());
    let updates = format!("{} to update", plan.updates.len());
    println!(
        "{} desired | {} current | {} | {} | {}",
        cycle.desired,
        cycle.current,
        deletes.as_str().red(),
        creates.as_str().green(),
        updates.as_str().yellow(),
    );

    let rows: Vec<PlanRow> = plan
        .orphans
        .iter()
        .map(|b| PlanRow::new("delete", b))
        .chain(plan.additions.iter().map(|b| PlanRow::new("create", b)))
        .chain(plan.updates.iter().map(|b| PlanRow::new("update", b)))
        .collect();

    if rows.is_empty() {
        println!("Nothing to change.");
    } else {
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    for key in &plan.mismatches {
        println!("{} no matching rolebinding for {key}", "!".yellow().bold());
    }
    for held in &cycle.held {
        println!(
            "{} {} held: group {} unresolved ({})",
            "■".red().bold(),
            held.namespace,
            held.group,
            held.error
        );
    }
    Ok(())
}
