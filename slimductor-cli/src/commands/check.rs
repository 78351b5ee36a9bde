//! `slimductor check`: who is live, and who leads each domain.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use slimductor_core::{identity, Role, Summary, SummaryRow};

use super::open_registry;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReportJson {
    #[serde(flatten)]
    summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_list_id: Option<String>,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let summary = open_registry()?
            .check()
            .context("failed to check sessions")?;
        let task_list_id = identity::task_list_id();

        if self.json {
            let payload = CheckReportJson {
                summary,
                task_list_id,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize check JSON")?
            );
            return Ok(());
        }

        print_summary(&summary, task_list_id.as_deref());
        Ok(())
    }
}

fn print_summary(summary: &Summary, task_list_id: Option<&str>) {
    println!("{}", summary.headline());
    if let Some(id) = task_list_id {
        println!("  task list: {id}");
    }
    for row in summary.rows() {
        println!("  {}", styled_row(row));
    }
}

/// The plain row text with the role tag or warning highlighted.
fn styled_row(row: SummaryRow<'_>) -> String {
    let text = row.to_string();
    match row {
        SummaryRow::Session(entry) => match text.split_once(' ') {
            Some((tag, rest)) => {
                let tag = match entry.role {
                    Role::Orchestrator => tag.green().bold(),
                    Role::Worker => tag.normal(),
                    Role::Vacating => tag.yellow(),
                };
                format!("{tag} {rest}")
            }
            None => text.clone(),
        },
        SummaryRow::Contested(_) => text.yellow().bold().to_string(),
    }
}
