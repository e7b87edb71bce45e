//! `punchlist plan`: sync derived plan state, or run the retest gate.

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use punchlist_core::plan::{check_plan, sync_plan};
use serde_json::json;

use super::{mutate_ledger, open_ledger, Mutation, OutputMode};

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
    /// Add focus entries for retest-flagged tasks and rebuild stuck_tasks
    Sync,
    /// Fail when a retest-flagged task is not covered by current_focus
    Check,
}

/// Returns whether the command passed. `check` fails the process when the
/// gate is not satisfied; `sync` always passes.
pub fn run_plan(
    command: &PlanCommand,
    agent_flag: Option<&str>,
    output: OutputMode,
    root: &Path,
) -> Result<bool> {
    match command {
        PlanCommand::Sync => {
            let report = mutate_ledger(root, agent_flag, "plan.sync", |ledger, _agent| {
                let report = sync_plan(ledger);
                Ok(Mutation {
                    task: None,
                    details: json!({
                        "added_focus": report.added_focus,
                        "added_stuck": report.added_stuck,
                        "removed_stuck": report.removed_stuck,
                    }),
                    value: report,
                })
            })?;
            if output.is_json() {
                let payload = json!({
                    "added_focus": report.added_focus,
                    "added_stuck": report.added_stuck,
                    "removed_stuck": report.removed_stuck,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "Plan synced: {} focus added, {} stuck added, {} stuck removed",
                    report.added_focus.len(),
                    report.added_stuck.len(),
                    report.removed_stuck.len()
                );
            }
            Ok(true)
        }
        PlanCommand::Check => {
            let (_resolution, ledger) = open_ledger(root)?;
            let check = check_plan(&ledger);
            if output.is_json() {
                let payload = json!({
                    "ok": check.ok,
                    "missing_focus": check.missing_focus,
                    "unknown_focus": check.unknown_focus,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for name in &check.missing_focus {
                    println!("missing focus: {}", name);
                }
                for entry in &check.unknown_focus {
                    println!("unknown focus entry: {}", entry);
                }
                if check.ok {
                    println!("Plan check passed");
                } else {
                    println!(
                        "Plan check failed, {} task(s) need focus coverage",
                        check.missing_focus.len()
                    );
                }
            }
            Ok(check.ok)
        }
    }
}
