//! `punchlist record`: append a status entry to a task's history.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use punchlist_core::export::task_to_json_value;
use punchlist_core::ops::{append_status, TaskSelector};
use serde_json::json;

use super::{mutate_ledger, parse_tri_state, Mutation, OutputMode};

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Task selector, a plain name or section/name.
    pub task: String,

    /// Observed result: true, false, or NA.
    #[arg(long)]
    pub working: String,

    /// What was observed. Required, history entries are useless without it.
    #[arg(long)]
    pub comment: String,
}

pub fn run_record(
    args: &RecordArgs,
    agent_flag: Option<&str>,
    output: OutputMode,
    root: &Path,
) -> Result<()> {
    let selector = TaskSelector::parse(&args.task)?;
    let working = parse_tri_state(&args.working)?;

    let outcome = mutate_ledger(root, agent_flag, "status.append", |ledger, agent| {
        let outcome = append_status(ledger, &selector, working, agent, &args.comment)?;
        Ok(Mutation {
            task: Some(outcome.record.task.clone()),
            details: json!({
                "working": working.as_json(),
                "agent": agent.as_str(),
                "stuck_incremented": outcome.stuck_incremented,
                "stuck_reset": outcome.stuck_reset,
            }),
            value: outcome,
        })
    })?;

    if output.is_json() {
        let mut payload = task_to_json_value(outcome.section, &outcome.record);
        if let Some(map) = payload.as_object_mut() {
            map.insert(
                "stuck_incremented".to_string(),
                serde_json::Value::Bool(outcome.stuck_incremented),
            );
            map.insert(
                "stuck_reset".to_string(),
                serde_json::Value::Bool(outcome.stuck_reset),
            );
            map.insert(
                "retest_cleared".to_string(),
                serde_json::Value::Bool(outcome.retest_cleared),
            );
        }
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!(
            "Recorded {}/{}: working={}",
            outcome.section.key(),
            outcome.record.task,
            outcome.record.working.as_str()
        );
        if outcome.stuck_incremented {
            println!(
                "Recurrence after a fix claim, stuck_count is now {}",
                outcome.record.stuck_count
            );
        }
        if outcome.stuck_reset {
            println!("Testing agent confirmed the fix, stuck_count reset to 0");
        }
        if outcome.retest_cleared {
            println!("Cleared needs_retesting");
        }
    }
    Ok(())
}
