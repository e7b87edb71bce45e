//! `punchlist add`: create a task in one of the two sections.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use punchlist_core::export::task_to_json_value;
use punchlist_core::ops::create_task;
use serde_json::json;

use super::{mutate_ledger, parse_priority, parse_section, Mutation, OutputMode};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Section the task belongs to: backend or frontend.
    pub section: String,

    /// Task name, unique within its section.
    pub name: String,

    /// Source file the task points at.
    #[arg(long, default_value = "")]
    pub file: String,

    /// Priority: low, medium, high, critical.
    #[arg(long, default_value = "medium")]
    pub priority: String,
}

pub fn run_add(
    args: &AddArgs,
    agent_flag: Option<&str>,
    output: OutputMode,
    root: &Path,
) -> Result<()> {
    let section = parse_section(&args.section)?;
    let priority = parse_priority(&args.priority)?;

    let record = mutate_ledger(root, agent_flag, "task.create", |ledger, _agent| {
        let record = create_task(ledger, section, &args.name, &args.file, priority)?;
        Ok(Mutation {
            task: Some(record.task.clone()),
            details: json!({
                "section": section.key(),
                "priority": priority.as_str(),
            }),
            value: record,
        })
    })?;

    if output.is_json() {
        let payload = task_to_json_value(section, &record);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!(
            "Added {}/{} (priority: {})",
            section.key(),
            record.task,
            record.priority.as_str()
        );
    }
    Ok(())
}
