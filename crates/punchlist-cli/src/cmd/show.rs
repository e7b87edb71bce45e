//! `punchlist show`: one task with its full status history.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use punchlist_core::export::task_to_json_value;
use punchlist_core::ops::{find_task, TaskSelector};

use super::{open_ledger, OutputMode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Task selector, a plain name or section/name.
    pub task: String,
}

pub fn run_show(args: &ShowArgs, output: OutputMode, root: &Path) -> Result<()> {
    let selector = TaskSelector::parse(&args.task)?;
    let (_resolution, ledger) = open_ledger(root)?;
    let (section, idx) = find_task(&ledger, &selector)?;
    let record = &ledger.section(section)[idx];

    if output.is_json() {
        println!(
            "{}",
            serde_json::to_string_pretty(&task_to_json_value(section, record))?
        );
        return Ok(());
    }

    println!("task:            {}", record.task);
    println!("section:         {}", section.key());
    println!("implemented:     {}", record.implemented.as_str());
    println!("working:         {}", record.working.as_str());
    if !record.file.is_empty() {
        println!("file:            {}", record.file);
    }
    println!("priority:        {}", record.priority.as_str());
    println!("stuck_count:     {}", record.stuck_count);
    println!("needs_retesting: {}", record.needs_retesting);
    if record.status_history.is_empty() {
        println!("history:         (none)");
    } else {
        println!("history:");
        for (idx, entry) in record.status_history.iter().enumerate() {
            println!(
                "  {}. [{}] working={} {}",
                idx + 1,
                entry.agent.as_str(),
                entry.working.as_str(),
                entry.comment
            );
        }
    }
    Ok(())
}
