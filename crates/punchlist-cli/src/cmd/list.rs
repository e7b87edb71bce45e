//! `punchlist list`: filterable view over both task sections.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use punchlist_core::export::task_to_json_value;
use punchlist_core::ops::{filter_tasks, render_task_line, TaskFilter};

use super::{open_ledger, parse_priority, parse_section, parse_tri_state, OutputMode};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Limit to one section: backend or frontend.
    #[arg(long)]
    pub section: Option<String>,

    /// Filter by the current working value: true, false, or NA.
    #[arg(long)]
    pub working: Option<String>,

    /// Filter by priority: low, medium, high, critical.
    #[arg(long)]
    pub priority: Option<String>,

    /// Only tasks flagged for retesting.
    #[arg(long)]
    pub retest: bool,

    /// Only tasks with a positive stuck count.
    #[arg(long)]
    pub stuck: bool,
}

pub fn run_list(args: &ListArgs, output: OutputMode, root: &Path) -> Result<()> {
    let filter = TaskFilter {
        section: args.section.as_deref().map(parse_section).transpose()?,
        working: args.working.as_deref().map(parse_tri_state).transpose()?,
        priority: args.priority.as_deref().map(parse_priority).transpose()?,
        needs_retesting: if args.retest { Some(true) } else { None },
        stuck_only: args.stuck,
    };

    let (_resolution, ledger) = open_ledger(root)?;
    let tasks = filter_tasks(&ledger, &filter);

    if output.is_json() {
        let payload: Vec<serde_json::Value> = tasks
            .iter()
            .map(|(section, record)| task_to_json_value(*section, record))
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if tasks.is_empty() {
        println!("No tasks match");
    } else {
        for (section, record) in tasks {
            println!("{}", render_task_line(section, record));
        }
    }
    Ok(())
}
