//! `punchlist focus`: manage test_plan.current_focus.

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use punchlist_core::plan::{add_focus, clear_focus, set_focus};
use serde_json::json;

use super::{mutate_ledger, open_ledger, Mutation, OutputMode};

#[derive(Subcommand, Debug)]
pub enum FocusCommand {
    /// Print the current focus list
    Show,
    /// Replace the focus list with the given entries
    Set {
        /// Focus entries; plain task names or section/name.
        entries: Vec<String>,
    },
    /// Add one entry if it is not already present
    Add {
        /// Focus entry to append.
        entry: String,
    },
    /// Empty the focus list
    Clear,
}

pub fn run_focus(
    command: &FocusCommand,
    agent_flag: Option<&str>,
    output: OutputMode,
    root: &Path,
) -> Result<()> {
    match command {
        FocusCommand::Show => {
            let (_resolution, ledger) = open_ledger(root)?;
            let entries = &ledger.test_plan.current_focus;
            if output.is_json() {
                println!("{}", serde_json::to_string_pretty(entries)?);
            } else if entries.is_empty() {
                println!("Focus is empty");
            } else {
                for entry in entries {
                    println!("{}", entry);
                }
            }
            Ok(())
        }
        FocusCommand::Set { entries } => {
            let kept = mutate_ledger(root, agent_flag, "plan.focus.set", |ledger, _agent| {
                let kept = set_focus(ledger, entries.clone());
                Ok(Mutation {
                    task: None,
                    details: json!({"entries": kept}),
                    value: kept,
                })
            })?;
            if output.is_json() {
                println!("{}", json!({"entries": kept}))
            } else {
                println!("Focus set, {} entr{}", kept, if kept == 1 { "y" } else { "ies" });
            }
            Ok(())
        }
        FocusCommand::Add { entry } => {
            let added = mutate_ledger(root, agent_flag, "plan.focus.add", |ledger, _agent| {
                let added = add_focus(ledger, entry);
                Ok(Mutation {
                    task: None,
                    details: json!({"entry": entry, "added": added}),
                    value: added,
                })
            })?;
            if output.is_json() {
                println!("{}", json!({"entry": entry, "added": added}))
            } else if added {
                println!("Added {} to focus", entry);
            } else {
                println!("{} was already in focus", entry);
            }
            Ok(())
        }
        FocusCommand::Clear => {
            let removed = mutate_ledger(root, agent_flag, "plan.focus.clear", |ledger, _agent| {
                let removed = clear_focus(ledger);
                Ok(Mutation {
                    task: None,
                    details: json!({"removed": removed}),
                    value: removed,
                })
            })?;
            if output.is_json() {
                println!("{}", json!({"removed": removed}))
            } else {
                println!("Cleared {} focus entr{}", removed, if removed == 1 { "y" } else { "ies" });
            }
            Ok(())
        }
    }
}
