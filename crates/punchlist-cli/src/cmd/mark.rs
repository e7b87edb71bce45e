//! Small task mutators: `implemented`, `retest`, `stuck`, `resolve`.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use punchlist_core::export::task_to_json_value;
use punchlist_core::ops::{
    increment_stuck, mark_implemented, mark_retest, resolve_stuck, TaskSelector,
};
use serde_json::json;

use super::{mutate_ledger, Mutation, OutputMode};

#[derive(Args, Debug)]
pub struct ImplementedArgs {
    /// Task selector, a plain name or section/name.
    pub task: String,
}

pub fn run_implemented(
    args: &ImplementedArgs,
    agent_flag: Option<&str>,
    output: OutputMode,
    root: &Path,
) -> Result<()> {
    let selector = TaskSelector::parse(&args.task)?;
    let (section, record) = mutate_ledger(root, agent_flag, "task.implemented", |ledger, _agent| {
        let (section, record) = mark_implemented(ledger, &selector)?;
        Ok(Mutation {
            task: Some(record.task.clone()),
            details: json!({"section": section.key()}),
            value: (section, record),
        })
    })?;

    if output.is_json() {
        println!(
            "{}",
            serde_json::to_string_pretty(&task_to_json_value(section, &record))?
        );
    } else {
        println!(
            "Marked {}/{} implemented, flagged for verification",
            section.key(),
            record.task
        );
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct RetestArgs {
    /// Task selector, a plain name or section/name.
    pub task: String,
}

pub fn run_retest(
    args: &RetestArgs,
    agent_flag: Option<&str>,
    output: OutputMode,
    root: &Path,
) -> Result<()> {
    let selector = TaskSelector::parse(&args.task)?;
    let outcome = mutate_ledger(root, agent_flag, "task.retest", |ledger, _agent| {
        let outcome = mark_retest(ledger, &selector)?;
        Ok(Mutation {
            task: Some(outcome.task.clone()),
            details: json!({"changed": outcome.changed}),
            value: outcome,
        })
    })?;

    if output.is_json() {
        let payload = json!({
            "section": outcome.section.key(),
            "task": outcome.task,
            "needs_retesting": true,
            "changed": outcome.changed,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if outcome.changed {
        println!("Flagged {}/{} for retesting", outcome.section.key(), outcome.task);
    } else {
        println!(
            "{}/{} was already flagged for retesting",
            outcome.section.key(),
            outcome.task
        );
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct StuckArgs {
    /// Task selector, a plain name or section/name.
    pub task: String,
}

pub fn run_stuck(
    args: &StuckArgs,
    agent_flag: Option<&str>,
    output: OutputMode,
    root: &Path,
) -> Result<()> {
    let selector = TaskSelector::parse(&args.task)?;
    let (section, record) = mutate_ledger(root, agent_flag, "task.stuck", |ledger, _agent| {
        let (section, record) = increment_stuck(ledger, &selector)?;
        Ok(Mutation {
            task: Some(record.task.clone()),
            details: json!({"stuck_count": record.stuck_count}),
            value: (section, record),
        })
    })?;

    if output.is_json() {
        println!(
            "{}",
            serde_json::to_string_pretty(&task_to_json_value(section, &record))?
        );
    } else {
        println!(
            "{}/{} stuck_count is now {}",
            section.key(),
            record.task,
            record.stuck_count
        );
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Task selector, a plain name or section/name.
    pub task: String,

    /// What the verification showed. Recorded as a testing-agent entry.
    #[arg(long)]
    pub comment: String,
}

pub fn run_resolve(
    args: &ResolveArgs,
    agent_flag: Option<&str>,
    output: OutputMode,
    root: &Path,
) -> Result<()> {
    let selector = TaskSelector::parse(&args.task)?;
    let outcome = mutate_ledger(root, agent_flag, "task.resolve", |ledger, _agent| {
        let outcome = resolve_stuck(ledger, &selector, &args.comment)?;
        Ok(Mutation {
            task: Some(outcome.record.task.clone()),
            details: json!({"stuck_reset": outcome.stuck_reset}),
            value: outcome,
        })
    })?;

    if output.is_json() {
        println!(
            "{}",
            serde_json::to_string_pretty(&task_to_json_value(outcome.section, &outcome.record))?
        );
    } else {
        println!(
            "Resolved {}/{}: working=true, stuck_count={}",
            outcome.section.key(),
            outcome.record.task,
            outcome.record.stuck_count
        );
    }
    Ok(())
}
