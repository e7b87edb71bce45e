//! `punchlist say` and `punchlist comm`: the inter-agent message log.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use punchlist_core::ops::append_message;
use serde_json::json;

use super::{mutate_ledger, open_ledger, Mutation, OutputMode};

#[derive(Args, Debug)]
pub struct SayArgs {
    /// Message for the other agents. Attributed to the acting agent.
    pub message: String,
}

pub fn run_say(
    args: &SayArgs,
    agent_flag: Option<&str>,
    output: OutputMode,
    root: &Path,
) -> Result<()> {
    let entry = mutate_ledger(root, agent_flag, "comm.post", |ledger, agent| {
        let entry = append_message(ledger, agent, &args.message)?;
        Ok(Mutation {
            task: None,
            details: json!({"agent": entry.agent.as_str()}),
            value: entry,
        })
    })?;

    if output.is_json() {
        let payload = json!({
            "agent": entry.agent.as_str(),
            "message": entry.message,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("[{}] {}", entry.agent.as_str(), entry.message);
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct CommArgs {
    /// Show only the most recent N entries.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

pub fn run_comm(args: &CommArgs, output: OutputMode, root: &Path) -> Result<()> {
    let (_resolution, ledger) = open_ledger(root)?;
    let entries = &ledger.agent_communication;
    let skip = match args.limit {
        Some(limit) if limit < entries.len() => entries.len() - limit,
        _ => 0,
    };

    if output.is_json() {
        let payload: Vec<serde_json::Value> = entries
            .iter()
            .skip(skip)
            .map(|entry| {
                json!({
                    "agent": entry.agent.as_str(),
                    "message": entry.message,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if entries.is_empty() {
        println!("No messages");
    } else {
        for entry in entries.iter().skip(skip) {
            println!("[{}] {}", entry.agent.as_str(), entry.message);
        }
    }
    Ok(())
}
