//! `punchlist init`: scaffold the ledger document for a repo.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use punchlist_core::audit::{append_audit_event, AuditEvent};
use punchlist_core::init::{init_at, InitOptions};
use serde_json::json;

use super::{resolve_agent, OutputMode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// One-paragraph statement of what is being built and for whom.
    #[arg(long)]
    pub problem: Option<String>,

    /// Recorded in metadata as the document author.
    #[arg(long)]
    pub created_by: Option<String>,

    /// Keep the document at a custom path, recorded in .punchlist.toml.
    #[arg(long)]
    pub ledger: Option<String>,

    /// Keep the document under .punchlist/ instead of the repo root.
    #[arg(long)]
    pub hidden: bool,
}

pub fn run_init(
    args: &InitArgs,
    agent_flag: Option<&str>,
    output: OutputMode,
    root: &Path,
) -> Result<()> {
    let options = InitOptions {
        problem_statement: args.problem.clone(),
        created_by: args.created_by.clone(),
        ledger: args.ledger.clone(),
        hidden: args.hidden,
    };
    let outcome = init_at(root, &options)?;

    let agent = resolve_agent(root, agent_flag)?;
    let event = AuditEvent::new(
        Some(agent.as_str().to_string()),
        "init",
        None,
        json!({
            "ledger_path": outcome.ledger_path.to_string_lossy(),
        }),
    );
    if let Err(err) = append_audit_event(root, &event) {
        tracing::warn!("audit append failed: {}", err);
    }

    if output.is_json() {
        let payload = json!({
            "ledger_path": outcome.ledger_path.to_string_lossy(),
            "config_path": outcome.config_path.as_ref().map(|p| p.to_string_lossy().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("Initialized ledger at {}", outcome.ledger_path.display());
        if let Some(config) = outcome.config_path.as_ref() {
            println!("Recorded ledger path in {}", config.display());
        }
    }
    Ok(())
}
