//! Command handlers plus the shared mutation pipeline.
//!
//! Every mutating command goes through [`mutate_ledger`]: resolve the
//! document, take the repo lock, load, apply, optionally sync the plan,
//! save, then append an audit event. Read commands skip the lock.

pub mod add;
pub mod comm;
pub mod doctor;
pub mod export;
pub mod focus;
pub mod init;
pub mod list;
pub mod mark;
pub mod plan;
pub mod record;
pub mod show;
pub mod status;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use punchlist_core::audit::{append_audit_event, AuditEvent};
use punchlist_core::config::{resolve_auto_sync_plan, resolve_default_agent};
use punchlist_core::ledger::{Agent, Ledger, Priority, Section, TriState};
use punchlist_core::lock::{LedgerLock, DEFAULT_LOCK_TIMEOUT};
use punchlist_core::plan::sync_plan;
use punchlist_core::store::{load_ledger, resolve_ledger, save_ledger, LedgerResolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

pub fn resolve_root(flag: Option<&Path>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path.to_path_buf()),
        None => std::env::current_dir().context("Failed to read the current directory"),
    }
}

pub fn open_ledger(root: &Path) -> Result<(LedgerResolution, Ledger)> {
    let resolution = resolve_ledger(root)?;
    let ledger = load_ledger(&resolution.ledger_path)?;
    Ok((resolution, ledger))
}

pub fn parse_section(raw: &str) -> Result<Section> {
    Section::parse(raw)
        .ok_or_else(|| anyhow::anyhow!("Unknown section: {} (expected backend or frontend)", raw))
}

pub fn parse_priority(raw: &str) -> Result<Priority> {
    Priority::parse(raw).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown priority: {} (expected low, medium, high, or critical)",
            raw
        )
    })
}

pub fn parse_tri_state(raw: &str) -> Result<TriState> {
    TriState::parse(raw)
        .ok_or_else(|| anyhow::anyhow!("Unknown working value: {} (expected true, false, or NA)", raw))
}

pub fn resolve_agent(repo_root: &Path, flag: Option<&str>) -> Result<Agent> {
    match flag {
        Some(raw) => Agent::parse(raw)
            .ok_or_else(|| anyhow::anyhow!("Unknown agent: {} (expected main, testing, or user)", raw)),
        None => Ok(resolve_default_agent(repo_root)),
    }
}

/// What a mutation closure hands back: the command's value plus what the
/// audit event should say about it.
pub struct Mutation<T> {
    pub value: T,
    pub task: Option<String>,
    pub details: serde_json::Value,
}

pub fn mutate_ledger<T>(
    root: &Path,
    agent_flag: Option<&str>,
    action: &str,
    apply: impl FnOnce(&mut Ledger, Agent) -> Result<Mutation<T>>,
) -> Result<T> {
    let resolution = resolve_ledger(root)?;
    let agent = resolve_agent(&resolution.repo_root, agent_flag)?;
    let _lock = LedgerLock::acquire(&resolution.repo_root, DEFAULT_LOCK_TIMEOUT)?;

    let mut ledger = load_ledger(&resolution.ledger_path)?;
    let mutation = apply(&mut ledger, agent)?;
    if resolve_auto_sync_plan(&resolution.repo_root) {
        sync_plan(&mut ledger);
    }
    save_ledger(&resolution.ledger_path, &ledger)?;

    let event = AuditEvent::new(
        Some(agent.as_str().to_string()),
        action,
        mutation.task,
        mutation.details,
    );
    if let Err(err) = append_audit_event(&resolution.repo_root, &event) {
        tracing::warn!("audit append failed: {}", err);
    }

    Ok(mutation.value)
}
