use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use ulid::Ulid;

use crate::store::state_dir;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to write audit log: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize audit event: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: String,
    pub actor: Option<String>,
    pub action: String,
    pub task: Option<String>,
    pub details: Value,
}

impl AuditEvent {
    pub fn new(actor: Option<String>, action: &str, task: Option<String>, details: Value) -> Self {
        Self {
            event_id: Ulid::new().to_string().to_lowercase(),
            timestamp: Utc::now().to_rfc3339(),
            actor,
            action: action.to_string(),
            task,
            details,
        }
    }
}

pub fn audit_log_path(repo_root: &Path) -> PathBuf {
    state_dir(repo_root).join("audit.log")
}

pub fn append_audit_event(repo_root: &Path, event: &AuditEvent) -> Result<(), AuditError> {
    let path = audit_log_path(repo_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(event)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// Last `limit` events, oldest first. Malformed lines are skipped so one bad
/// write never hides the rest of the log.
pub fn read_recent_audit_events(repo_root: &Path, limit: usize) -> Vec<AuditEvent> {
    let path = audit_log_path(repo_root);
    let Ok(text) = fs::read_to_string(&path) else {
        return Vec::new();
    };
    let mut events: Vec<AuditEvent> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();
    if events.len() > limit {
        events.drain(..events.len() - limit);
    }
    events
}
