use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::Agent;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PunchlistConfig {
    /// Ledger document path relative to the config root, for layouts that
    /// keep it somewhere non-standard.
    pub ledger_path: Option<String>,
    /// Agent identity assumed when a command does not pass one.
    pub default_agent: Option<String>,
    /// Run the plan sync after every mutating command.
    /// true = focus/stuck lists follow record changes automatically.
    pub auto_sync_plan: Option<bool>,
}

pub fn config_filename_candidates() -> [&'static str; 2] {
    [".punchlist.toml", ".punchlistrc"]
}

pub fn config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".punchlist.toml")
}

pub fn resolve_user_home_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    if let Ok(profile) = std::env::var("USERPROFILE") {
        let trimmed = profile.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    None
}

pub fn resolve_punchlist_home_dir() -> Option<PathBuf> {
    if let Ok(value) = std::env::var("PUNCHLIST_HOME") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    resolve_user_home_dir().map(|home| home.join(".punchlist"))
}

pub fn global_config_path() -> Option<PathBuf> {
    resolve_punchlist_home_dir().map(|home| home.join("config.toml"))
}

pub fn find_config_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    for candidate in start.ancestors() {
        for name in config_filename_candidates() {
            if candidate.join(name).is_file() {
                return Some(candidate.to_path_buf());
            }
        }
    }
    None
}

pub fn load_config(repo_root: &Path) -> Option<PunchlistConfig> {
    for name in config_filename_candidates() {
        let path = repo_root.join(name);
        if path.is_file() {
            if let Ok(text) = fs::read_to_string(&path) {
                if let Ok(config) = toml::from_str::<PunchlistConfig>(&text) {
                    return Some(config);
                }
            }
        }
    }
    None
}

pub fn load_global_config() -> Option<PunchlistConfig> {
    let path = global_config_path()?;
    if !path.is_file() {
        return None;
    }
    let text = fs::read_to_string(path).ok()?;
    toml::from_str::<PunchlistConfig>(&text).ok()
}

/// Project config wins over global config; unparseable agent names are
/// ignored rather than failing the command.
pub fn resolve_default_agent_with_source(repo_root: &Path) -> (Agent, &'static str) {
    if let Some(agent) = load_config(repo_root)
        .and_then(|config| config.default_agent)
        .as_deref()
        .and_then(Agent::parse)
    {
        return (agent, "project");
    }
    if let Some(agent) = load_global_config()
        .and_then(|config| config.default_agent)
        .as_deref()
        .and_then(Agent::parse)
    {
        return (agent, "global");
    }
    (Agent::Main, "default")
}

pub fn resolve_default_agent(repo_root: &Path) -> Agent {
    resolve_default_agent_with_source(repo_root).0
}

pub fn resolve_auto_sync_plan_with_source(repo_root: &Path) -> (bool, &'static str) {
    if let Some(value) = load_config(repo_root).and_then(|config| config.auto_sync_plan) {
        return (value, "project");
    }
    if let Some(value) = load_global_config().and_then(|config| config.auto_sync_plan) {
        return (value, "global");
    }
    (false, "default")
}

pub fn resolve_auto_sync_plan(repo_root: &Path) -> bool {
    resolve_auto_sync_plan_with_source(repo_root).0
}

pub fn write_config(repo_root: &Path, config: &PunchlistConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path(repo_root);
    let body = toml::to_string_pretty(config)?;
    fs::write(&path, body)?;
    Ok(path)
}
