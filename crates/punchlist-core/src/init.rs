use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{load_config, write_config, ConfigError};
use crate::ledger::Ledger;
use crate::store::{
    create_ledger, default_ledger_path, hidden_ledger_path, resolve_ledger, StoreError,
};

#[derive(Debug, Error)]
pub enum InitError {
    #[error("Ledger already present at {0}")]
    AlreadyInitialized(PathBuf),
    #[error("Custom ledger path is empty")]
    EmptyPath,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Default, Clone)]
pub struct InitOptions {
    pub problem_statement: Option<String>,
    pub created_by: Option<String>,
    pub ledger: Option<String>,
    pub hidden: bool,
}

#[derive(Debug, Clone)]
pub struct InitOutcome {
    pub ledger_path: PathBuf,
    pub config_path: Option<PathBuf>,
}

/// Build the starter document for a fresh repo. Both task sections start empty.
pub fn scaffold_ledger(problem_statement: &str, created_by: &str) -> Ledger {
    let mut ledger = Ledger::default();
    ledger.problem_statement = problem_statement.trim().to_string();
    ledger.metadata.created_by = created_by.trim().to_string();
    ledger.metadata.version = "1.0".to_string();
    ledger.test_plan.test_priority = "high_first".to_string();
    ledger
}

pub fn init_at(root: &Path, options: &InitOptions) -> Result<InitOutcome, InitError> {
    if let Ok(existing) = resolve_ledger(root) {
        return Err(InitError::AlreadyInitialized(existing.ledger_path));
    }

    let created_by = options
        .created_by
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("main_agent");
    let problem = options.problem_statement.as_deref().unwrap_or("");
    let ledger = scaffold_ledger(problem, created_by);

    if let Some(custom) = options.ledger.as_deref() {
        let custom = custom.trim();
        if custom.is_empty() {
            return Err(InitError::EmptyPath);
        }
        let target = {
            let candidate = PathBuf::from(custom);
            if candidate.is_absolute() {
                candidate
            } else {
                root.join(candidate)
            }
        };
        create_ledger(&target, &ledger)?;
        let mut config = load_config(root).unwrap_or_default();
        config.ledger_path = Some(custom.to_string());
        let config_path = write_config(root, &config)?;
        return Ok(InitOutcome {
            ledger_path: target,
            config_path: Some(config_path),
        });
    }

    let target = if options.hidden {
        hidden_ledger_path(root)
    } else {
        default_ledger_path(root)
    };
    create_ledger(&target, &ledger)?;
    Ok(InitOutcome {
        ledger_path: target,
        config_path: None,
    })
}
