use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::{find_config_root, load_config, PunchlistConfig};
use crate::ledger::{parse_ledger, render_ledger, Ledger, LedgerError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No ledger document found under {0}")]
    NotFound(PathBuf),
    #[error("Ledger already exists at {0}")]
    AlreadyExists(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Document(#[from] LedgerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerLayout {
    /// `punchlist.yaml` (or `.yml`) at the repo root.
    RootFile,
    /// `.punchlist/ledger.yaml`.
    Hidden,
    /// A path picked via config or an explicit file argument.
    Custom,
}

#[derive(Debug, Clone)]
pub struct LedgerResolution {
    pub ledger_path: PathBuf,
    pub layout: LedgerLayout,
    pub repo_root: PathBuf,
    pub config: Option<PunchlistConfig>,
}

pub fn ledger_filename_candidates() -> [&'static str; 2] {
    ["punchlist.yaml", "punchlist.yml"]
}

pub fn default_ledger_path(repo_root: &Path) -> PathBuf {
    repo_root.join("punchlist.yaml")
}

pub fn hidden_ledger_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".punchlist").join("ledger.yaml")
}

/// Sidecar directory for derived state (audit log) next to the ledger.
pub fn state_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(".punchlist")
}

pub fn resolve_ledger_path(root: &Path) -> Result<PathBuf, StoreError> {
    Ok(resolve_ledger(root)?.ledger_path)
}

pub fn resolve_ledger(root: &Path) -> Result<LedgerResolution, StoreError> {
    // --root may point at the document itself rather than its directory.
    if root.is_file() {
        let repo_root = repo_root_for_file(root);
        let config_root = find_config_root(&repo_root).unwrap_or_else(|| repo_root.clone());
        let config = load_config(&config_root);
        return Ok(LedgerResolution {
            ledger_path: root.to_path_buf(),
            layout: layout_for_file(root),
            repo_root,
            config,
        });
    }

    let config_root = find_config_root(root).unwrap_or_else(|| root.to_path_buf());
    let config = load_config(&config_root);

    if let Some(resolution) = resolve_from_config(&config_root, config.as_ref()) {
        return Ok(resolution);
    }
    if let Some(resolution) = resolve_default_files(&config_root, config.as_ref()) {
        return Ok(resolution);
    }

    Err(StoreError::NotFound(root.to_path_buf()))
}

/// Walks ancestors of `start` until a ledger document turns up.
pub fn locate_ledger(start: &Path) -> Result<PathBuf, StoreError> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    if let Some(config_root) = find_config_root(&start) {
        if let Ok(resolution) = resolve_ledger(&config_root) {
            return Ok(resolution.ledger_path);
        }
    }
    for candidate in start.ancestors() {
        for name in ledger_filename_candidates() {
            let path = candidate.join(name);
            if path.is_file() {
                return Ok(path);
            }
        }
        let hidden = hidden_ledger_path(candidate);
        if hidden.is_file() {
            return Ok(hidden);
        }
    }
    Err(StoreError::NotFound(start))
}

fn resolve_from_config(
    repo_root: &Path,
    config: Option<&PunchlistConfig>,
) -> Option<LedgerResolution> {
    let ledger_path = config
        .and_then(|cfg| cfg.ledger_path.as_deref())
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())?;
    let candidate = repo_root.join(ledger_path);
    if candidate.is_file() {
        return Some(LedgerResolution {
            layout: layout_for_file(&candidate),
            ledger_path: candidate,
            repo_root: repo_root.to_path_buf(),
            config: config.cloned(),
        });
    }
    None
}

fn resolve_default_files(
    repo_root: &Path,
    config: Option<&PunchlistConfig>,
) -> Option<LedgerResolution> {
    for name in ledger_filename_candidates() {
        let candidate = repo_root.join(name);
        if candidate.is_file() {
            return Some(LedgerResolution {
                ledger_path: candidate,
                layout: LedgerLayout::RootFile,
                repo_root: repo_root.to_path_buf(),
                config: config.cloned(),
            });
        }
    }
    let hidden = hidden_ledger_path(repo_root);
    if hidden.is_file() {
        return Some(LedgerResolution {
            ledger_path: hidden,
            layout: LedgerLayout::Hidden,
            repo_root: repo_root.to_path_buf(),
            config: config.cloned(),
        });
    }
    None
}

fn repo_root_for_file(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(path);
    if is_named(parent, ".punchlist") {
        return parent.parent().unwrap_or(parent).to_path_buf();
    }
    parent.to_path_buf()
}

fn layout_for_file(path: &Path) -> LedgerLayout {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    if ledger_filename_candidates().contains(&file_name.as_str()) {
        return LedgerLayout::RootFile;
    }
    if path
        .parent()
        .map(|parent| is_named(parent, ".punchlist"))
        .unwrap_or(false)
    {
        return LedgerLayout::Hidden;
    }
    LedgerLayout::Custom
}

fn is_named(path: &Path, name: &str) -> bool {
    path.file_name()
        .map(|segment| segment.to_string_lossy().eq_ignore_ascii_case(name))
        .unwrap_or(false)
}

pub fn load_ledger(path: &Path) -> Result<Ledger, StoreError> {
    let text = fs::read_to_string(path)?;
    Ok(parse_ledger(&text)?)
}

pub fn save_ledger(path: &Path, ledger: &Ledger) -> Result<(), StoreError> {
    let text = render_ledger(ledger)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, text)?;
    Ok(())
}

/// Like `save_ledger` but refuses to clobber an existing document.
pub fn create_ledger(path: &Path, ledger: &Ledger) -> Result<(), StoreError> {
    if path.exists() {
        return Err(StoreError::AlreadyExists(path.to_path_buf()));
    }
    save_ledger(path, ledger)
}

pub fn ledger_digest(path: &Path) -> Result<String, std::io::Error> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    Ok(format!("{:x}", digest))
}
