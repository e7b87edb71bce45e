use std::fs;
use std::path::Path;

use serde_json::json;

use crate::audit::audit_log_path;
use crate::config::{
    config_filename_candidates, find_config_root, global_config_path, load_global_config,
    resolve_auto_sync_plan_with_source, resolve_default_agent_with_source,
    resolve_punchlist_home_dir,
};
use crate::ops::{summarize, SectionCounts};
use crate::store::{ledger_digest, load_ledger, resolve_ledger, LedgerLayout};
use crate::validate::validate_ledger;

fn layout_name(layout: LedgerLayout) -> &'static str {
    match layout {
        LedgerLayout::RootFile => "root-file",
        LedgerLayout::Hidden => ".punchlist",
        LedgerLayout::Custom => "custom",
    }
}

fn best_effort_other_binary_version(binary_name: &str) -> Option<String> {
    let which = which::which(binary_name).ok()?;
    let output = std::process::Command::new(which)
        .arg("--version")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if raw.is_empty() {
        None
    } else {
        Some(raw)
    }
}

fn count_lines(path: &Path) -> Option<usize> {
    let text = fs::read_to_string(path).ok()?;
    Some(text.lines().count())
}

fn counts_json(counts: &SectionCounts) -> serde_json::Value {
    json!({
        "total": counts.total,
        "working": counts.working,
        "broken": counts.broken,
        "untested": counts.untested,
        "needs_retesting": counts.needs_retesting,
        "stuck": counts.stuck,
    })
}

/// Return a machine-readable diagnostics report for a punchlist repo.
///
/// This is meant to be human-friendly when pretty-printed, but also stable enough for agents.
pub fn doctor_report(root: &Path, running_binary: &str) -> serde_json::Value {
    let root = root.to_path_buf();
    let resolution = resolve_ledger(&root).ok();

    let (repo_root, ledger_path, layout) = if let Some(res) = resolution.as_ref() {
        (
            res.repo_root.clone(),
            Some(res.ledger_path.clone()),
            layout_name(res.layout).to_string(),
        )
    } else {
        (root.clone(), None, "unresolved".to_string())
    };

    let config_root = find_config_root(&root).or_else(|| find_config_root(&repo_root));
    let config_files = config_root.as_ref().map(|dir| {
        config_filename_candidates()
            .iter()
            .map(|name| {
                let path = dir.join(name);
                json!({
                    "name": name,
                    "path": path.to_string_lossy().to_string(),
                    "exists": path.exists(),
                })
            })
            .collect::<Vec<_>>()
    });
    let global_config = {
        let path = global_config_path();
        let loaded = load_global_config();
        let home = resolve_punchlist_home_dir();
        json!({
            "home": home.as_ref().map(|p| p.to_string_lossy().to_string()),
            "path": path.as_ref().map(|p| p.to_string_lossy().to_string()),
            "present": path.as_ref().map(|p| p.exists()).unwrap_or(false),
            "loaded": loaded,
        })
    };
    let (default_agent, default_agent_source) = resolve_default_agent_with_source(&repo_root);
    let (auto_sync, auto_sync_source) = resolve_auto_sync_plan_with_source(&repo_root);

    let document = match ledger_path.as_ref() {
        Some(path) => {
            let loaded = load_ledger(path);
            match loaded {
                Ok(ledger) => {
                    let validation = validate_ledger(&ledger);
                    let sections: Vec<serde_json::Value> = summarize(&ledger)
                        .iter()
                        .map(|(name, counts)| json!({"section": name, "counts": counts_json(counts)}))
                        .collect();
                    let history_entries: usize = ledger
                        .records()
                        .map(|(_, record)| record.status_history.len())
                        .sum();
                    json!({
                        "path": path.to_string_lossy().to_string(),
                        "present": true,
                        "parsed": true,
                        "digest": ledger_digest(path).ok(),
                        "lines": count_lines(path),
                        "sections": sections,
                        "history_entries": history_entries,
                        "focus_entries": ledger.test_plan.current_focus.len(),
                        "communication_entries": ledger.agent_communication.len(),
                        "validation": {
                            "ok": validation.ok,
                            "errors": validation.errors.len(),
                            "warnings": validation.warnings.len(),
                        },
                    })
                }
                Err(err) => json!({
                    "path": path.to_string_lossy().to_string(),
                    "present": path.exists(),
                    "parsed": false,
                    "error": err.to_string(),
                }),
            }
        }
        None => json!({
            "present": false,
            "parsed": false,
        }),
    };

    let audit = {
        let path = audit_log_path(&repo_root);
        json!({
            "path": path.to_string_lossy().to_string(),
            "present": path.exists(),
            "entries": if path.exists() { count_lines(&path) } else { None },
        })
    };

    let versions = match running_binary {
        "punchlist" => json!({
            "punchlist": env!("CARGO_PKG_VERSION"),
            "punchlist_mcp": best_effort_other_binary_version("punchlist-mcp"),
        }),
        "punchlist-mcp" => json!({
            "punchlist_mcp": env!("CARGO_PKG_VERSION"),
            "punchlist": best_effort_other_binary_version("punchlist"),
        }),
        _ => json!({
            "running": env!("CARGO_PKG_VERSION"),
        }),
    };

    json!({
        "root": root.to_string_lossy().to_string(),
        "repo_root": repo_root.to_string_lossy().to_string(),
        "layout": layout,
        "config": {
            "root": config_root.as_ref().map(|p| p.to_string_lossy().to_string()),
            "files": config_files,
            "global": global_config,
            "effective": {
                "default_agent": default_agent.as_str(),
                "default_agent_source": default_agent_source,
                "auto_sync_plan": auto_sync,
                "auto_sync_plan_source": auto_sync_source,
                "precedence": "project > global > default"
            }
        },
        "document": document,
        "audit": audit,
        "versions": versions,
        "notes": [
            "The ledger document is the single source of record, status history is append-only.",
            "The audit log under .punchlist/ is derived state and safe to truncate.",
            "stuck_count resets only through a testing-agent confirmation entry.",
            "Tasks flagged needs_retesting belong in test_plan.current_focus before the next pass."
        ],
    })
}
