use std::collections::HashSet;

use serde::Serialize;

use crate::ledger::{Ledger, Section, TaskRecord, TriState};
use crate::plan::check_plan;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Structural review of a loaded document. Errors make the document unfit for
/// further appends; warnings record the messy-but-legal states a long-lived
/// ledger accumulates (duplicates are reported, never removed).
pub fn validate_ledger(ledger: &Ledger) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for section in [Section::Backend, Section::Frontend] {
        let records = ledger.section(section);
        for (idx, record) in records.iter().enumerate() {
            if record.task.trim().is_empty() {
                errors.push(format!("{} task {} has an empty name", section.key(), idx + 1));
            }
        }

        let names: Vec<String> = records
            .iter()
            .filter(|record| !record.task.trim().is_empty())
            .map(|record| record.task.trim().to_lowercase())
            .collect();
        let mut duplicates = HashSet::new();
        for name in &names {
            if names.iter().filter(|other| *other == name).count() > 1 {
                duplicates.insert(name.clone());
            }
        }
        let mut dup_list: Vec<String> = duplicates.into_iter().collect();
        dup_list.sort();
        for dup in dup_list {
            warnings.push(format!("Duplicate task name in {}: {}", section.key(), dup));
        }
    }

    let backend_names: HashSet<String> = ledger
        .backend
        .iter()
        .map(|record| record.task.trim().to_lowercase())
        .collect();
    let mut cross: Vec<String> = ledger
        .frontend
        .iter()
        .map(|record| record.task.trim().to_lowercase())
        .filter(|name| backend_names.contains(name))
        .collect();
    cross.sort();
    cross.dedup();
    for name in cross {
        warnings.push(format!(
            "Task name appears in both sections, qualify lookups with section/: {}",
            name
        ));
    }

    for (key, _) in &ledger.extra {
        warnings.push(format!("Unknown top-level key: {}", key));
    }

    for (section, record) in ledger.records() {
        if let Some(last) = record.status_history.last() {
            if last.working != record.working {
                warnings.push(format!(
                    "{}/{}: working does not match the latest status entry",
                    section.key(),
                    record.task
                ));
            }
        }
        if record.stuck_count > 0 && !has_recurrence_evidence(record) {
            warnings.push(format!(
                "{}/{}: stuck_count {} without recurrence evidence in history",
                section.key(),
                record.task,
                record.stuck_count
            ));
        }
    }

    let plan_check = check_plan(ledger);
    for missing in &plan_check.missing_focus {
        warnings.push(format!(
            "{} needs retesting but is not covered by test_plan.current_focus",
            missing
        ));
    }
    for unknown in &plan_check.unknown_focus {
        warnings.push(format!("test_plan.current_focus entry matches no task: {}", unknown));
    }

    let live_stuck: HashSet<String> = ledger
        .records()
        .filter(|(_, record)| record.stuck_count > 0)
        .map(|(_, record)| record.task.trim().to_string())
        .collect();
    for entry in &ledger.test_plan.stuck_tasks {
        if !live_stuck.contains(entry.trim()) {
            warnings.push(format!(
                "test_plan.stuck_tasks entry matches no stuck record: {}",
                entry
            ));
        }
    }

    ValidationReport {
        ok: errors.is_empty(),
        errors,
        warnings,
    }
}

/// A positive stuck count should be backed by two `false` entries from
/// different agents, or two `false` entries separated by a `true` one.
fn has_recurrence_evidence(record: &TaskRecord) -> bool {
    let mut failure_agents = HashSet::new();
    let mut saw_failure = false;
    let mut fixed_since_failure = false;
    let mut separated = false;
    for entry in &record.status_history {
        match entry.working {
            TriState::No => {
                if saw_failure && fixed_since_failure {
                    separated = true;
                }
                failure_agents.insert(entry.agent);
                saw_failure = true;
                fixed_since_failure = false;
            }
            TriState::Yes => {
                if saw_failure {
                    fixed_since_failure = true;
                }
            }
            TriState::Na => {}
        }
    }
    failure_agents.len() >= 2 || separated
}
