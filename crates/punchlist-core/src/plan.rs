use regex::Regex;

use crate::ledger::{Ledger, Section, TestPlan};

/// Ordered focus list for the next verification pass.
pub fn focus(ledger: &Ledger) -> &[String] {
    &ledger.test_plan.current_focus
}

/// Replaces the focus list. Entries are trimmed and deduplicated in first-seen
/// order; empties are dropped. Returns the resulting length.
pub fn set_focus(ledger: &mut Ledger, entries: Vec<String>) -> usize {
    ledger.test_plan.current_focus = dedup_preserve_order(entries);
    ledger.test_plan.current_focus.len()
}

/// Adds one focus entry if no existing entry already covers it.
pub fn add_focus(ledger: &mut Ledger, entry: &str) -> bool {
    let entry = entry.trim();
    if entry.is_empty() {
        return false;
    }
    let already = ledger
        .test_plan
        .current_focus
        .iter()
        .any(|existing| existing.trim().eq_ignore_ascii_case(entry));
    if already {
        return false;
    }
    ledger.test_plan.current_focus.push(entry.to_string());
    true
}

pub fn clear_focus(ledger: &mut Ledger) -> usize {
    let removed = ledger.test_plan.current_focus.len();
    ledger.test_plan.current_focus.clear();
    removed
}

pub(crate) fn note_stuck(plan: &mut TestPlan, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        return;
    }
    if !plan.stuck_tasks.iter().any(|existing| existing.trim() == name) {
        plan.stuck_tasks.push(name.to_string());
    }
}

pub(crate) fn drop_stuck(plan: &mut TestPlan, name: &str) {
    let name = name.trim();
    plan.stuck_tasks.retain(|existing| existing.trim() != name);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSync {
    pub added_focus: Vec<String>,
    pub added_stuck: Vec<String>,
    pub removed_stuck: Vec<String>,
}

/// Brings the test plan in line with the records.
///
/// Rules (conservative, deterministic):
/// - every task with `needs_retesting=true` gains a focus entry if none of
///   the existing entries already covers it; entries are never removed here,
///   the focus list stays operator-owned;
/// - `stuck_tasks` is fully derived: tasks with a positive count are added,
///   entries matching no such task are dropped.
pub fn sync_plan(ledger: &mut Ledger) -> PlanSync {
    let mut report = PlanSync::default();

    let retest_names: Vec<(Section, String)> = ledger
        .records()
        .filter(|(_, record)| record.needs_retesting)
        .map(|(section, record)| (section, record.task.clone()))
        .collect();
    for (section, name) in retest_names {
        let covered = ledger
            .test_plan
            .current_focus
            .iter()
            .any(|entry| focus_entry_matches(entry, section, &name));
        if !covered {
            ledger.test_plan.current_focus.push(name.clone());
            report.added_focus.push(name);
        }
    }

    let stuck_names: Vec<String> = ledger
        .records()
        .filter(|(_, record)| record.stuck_count > 0)
        .map(|(_, record)| record.task.clone())
        .collect();
    for name in &stuck_names {
        if !ledger
            .test_plan
            .stuck_tasks
            .iter()
            .any(|existing| existing.trim() == name)
        {
            ledger.test_plan.stuck_tasks.push(name.clone());
            report.added_stuck.push(name.clone());
        }
    }
    let stale: Vec<String> = ledger
        .test_plan
        .stuck_tasks
        .iter()
        .filter(|existing| !stuck_names.iter().any(|name| name == existing.trim()))
        .cloned()
        .collect();
    ledger
        .test_plan
        .stuck_tasks
        .retain(|existing| stuck_names.iter().any(|name| name == existing.trim()));
    report.removed_stuck = stale;

    report
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanCheck {
    pub ok: bool,
    /// Tasks flagged `needs_retesting` that no focus entry covers, as
    /// `section/name`. A test pass is not valid while this is non-empty.
    pub missing_focus: Vec<String>,
    /// Focus entries that match no live record. Informational only.
    pub unknown_focus: Vec<String>,
}

/// The run-tests gate: every task awaiting a retest must be covered by the
/// focus list before a verification pass counts. Read-only.
pub fn check_plan(ledger: &Ledger) -> PlanCheck {
    let mut check = PlanCheck {
        ok: true,
        ..PlanCheck::default()
    };

    for (section, record) in ledger.records() {
        if !record.needs_retesting {
            continue;
        }
        let covered = ledger
            .test_plan
            .current_focus
            .iter()
            .any(|entry| focus_entry_matches(entry, section, &record.task));
        if !covered {
            check
                .missing_focus
                .push(format!("{}/{}", section.key(), record.task));
        }
    }

    for entry in &ledger.test_plan.current_focus {
        let matches_any = ledger
            .records()
            .any(|(section, record)| focus_entry_matches(entry, section, &record.task));
        if !matches_any {
            check.unknown_focus.push(entry.clone());
        }
    }

    check.ok = check.missing_focus.is_empty();
    check
}

/// Focus entries are free text; accept the plain name, a `section/name`
/// qualifier, or the `Backend: name` prefix style seen in hand-edited plans.
pub fn focus_entry_matches(entry: &str, section: Section, name: &str) -> bool {
    let entry = entry.trim();
    let name = name.trim();
    if entry.eq_ignore_ascii_case(name) {
        return true;
    }
    if let Some((prefix, rest)) = entry.split_once('/') {
        if let Some(entry_section) = Section::parse(prefix) {
            return entry_section == section && rest.trim().eq_ignore_ascii_case(name);
        }
    }
    let prefixed = Regex::new(r"(?i)^(backend|frontend)\s*:\s*(.+)$").expect("regex");
    if let Some(caps) = prefixed.captures(entry) {
        let entry_section = Section::parse(&caps[1]);
        return entry_section == Some(section) && caps[2].trim().eq_ignore_ascii_case(name);
    }
    false
}

fn dedup_preserve_order(entries: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for entry in entries {
        let trimmed = entry.trim().to_string();
        if trimmed.is_empty() {
            continue;
        }
        if !seen.iter().any(|existing| existing.eq_ignore_ascii_case(&trimmed)) {
            seen.push(trimmed);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Agent, Priority, TriState};
    use crate::ops::{append_status, create_task, mark_retest, TaskSelector};
    use pretty_assertions::assert_eq;

    fn ledger_with(names: &[(&str, Section)]) -> Ledger {
        let mut ledger = Ledger::default();
        for (name, section) in names {
            create_task(&mut ledger, *section, name, "", Priority::Medium).expect("create");
        }
        ledger
    }

    #[test]
    fn set_focus_dedups_and_trims() {
        let mut ledger = Ledger::default();
        let len = set_focus(
            &mut ledger,
            vec![
                "  CSV Import ".to_string(),
                "csv import".to_string(),
                "".to_string(),
                "Request Form".to_string(),
            ],
        );
        assert_eq!(len, 2);
        assert_eq!(
            ledger.test_plan.current_focus,
            vec!["CSV Import".to_string(), "Request Form".to_string()]
        );
    }

    #[test]
    fn add_focus_skips_covered_entries() {
        let mut ledger = Ledger::default();
        assert!(add_focus(&mut ledger, "Auth API"));
        assert!(!add_focus(&mut ledger, "auth api"));
        assert!(!add_focus(&mut ledger, "   "));
        assert_eq!(ledger.test_plan.current_focus.len(), 1);
    }

    #[test]
    fn entry_matching_accepts_known_spellings() {
        assert!(focus_entry_matches("Auth API", Section::Backend, "Auth API"));
        assert!(focus_entry_matches("backend/Auth API", Section::Backend, "Auth API"));
        assert!(focus_entry_matches("Backend: Auth API", Section::Backend, "Auth API"));
        assert!(focus_entry_matches("FRONTEND: request form", Section::Frontend, "Request Form"));
        assert!(!focus_entry_matches("frontend/Auth API", Section::Backend, "Auth API"));
        assert!(!focus_entry_matches("Backend: Other", Section::Backend, "Auth API"));
    }

    #[test]
    fn check_fails_until_retest_tasks_are_focused() {
        let mut ledger = ledger_with(&[("CSV Import", Section::Backend)]);
        mark_retest(&mut ledger, &TaskSelector::parse("CSV Import").expect("sel"))
            .expect("retest");

        let check = check_plan(&ledger);
        assert!(!check.ok);
        assert_eq!(check.missing_focus, vec!["backend/CSV Import".to_string()]);

        add_focus(&mut ledger, "Backend: CSV Import");
        let check = check_plan(&ledger);
        assert!(check.ok);
        assert!(check.missing_focus.is_empty());
    }

    #[test]
    fn check_reports_unknown_focus_entries_without_failing() {
        let mut ledger = ledger_with(&[("Auth API", Section::Backend)]);
        add_focus(&mut ledger, "Retired Feature");
        let check = check_plan(&ledger);
        assert!(check.ok);
        assert_eq!(check.unknown_focus, vec!["Retired Feature".to_string()]);
    }

    #[test]
    fn sync_adds_retest_focus_and_reconciles_stuck() {
        let mut ledger = ledger_with(&[
            ("Auth API", Section::Backend),
            ("Request Form", Section::Frontend),
        ]);
        mark_retest(&mut ledger, &TaskSelector::parse("Request Form").expect("sel"))
            .expect("retest");
        ledger.test_plan.stuck_tasks.push("Ghost".to_string());

        let report = sync_plan(&mut ledger);
        assert_eq!(report.added_focus, vec!["Request Form".to_string()]);
        assert_eq!(report.removed_stuck, vec!["Ghost".to_string()]);
        assert!(ledger.test_plan.stuck_tasks.is_empty());
        assert!(check_plan(&ledger).ok);

        // Running sync again is a no-op.
        let report = sync_plan(&mut ledger);
        assert_eq!(report, PlanSync::default());
    }

    #[test]
    fn sync_tracks_positive_stuck_counts() {
        let mut ledger = ledger_with(&[("Upload", Section::Backend)]);
        let sel = TaskSelector::parse("Upload").expect("sel");
        append_status(&mut ledger, &sel, TriState::Yes, Agent::Main, "done").expect("claim");
        append_status(&mut ledger, &sel, TriState::No, Agent::User, "broke").expect("regress");
        ledger.test_plan.stuck_tasks.clear();

        let report = sync_plan(&mut ledger);
        assert_eq!(report.added_stuck, vec!["Upload".to_string()]);
        assert_eq!(ledger.test_plan.stuck_tasks, vec!["Upload".to_string()]);
    }

    #[test]
    fn clear_reports_removed_count() {
        let mut ledger = Ledger::default();
        add_focus(&mut ledger, "A");
        add_focus(&mut ledger, "B");
        assert_eq!(clear_focus(&mut ledger), 2);
        assert!(ledger.test_plan.current_focus.is_empty());
    }
}
