use thiserror::Error;

use crate::ledger::{
    Agent, CommEntry, Ledger, Priority, Section, StatusEntry, TaskRecord, TriState,
};
use crate::plan;

#[derive(Debug, Error)]
pub enum OpError {
    #[error("Task not found: {0}")]
    NotFound(String),
    #[error("Task name {0:?} is ambiguous, candidates: {1}")]
    Ambiguous(String, String),
    #[error("Task {0:?} already exists in {1}")]
    Duplicate(String, String),
    #[error("Invalid operation: {0}")]
    Invalid(String),
}

/// Task address: a bare name, or `section/name` when the name alone is not
/// unique across the document.
#[derive(Debug, Clone)]
pub struct TaskSelector {
    pub section: Option<Section>,
    pub name: String,
}

impl TaskSelector {
    pub fn parse(raw: &str) -> Result<Self, OpError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(OpError::Invalid("task selector must not be empty".to_string()));
        }
        if let Some((prefix, rest)) = trimmed.split_once('/') {
            if let Some(section) = Section::parse(prefix) {
                let name = rest.trim();
                if name.is_empty() {
                    return Err(OpError::Invalid(format!(
                        "task selector {:?} names a section but no task",
                        trimmed
                    )));
                }
                return Ok(Self {
                    section: Some(section),
                    name: name.to_string(),
                });
            }
        }
        Ok(Self {
            section: None,
            name: trimmed.to_string(),
        })
    }

    pub fn named(section: Option<Section>, name: &str) -> Self {
        Self {
            section,
            name: name.trim().to_string(),
        }
    }
}

fn matches_in(ledger: &Ledger, selector: &TaskSelector) -> Vec<(Section, usize)> {
    let sections: &[Section] = match selector.section {
        Some(Section::Backend) => &[Section::Backend],
        Some(Section::Frontend) => &[Section::Frontend],
        None => &[Section::Backend, Section::Frontend],
    };
    let mut exact = Vec::new();
    let mut loose = Vec::new();
    let wanted = selector.name.trim();
    let wanted_lower = wanted.to_lowercase();
    for section in sections {
        for (idx, record) in ledger.section(*section).iter().enumerate() {
            if record.task == wanted {
                exact.push((*section, idx));
            } else if record.task.to_lowercase() == wanted_lower {
                loose.push((*section, idx));
            }
        }
    }
    if exact.is_empty() {
        loose
    } else {
        exact
    }
}

/// Resolves a selector to exactly one record, or reports why it cannot.
pub fn find_task(ledger: &Ledger, selector: &TaskSelector) -> Result<(Section, usize), OpError> {
    let matches = matches_in(ledger, selector);
    match matches.len() {
        0 => Err(OpError::NotFound(selector.name.clone())),
        1 => Ok(matches[0]),
        _ => {
            let candidates: Vec<String> = matches
                .iter()
                .map(|(section, idx)| {
                    format!("{}/{}", section.key(), ledger.section(*section)[*idx].task)
                })
                .collect();
            Err(OpError::Ambiguous(selector.name.clone(), candidates.join(", ")))
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub section: Section,
    pub record: TaskRecord,
    pub stuck_incremented: bool,
    pub stuck_reset: bool,
    pub retest_cleared: bool,
}

/// Appends a status entry and syncs the record's top-level `working` field.
///
/// History is append-only: prior entries are never touched. A `false` entry
/// landing on a task whose current `working` is `true` marks a recurrence
/// after a fix claim and bumps `stuck_count`. Only a `true` entry from the
/// testing agent resets the count; any testing entry clears
/// `needs_retesting`.
pub fn append_status(
    ledger: &mut Ledger,
    selector: &TaskSelector,
    working: TriState,
    agent: Agent,
    comment: &str,
) -> Result<AppendOutcome, OpError> {
    let comment = comment.trim();
    if comment.is_empty() {
        return Err(OpError::Invalid("comment must not be empty".to_string()));
    }
    let (section, idx) = find_task(ledger, selector)?;

    let (name, stuck_incremented, stuck_reset, retest_cleared, record) = {
        let record = &mut ledger.section_mut(section)[idx];
        let previous = record.working;
        record.status_history.push(StatusEntry {
            working,
            agent,
            comment: comment.to_string(),
        });
        record.working = working;

        let stuck_incremented = working == TriState::No && previous == TriState::Yes;
        if stuck_incremented {
            record.stuck_count += 1;
        }
        let stuck_reset =
            agent == Agent::Testing && working == TriState::Yes && record.stuck_count > 0;
        if stuck_reset {
            record.stuck_count = 0;
        }
        let retest_cleared = agent == Agent::Testing && record.needs_retesting;
        if retest_cleared {
            record.needs_retesting = false;
        }
        (
            record.task.clone(),
            stuck_incremented,
            stuck_reset,
            retest_cleared,
            record.clone(),
        )
    };

    if stuck_incremented {
        plan::note_stuck(&mut ledger.test_plan, &name);
    }
    if stuck_reset {
        plan::drop_stuck(&mut ledger.test_plan, &name);
    }

    Ok(AppendOutcome {
        section,
        record,
        stuck_incremented,
        stuck_reset,
        retest_cleared,
    })
}

/// Inserts a fresh record: not yet working, nothing tested, empty history.
pub fn create_task(
    ledger: &mut Ledger,
    section: Section,
    name: &str,
    file: &str,
    priority: Priority,
) -> Result<TaskRecord, OpError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(OpError::Invalid("task name must not be empty".to_string()));
    }
    if ledger.section(section).iter().any(|record| record.task == name) {
        return Err(OpError::Duplicate(name.to_string(), section.key().to_string()));
    }
    let record = TaskRecord {
        task: name.to_string(),
        implemented: TriState::No,
        working: TriState::Na,
        file: file.trim().to_string(),
        stuck_count: 0,
        priority,
        needs_retesting: false,
        status_history: Vec::new(),
        extra: Vec::new(),
    };
    ledger.section_mut(section).push(record.clone());
    Ok(record)
}

#[derive(Debug, Clone)]
pub struct RetestOutcome {
    pub section: Section,
    pub task: String,
    pub changed: bool,
}

/// Flags a task for retesting. Already-flagged tasks are left alone.
pub fn mark_retest(ledger: &mut Ledger, selector: &TaskSelector) -> Result<RetestOutcome, OpError> {
    let (section, idx) = find_task(ledger, selector)?;
    let record = &mut ledger.section_mut(section)[idx];
    let changed = !record.needs_retesting;
    record.needs_retesting = true;
    Ok(RetestOutcome {
        section,
        task: record.task.clone(),
        changed,
    })
}

/// Marks a task implemented and queues it for verification.
pub fn mark_implemented(
    ledger: &mut Ledger,
    selector: &TaskSelector,
) -> Result<(Section, TaskRecord), OpError> {
    let (section, idx) = find_task(ledger, selector)?;
    let record = &mut ledger.section_mut(section)[idx];
    record.implemented = TriState::Yes;
    record.needs_retesting = true;
    Ok((section, record.clone()))
}

/// Manual recurrence report: an agent saw a previously fixed failure again.
pub fn increment_stuck(
    ledger: &mut Ledger,
    selector: &TaskSelector,
) -> Result<(Section, TaskRecord), OpError> {
    let (section, idx) = find_task(ledger, selector)?;
    let (name, record) = {
        let record = &mut ledger.section_mut(section)[idx];
        record.stuck_count += 1;
        (record.task.clone(), record.clone())
    };
    plan::note_stuck(&mut ledger.test_plan, &name);
    Ok((section, record))
}

/// Testing-agent confirmation that a stuck task is resolved. This is the only
/// path that resets `stuck_count`.
pub fn resolve_stuck(
    ledger: &mut Ledger,
    selector: &TaskSelector,
    comment: &str,
) -> Result<AppendOutcome, OpError> {
    append_status(ledger, selector, TriState::Yes, Agent::Testing, comment)
}

/// Appends to the inter-agent communication log.
pub fn append_message(ledger: &mut Ledger, agent: Agent, message: &str) -> Result<CommEntry, OpError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(OpError::Invalid("message must not be empty".to_string()));
    }
    let entry = CommEntry {
        agent,
        message: message.to_string(),
    };
    ledger.agent_communication.push(entry.clone());
    Ok(entry)
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub section: Option<Section>,
    pub working: Option<TriState>,
    pub priority: Option<Priority>,
    pub needs_retesting: Option<bool>,
    pub stuck_only: bool,
}

pub fn filter_tasks<'a>(ledger: &'a Ledger, filter: &TaskFilter) -> Vec<(Section, &'a TaskRecord)> {
    ledger
        .records()
        .filter(|(section, record)| {
            if let Some(wanted) = filter.section {
                if *section != wanted {
                    return false;
                }
            }
            if let Some(wanted) = filter.working {
                if record.working != wanted {
                    return false;
                }
            }
            if let Some(wanted) = filter.priority {
                if record.priority != wanted {
                    return false;
                }
            }
            if let Some(wanted) = filter.needs_retesting {
                if record.needs_retesting != wanted {
                    return false;
                }
            }
            if filter.stuck_only && record.stuck_count == 0 {
                return false;
            }
            true
        })
        .collect()
}

pub fn render_task_line(section: Section, record: &TaskRecord) -> String {
    format!(
        "{} | {} | {} | {} | stuck:{}{}",
        section.key(),
        record.task,
        record.working.as_str(),
        record.priority.as_str(),
        record.stuck_count,
        if record.needs_retesting { " | retest" } else { "" }
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionCounts {
    pub total: usize,
    pub working: usize,
    pub broken: usize,
    pub untested: usize,
    pub needs_retesting: usize,
    pub stuck: usize,
}

pub fn section_counts(records: &[TaskRecord]) -> SectionCounts {
    let mut counts = SectionCounts::default();
    for record in records {
        counts.total += 1;
        match record.working {
            TriState::Yes => counts.working += 1,
            TriState::No => counts.broken += 1,
            TriState::Na => counts.untested += 1,
        }
        if record.needs_retesting {
            counts.needs_retesting += 1;
        }
        if record.stuck_count > 0 {
            counts.stuck += 1;
        }
    }
    counts
}

pub fn summarize(ledger: &Ledger) -> Vec<(&'static str, SectionCounts)> {
    vec![
        ("backend", section_counts(&ledger.backend)),
        ("frontend", section_counts(&ledger.frontend)),
    ]
}
