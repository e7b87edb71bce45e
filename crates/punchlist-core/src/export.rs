use serde_json::{Map, Value};

use crate::ledger::{CommEntry, Ledger, Section, StatusEntry, TaskRecord};

fn yaml_extra_to_json(extra: &[(String, serde_yaml::Value)]) -> Value {
    let mut map = Map::new();
    for (key, value) in extra {
        map.insert(
            key.clone(),
            serde_json::to_value(value).unwrap_or(Value::Null),
        );
    }
    Value::Object(map)
}

fn status_entry_to_json(entry: &StatusEntry) -> Value {
    let mut map = Map::new();
    map.insert("working".to_string(), entry.working.as_json());
    map.insert(
        "agent".to_string(),
        Value::String(entry.agent.as_str().to_string()),
    );
    map.insert("comment".to_string(), Value::String(entry.comment.clone()));
    Value::Object(map)
}

/// Build an ordered JSON object for one task. Field order mirrors the ledger document.
pub fn task_to_json_value(section: Section, record: &TaskRecord) -> Value {
    let mut map = Map::new();
    map.insert(
        "section".to_string(),
        Value::String(section.key().to_string()),
    );
    map.insert("task".to_string(), Value::String(record.task.clone()));
    map.insert("implemented".to_string(), record.implemented.as_json());
    map.insert("working".to_string(), record.working.as_json());
    map.insert("file".to_string(), Value::String(record.file.clone()));
    map.insert(
        "stuck_count".to_string(),
        Value::Number(record.stuck_count.into()),
    );
    map.insert(
        "priority".to_string(),
        Value::String(record.priority.as_str().to_string()),
    );
    map.insert(
        "needs_retesting".to_string(),
        Value::Bool(record.needs_retesting),
    );
    map.insert(
        "status_history".to_string(),
        Value::Array(record.status_history.iter().map(status_entry_to_json).collect()),
    );
    if !record.extra.is_empty() {
        map.insert("extra".to_string(), yaml_extra_to_json(&record.extra));
    }
    Value::Object(map)
}

fn comm_entry_to_json(entry: &CommEntry) -> Value {
    let mut map = Map::new();
    map.insert(
        "agent".to_string(),
        Value::String(entry.agent.as_str().to_string()),
    );
    map.insert("message".to_string(), Value::String(entry.message.clone()));
    Value::Object(map)
}

/// Convert the whole ledger to JSON, keeping the document's section order.
pub fn ledger_to_json(ledger: &Ledger) -> Value {
    let mut map = Map::new();
    map.insert(
        "user_problem_statement".to_string(),
        Value::String(ledger.problem_statement.clone()),
    );
    map.insert(
        "backend".to_string(),
        Value::Array(
            ledger
                .backend
                .iter()
                .map(|record| task_to_json_value(Section::Backend, record))
                .collect(),
        ),
    );
    map.insert(
        "frontend".to_string(),
        Value::Array(
            ledger
                .frontend
                .iter()
                .map(|record| task_to_json_value(Section::Frontend, record))
                .collect(),
        ),
    );
    let mut metadata = Map::new();
    metadata.insert(
        "created_by".to_string(),
        Value::String(ledger.metadata.created_by.clone()),
    );
    metadata.insert(
        "version".to_string(),
        Value::String(ledger.metadata.version.clone()),
    );
    metadata.insert(
        "test_sequence_number".to_string(),
        Value::Number(ledger.metadata.test_sequence.into()),
    );
    metadata.insert("run_ui".to_string(), Value::Bool(ledger.metadata.run_ui));
    if !ledger.metadata.extra.is_empty() {
        metadata.insert("extra".to_string(), yaml_extra_to_json(&ledger.metadata.extra));
    }
    map.insert("metadata".to_string(), Value::Object(metadata));
    let mut plan = Map::new();
    plan.insert(
        "current_focus".to_string(),
        Value::Array(
            ledger
                .test_plan
                .current_focus
                .iter()
                .map(|entry| Value::String(entry.clone()))
                .collect(),
        ),
    );
    plan.insert(
        "stuck_tasks".to_string(),
        Value::Array(
            ledger
                .test_plan
                .stuck_tasks
                .iter()
                .map(|entry| Value::String(entry.clone()))
                .collect(),
        ),
    );
    plan.insert("test_all".to_string(), Value::Bool(ledger.test_plan.test_all));
    plan.insert(
        "test_priority".to_string(),
        Value::String(ledger.test_plan.test_priority.clone()),
    );
    if !ledger.test_plan.extra.is_empty() {
        plan.insert("extra".to_string(), yaml_extra_to_json(&ledger.test_plan.extra));
    }
    map.insert("test_plan".to_string(), Value::Object(plan));
    map.insert(
        "agent_communication".to_string(),
        Value::Array(ledger.agent_communication.iter().map(comm_entry_to_json).collect()),
    );
    Value::Object(map)
}

pub fn export_json(ledger: &Ledger) -> String {
    serde_json::to_string_pretty(&ledger_to_json(ledger)).unwrap_or_else(|_| "{}".to_string())
}

/// One compact JSON object per task, one per line. Suited to grep and jq pipelines.
pub fn export_tasks_jsonl(ledger: &Ledger) -> String {
    let mut out = String::new();
    for (section, record) in ledger.records() {
        let value = task_to_json_value(section, record);
        let line = serde_json::to_string(&value).unwrap_or_else(|_| "{}".to_string());
        out.push_str(&line);
        out.push('\n');
    }
    out
}
