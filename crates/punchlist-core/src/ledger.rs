use serde_yaml::{Mapping, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Ledger document root must be a mapping")]
    NotAMapping,
    #[error("Invalid ledger document: {0}")]
    Invalid(String),
}

/// Three-valued status: `true`, `false`, or `"NA"` (not yet exercised).
/// The distinction between `false` and `"NA"` is meaningful and must survive
/// parse/render unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriState {
    Yes,
    No,
    Na,
}

impl Default for TriState {
    fn default() -> Self {
        TriState::Na
    }
}

impl TriState {
    pub fn as_str(self) -> &'static str {
        match self {
            TriState::Yes => "true",
            TriState::No => "false",
            TriState::Na => "NA",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(Self::Yes),
            "false" | "no" => Some(Self::No),
            "na" | "n/a" => Some(Self::Na),
            _ => None,
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(Self::Yes),
            Value::Bool(false) => Some(Self::No),
            Value::Null => Some(Self::Na),
            Value::String(s) => Self::parse(s),
            _ => None,
        }
    }

    pub fn as_value(self) -> Value {
        match self {
            TriState::Yes => Value::Bool(true),
            TriState::No => Value::Bool(false),
            TriState::Na => Value::String("NA".to_string()),
        }
    }

    pub fn as_json(self) -> serde_json::Value {
        match self {
            TriState::Yes => serde_json::Value::Bool(true),
            TriState::No => serde_json::Value::Bool(false),
            TriState::Na => serde_json::Value::String("NA".to_string()),
        }
    }
}

/// Actor role: `main` implements, `testing` verifies, `user` reports
/// real-world behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Agent {
    Main,
    Testing,
    User,
}

impl Agent {
    pub fn as_str(self) -> &'static str {
        match self {
            Agent::Main => "main",
            Agent::Testing => "testing",
            Agent::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "main" | "main_agent" => Some(Self::Main),
            "testing" | "testing_agent" | "tester" => Some(Self::Testing),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Which task list a record lives in. Every record belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Backend,
    Frontend,
}

impl Section {
    pub fn key(self) -> &'static str {
        match self {
            Section::Backend => "backend",
            Section::Frontend => "frontend",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "backend" => Some(Self::Backend),
            "frontend" => Some(Self::Frontend),
            _ => None,
        }
    }
}

/// One report in a task's history. History is chronological and append-only;
/// the latest entry drives the record's top-level `working` value.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEntry {
    pub working: TriState,
    pub agent: Agent,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskRecord {
    pub task: String,
    pub implemented: TriState,
    pub working: TriState,
    pub file: String,
    pub stuck_count: u32,
    pub priority: Priority,
    pub needs_retesting: bool,
    pub status_history: Vec<StatusEntry>,
    /// Unrecognized keys, kept in source order so nothing is dropped on save.
    pub extra: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    pub created_by: String,
    pub version: String,
    pub test_sequence: u32,
    pub run_ui: bool,
    pub extra: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TestPlan {
    pub current_focus: Vec<String>,
    pub stuck_tasks: Vec<String>,
    pub test_all: bool,
    pub test_priority: String,
    pub extra: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommEntry {
    pub agent: Agent,
    pub message: String,
}

/// The whole status ledger document. Top-level sections keep a canonical
/// order on render; unknown top-level keys are carried in `extra`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ledger {
    pub problem_statement: String,
    pub backend: Vec<TaskRecord>,
    pub frontend: Vec<TaskRecord>,
    pub metadata: Metadata,
    pub test_plan: TestPlan,
    pub agent_communication: Vec<CommEntry>,
    pub extra: Vec<(String, Value)>,
}

impl Ledger {
    pub fn section(&self, section: Section) -> &Vec<TaskRecord> {
        match section {
            Section::Backend => &self.backend,
            Section::Frontend => &self.frontend,
        }
    }

    pub fn section_mut(&mut self, section: Section) -> &mut Vec<TaskRecord> {
        match section {
            Section::Backend => &mut self.backend,
            Section::Frontend => &mut self.frontend,
        }
    }

    /// All records with their section, backend first, in document order.
    pub fn records(&self) -> impl Iterator<Item = (Section, &TaskRecord)> {
        self.backend
            .iter()
            .map(|record| (Section::Backend, record))
            .chain(self.frontend.iter().map(|record| (Section::Frontend, record)))
    }
}

pub fn parse_ledger(text: &str) -> Result<Ledger, LedgerError> {
    let value: Value = serde_yaml::from_str(text)?;
    let map = match value {
        Value::Mapping(map) => map,
        Value::Null => return Ok(Ledger::default()),
        _ => return Err(LedgerError::NotAMapping),
    };

    let mut ledger = Ledger::default();
    for (key, value) in map {
        let Some(key) = value_to_string(&key) else {
            continue;
        };
        match key.as_str() {
            "user_problem_statement" => {
                ledger.problem_statement = value_to_string(&value).unwrap_or_default();
            }
            "backend" => ledger.backend = parse_task_list(&value, "backend")?,
            "frontend" => ledger.frontend = parse_task_list(&value, "frontend")?,
            "metadata" => ledger.metadata = parse_metadata(&value)?,
            "test_plan" => ledger.test_plan = parse_test_plan(&value)?,
            "agent_communication" => {
                ledger.agent_communication = parse_communication(&value)?;
            }
            _ => ledger.extra.push((key, value)),
        }
    }
    Ok(ledger)
}

pub fn render_ledger(ledger: &Ledger) -> Result<String, LedgerError> {
    let mut root = Mapping::new();
    root.insert(
        Value::String("user_problem_statement".to_string()),
        Value::String(ledger.problem_statement.clone()),
    );
    root.insert(
        Value::String("backend".to_string()),
        task_list_value(&ledger.backend),
    );
    root.insert(
        Value::String("frontend".to_string()),
        task_list_value(&ledger.frontend),
    );
    root.insert(
        Value::String("metadata".to_string()),
        metadata_value(&ledger.metadata),
    );
    root.insert(
        Value::String("test_plan".to_string()),
        test_plan_value(&ledger.test_plan),
    );
    root.insert(
        Value::String("agent_communication".to_string()),
        communication_value(&ledger.agent_communication),
    );
    for (key, value) in &ledger.extra {
        root.insert(Value::String(key.clone()), value.clone());
    }
    Ok(serde_yaml::to_string(&Value::Mapping(root))?)
}

fn parse_task_list(value: &Value, section: &str) -> Result<Vec<TaskRecord>, LedgerError> {
    let seq = match value {
        Value::Sequence(seq) => seq,
        Value::Null => return Ok(Vec::new()),
        _ => {
            return Err(LedgerError::Invalid(format!(
                "section {} must be a sequence of task records",
                section
            )))
        }
    };
    let mut records = Vec::with_capacity(seq.len());
    for (idx, item) in seq.iter().enumerate() {
        let record = parse_task_record(item)
            .map_err(|err| LedgerError::Invalid(format!("{} task {}: {}", section, idx + 1, err)))?;
        records.push(record);
    }
    Ok(records)
}

fn parse_task_record(value: &Value) -> Result<TaskRecord, String> {
    let Value::Mapping(map) = value else {
        return Err("task record must be a mapping".to_string());
    };

    let mut record = TaskRecord::default();
    for (key, value) in map {
        let Some(key) = value_to_string(key) else {
            continue;
        };
        match key.as_str() {
            "task" => {
                record.task = value_to_string(value).unwrap_or_default().trim().to_string();
            }
            "implemented" => {
                record.implemented = TriState::from_value(value)
                    .ok_or_else(|| format!("unknown implemented value {:?}", value))?;
            }
            "working" => {
                record.working = TriState::from_value(value)
                    .ok_or_else(|| format!("unknown working value {:?}", value))?;
            }
            "file" => {
                record.file = match value {
                    Value::Sequence(_) => parse_string_list(Some(value)).join(", "),
                    _ => value_to_string(value).unwrap_or_default().trim().to_string(),
                };
            }
            "stuck_count" => {
                record.stuck_count = parse_count(value)
                    .ok_or_else(|| format!("stuck_count must be a non-negative integer, got {:?}", value))?;
            }
            "priority" => {
                let raw = value_to_string(value).unwrap_or_default();
                record.priority = Priority::parse(&raw)
                    .ok_or_else(|| format!("unknown priority {:?}", raw))?;
            }
            "needs_retesting" => {
                record.needs_retesting = parse_bool(value)
                    .ok_or_else(|| format!("needs_retesting must be a boolean, got {:?}", value))?;
            }
            "status_history" => {
                record.status_history = parse_status_history(value)?;
            }
            _ => record.extra.push((key, value.clone())),
        }
    }
    Ok(record)
}

fn parse_status_history(value: &Value) -> Result<Vec<StatusEntry>, String> {
    let seq = match value {
        Value::Sequence(seq) => seq,
        Value::Null => return Ok(Vec::new()),
        _ => return Err("status_history must be a sequence".to_string()),
    };
    let mut entries = Vec::with_capacity(seq.len());
    for (idx, item) in seq.iter().enumerate() {
        let Value::Mapping(map) = item else {
            return Err(format!("status_history entry {} must be a mapping", idx + 1));
        };
        let working = map
            .get(&Value::String("working".to_string()))
            .and_then(TriState::from_value)
            .ok_or_else(|| format!("status_history entry {}: bad working value", idx + 1))?;
        let agent_raw = map
            .get(&Value::String("agent".to_string()))
            .and_then(value_to_string)
            .unwrap_or_default();
        let agent = Agent::parse(&agent_raw)
            .ok_or_else(|| format!("status_history entry {}: unknown agent {:?}", idx + 1, agent_raw))?;
        let comment = map
            .get(&Value::String("comment".to_string()))
            .and_then(value_to_string)
            .unwrap_or_default();
        entries.push(StatusEntry {
            working,
            agent,
            comment,
        });
    }
    Ok(entries)
}

fn parse_metadata(value: &Value) -> Result<Metadata, LedgerError> {
    let map = match value {
        Value::Mapping(map) => map,
        Value::Null => return Ok(Metadata::default()),
        _ => return Err(LedgerError::Invalid("metadata must be a mapping".to_string())),
    };
    let mut metadata = Metadata::default();
    for (key, value) in map {
        let Some(key) = value_to_string(key) else {
            continue;
        };
        match key.as_str() {
            "created_by" => {
                metadata.created_by = value_to_string(value).unwrap_or_default().trim().to_string();
            }
            "version" => {
                metadata.version = value_to_string(value).unwrap_or_default().trim().to_string();
            }
            "test_sequence" => {
                metadata.test_sequence = parse_count(value).ok_or_else(|| {
                    LedgerError::Invalid(format!(
                        "metadata test_sequence must be a non-negative integer, got {:?}", value
                    ))
                })?;
            }
            "run_ui" => {
                metadata.run_ui = parse_bool(value).ok_or_else(|| {
                    LedgerError::Invalid(format!("metadata run_ui must be a boolean, got {:?}", value))
                })?;
            }
            _ => metadata.extra.push((key, value.clone())),
        }
    }
    Ok(metadata)
}

fn parse_test_plan(value: &Value) -> Result<TestPlan, LedgerError> {
    let map = match value {
        Value::Mapping(map) => map,
        Value::Null => return Ok(TestPlan::default()),
        _ => return Err(LedgerError::Invalid("test_plan must be a mapping".to_string())),
    };
    let mut plan = TestPlan::default();
    for (key, value) in map {
        let Some(key) = value_to_string(key) else {
            continue;
        };
        match key.as_str() {
            "current_focus" => plan.current_focus = parse_string_list(Some(value)),
            "stuck_tasks" => plan.stuck_tasks = parse_string_list(Some(value)),
            "test_all" => {
                plan.test_all = parse_bool(value).ok_or_else(|| {
                    LedgerError::Invalid(format!("test_plan test_all must be a boolean, got {:?}", value))
                })?;
            }
            "test_priority" => {
                plan.test_priority = value_to_string(value).unwrap_or_default().trim().to_string();
            }
            _ => plan.extra.push((key, value.clone())),
        }
    }
    Ok(plan)
}

fn parse_communication(value: &Value) -> Result<Vec<CommEntry>, LedgerError> {
    let seq = match value {
        Value::Sequence(seq) => seq,
        Value::Null => return Ok(Vec::new()),
        _ => {
            return Err(LedgerError::Invalid(
                "agent_communication must be a sequence".to_string(),
            ))
        }
    };
    let mut entries = Vec::with_capacity(seq.len());
    for (idx, item) in seq.iter().enumerate() {
        let Value::Mapping(map) = item else {
            return Err(LedgerError::Invalid(format!(
                "agent_communication entry {} must be a mapping",
                idx + 1
            )));
        };
        let agent_raw = map
            .get(&Value::String("agent".to_string()))
            .and_then(value_to_string)
            .unwrap_or_default();
        let agent = Agent::parse(&agent_raw).ok_or_else(|| {
            LedgerError::Invalid(format!(
                "agent_communication entry {}: unknown agent {:?}",
                idx + 1,
                agent_raw
            ))
        })?;
        let message = map
            .get(&Value::String("message".to_string()))
            .and_then(value_to_string)
            .unwrap_or_default();
        entries.push(CommEntry { agent, message });
    }
    Ok(entries)
}

fn task_list_value(records: &[TaskRecord]) -> Value {
    Value::Sequence(records.iter().map(task_record_value).collect())
}

fn task_record_value(record: &TaskRecord) -> Value {
    let mut map = Mapping::new();
    map.insert(
        Value::String("task".to_string()),
        Value::String(record.task.clone()),
    );
    map.insert(
        Value::String("implemented".to_string()),
        record.implemented.as_value(),
    );
    map.insert(Value::String("working".to_string()), record.working.as_value());
    map.insert(
        Value::String("file".to_string()),
        Value::String(record.file.clone()),
    );
    map.insert(
        Value::String("stuck_count".to_string()),
        Value::Number(record.stuck_count.into()),
    );
    map.insert(
        Value::String("priority".to_string()),
        Value::String(record.priority.as_str().to_string()),
    );
    map.insert(
        Value::String("needs_retesting".to_string()),
        Value::Bool(record.needs_retesting),
    );
    map.insert(
        Value::String("status_history".to_string()),
        Value::Sequence(record.status_history.iter().map(status_entry_value).collect()),
    );
    for (key, value) in &record.extra {
        map.insert(Value::String(key.clone()), value.clone());
    }
    Value::Mapping(map)
}

fn status_entry_value(entry: &StatusEntry) -> Value {
    let mut map = Mapping::new();
    map.insert(Value::String("working".to_string()), entry.working.as_value());
    map.insert(
        Value::String("agent".to_string()),
        Value::String(entry.agent.as_str().to_string()),
    );
    map.insert(
        Value::String("comment".to_string()),
        Value::String(entry.comment.clone()),
    );
    Value::Mapping(map)
}

fn metadata_value(metadata: &Metadata) -> Value {
    let mut map = Mapping::new();
    map.insert(
        Value::String("created_by".to_string()),
        Value::String(metadata.created_by.clone()),
    );
    map.insert(
        Value::String("version".to_string()),
        Value::String(metadata.version.clone()),
    );
    map.insert(
        Value::String("test_sequence".to_string()),
        Value::Number(metadata.test_sequence.into()),
    );
    map.insert(Value::String("run_ui".to_string()), Value::Bool(metadata.run_ui));
    for (key, value) in &metadata.extra {
        map.insert(Value::String(key.clone()), value.clone());
    }
    Value::Mapping(map)
}

fn test_plan_value(plan: &TestPlan) -> Value {
    let mut map = Mapping::new();
    map.insert(
        Value::String("current_focus".to_string()),
        string_list_value(&plan.current_focus),
    );
    map.insert(
        Value::String("stuck_tasks".to_string()),
        string_list_value(&plan.stuck_tasks),
    );
    map.insert(Value::String("test_all".to_string()), Value::Bool(plan.test_all));
    map.insert(
        Value::String("test_priority".to_string()),
        Value::String(plan.test_priority.clone()),
    );
    for (key, value) in &plan.extra {
        map.insert(Value::String(key.clone()), value.clone());
    }
    Value::Mapping(map)
}

fn communication_value(entries: &[CommEntry]) -> Value {
    Value::Sequence(
        entries
            .iter()
            .map(|entry| {
                let mut map = Mapping::new();
                map.insert(
                    Value::String("agent".to_string()),
                    Value::String(entry.agent.as_str().to_string()),
                );
                map.insert(
                    Value::String("message".to_string()),
                    Value::String(entry.message.clone()),
                );
                Value::Mapping(map)
            })
            .collect(),
    )
}

fn string_list_value(items: &[String]) -> Value {
    Value::Sequence(items.iter().map(|item| Value::String(item.clone())).collect())
}

pub(crate) fn parse_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(value_to_string)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(other) => value_to_string(other)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|s| vec![s])
            .unwrap_or_default(),
    }
}

pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(val) => Some(val.clone()),
        Value::Number(num) => Some(num.to_string()),
        Value::Bool(val) => Some(val.to_string()),
        Value::Null => None,
        _ => serde_yaml::to_string(value).ok().map(|s| s.trim().to_string()),
    }
}

fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(val) => Some(*val),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(num) => num.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}
