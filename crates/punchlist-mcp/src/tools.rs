use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rust_mcp_sdk::macros::{mcp_tool, JsonSchema};
use rust_mcp_sdk::schema::{
    schema_utils::CallToolError, CallToolRequestParams, CallToolResult, ListToolsResult,
    PaginatedRequestParams, RpcError, TextContent,
};
use rust_mcp_sdk::tool_box;
use rust_mcp_sdk::{mcp_server::ServerHandler, McpServer};
use serde::{Deserialize, Serialize};

use crate::version;

use punchlist_core::audit::{append_audit_event, AuditEvent};
use punchlist_core::config::{resolve_auto_sync_plan, resolve_default_agent};
use punchlist_core::doctor::doctor_report;
use punchlist_core::export::{export_json, export_tasks_jsonl, task_to_json_value};
use punchlist_core::init::{init_at, InitError, InitOptions};
use punchlist_core::ledger::{Agent, Ledger, Priority, Section, TriState};
use punchlist_core::lock::{LedgerLock, DEFAULT_LOCK_TIMEOUT};
use punchlist_core::ops::{
    append_message, append_status, create_task, filter_tasks, find_task, increment_stuck,
    mark_implemented, mark_retest, render_task_line, resolve_stuck, OpError, TaskFilter,
    TaskSelector,
};
use punchlist_core::plan::{add_focus, check_plan, clear_focus, set_focus, sync_plan};
use punchlist_core::store::{load_ledger, resolve_ledger, save_ledger, LedgerResolution, StoreError};
use punchlist_core::validate::validate_ledger;

const ROOT_REQUIRED_ERROR: &str =
    "root is required for MCP calls unless the server is started inside a repo containing a punchlist document";

#[derive(Clone)]
pub struct McpContext {
    pub default_root: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum ListInput {
    String(String),
    List(Vec<String>),
}

fn parse_list_input(value: Option<ListInput>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(ListInput::List(values)) => values
            .into_iter()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect(),
        Some(ListInput::String(value)) => parse_list_string(&value),
    }
}

fn parse_list_string(value: &str) -> Vec<String> {
    let raw = value.trim();
    if raw.is_empty() || raw == "[]" {
        return Vec::new();
    }
    let inner = if raw.starts_with('[') && raw.ends_with(']') {
        raw[1..raw.len() - 1].trim()
    } else {
        raw
    };
    if inner.is_empty() {
        return Vec::new();
    }
    inner
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn resolve_repo(
    context: &McpContext,
    root: Option<&str>,
) -> Result<LedgerResolution, serde_json::Value> {
    let root_value = root.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    });
    let used_root = if let Some(root_value) = root_value {
        Some(PathBuf::from(root_value))
    } else {
        context.default_root.clone()
    };

    let resolved = if let Some(root_path) = &used_root {
        resolve_ledger(root_path)
    } else {
        resolve_ledger(&std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    };

    match resolved {
        Ok(resolution) => Ok(resolution),
        Err(StoreError::NotFound(_)) => {
            if let Some(root_path) = used_root {
                Err(serde_json::json!({
                    "error": format!("No ledger document found under {}", root_path.display())
                }))
            } else {
                Err(serde_json::json!({"error": ROOT_REQUIRED_ERROR}))
            }
        }
        Err(err) => Err(serde_json::json!({"error": err.to_string()})),
    }
}

fn open_repo(
    context: &McpContext,
    root: Option<&str>,
) -> Result<(LedgerResolution, Ledger), serde_json::Value> {
    let resolution = resolve_repo(context, root)?;
    match load_ledger(&resolution.ledger_path) {
        Ok(ledger) => Ok((resolution, ledger)),
        Err(err) => Err(serde_json::json!({"error": err.to_string()})),
    }
}

fn resolve_repo_root(context: &McpContext, root: Option<&str>) -> PathBuf {
    let root_value = root.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    });
    if let Some(root_value) = root_value {
        return PathBuf::from(root_value);
    }
    if let Some(default_root) = &context.default_root {
        return default_root.clone();
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn parse_section_arg(raw: &str) -> Result<Section, serde_json::Value> {
    Section::parse(raw).ok_or_else(|| {
        serde_json::json!({
            "error": format!("Unknown section: {} (expected backend or frontend)", raw)
        })
    })
}

fn parse_priority_arg(raw: &str) -> Result<Priority, serde_json::Value> {
    Priority::parse(raw).ok_or_else(|| {
        serde_json::json!({
            "error": format!("Unknown priority: {} (expected low, medium, high, or critical)", raw)
        })
    })
}

fn parse_tri_state_arg(raw: &str) -> Result<TriState, serde_json::Value> {
    TriState::parse(raw).ok_or_else(|| {
        serde_json::json!({
            "error": format!("Unknown working value: {} (expected true, false, or NA)", raw)
        })
    })
}

fn parse_agent_arg(
    resolution: &LedgerResolution,
    agent: Option<&str>,
) -> Result<Agent, serde_json::Value> {
    match agent {
        Some(raw) => Agent::parse(raw).ok_or_else(|| {
            serde_json::json!({
                "error": format!("Unknown agent: {} (expected main, testing, or user)", raw)
            })
        }),
        None => Ok(resolve_default_agent(&resolution.repo_root)),
    }
}

fn parse_selector_arg(raw: &str) -> Result<TaskSelector, serde_json::Value> {
    TaskSelector::parse(raw).map_err(|err| serde_json::json!({"error": err.to_string()}))
}

fn ok_text(content: String) -> Result<CallToolResult, CallToolError> {
    Ok(CallToolResult::text_content(vec![TextContent::from(
        content,
    )]))
}

fn ok_json(value: serde_json::Value) -> Result<CallToolResult, CallToolError> {
    let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());
    ok_text(text)
}

fn audit_event(
    repo_root: &Path,
    action: &str,
    task: Option<&str>,
    details: serde_json::Value,
) -> Result<(), CallToolError> {
    let event = AuditEvent::new(
        Some("mcp".to_string()),
        action,
        task.map(|value| value.to_string()),
        details,
    );
    append_audit_event(repo_root, &event).map_err(CallToolError::new)
}

/// Locked load-apply-save round. Domain rejections come back as the inner
/// `Err` so callers can answer with a payload instead of a protocol error.
fn apply_mutation<T>(
    resolution: &LedgerResolution,
    apply: impl FnOnce(&mut Ledger) -> Result<T, OpError>,
) -> Result<Result<T, OpError>, CallToolError> {
    let _lock = LedgerLock::acquire(&resolution.repo_root, DEFAULT_LOCK_TIMEOUT)
        .map_err(|err| CallToolError::from_message(err.to_string()))?;
    let mut ledger = load_ledger(&resolution.ledger_path)
        .map_err(|err| CallToolError::from_message(err.to_string()))?;
    let value = match apply(&mut ledger) {
        Ok(value) => value,
        Err(err) => return Ok(Err(err)),
    };
    if resolve_auto_sync_plan(&resolution.repo_root) {
        sync_plan(&mut ledger);
    }
    save_ledger(&resolution.ledger_path, &ledger)
        .map_err(|err| CallToolError::from_message(err.to_string()))?;
    Ok(Ok(value))
}

#[mcp_tool(name = "version", description = "Return Punchlist version information.")]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct VersionTool {
    #[serde(default = "default_format")]
    pub format: String,
}

#[mcp_tool(
    name = "doctor",
    description = "Diagnostics report for repo layout, document health, config, and versions."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct DoctorTool {
    pub root: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
}

#[mcp_tool(
    name = "init_ledger",
    description = "Create a fresh ledger document in a repo."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct InitLedgerTool {
    pub root: Option<String>,
    pub problem: Option<String>,
    pub created_by: Option<String>,
    pub ledger: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

#[mcp_tool(
    name = "list_tasks",
    description = "List ledger tasks, optionally filtered by section, working state, priority, retest flag, or stuck count."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListTasksTool {
    pub root: Option<String>,
    pub section: Option<String>,
    pub working: Option<String>,
    pub priority: Option<String>,
    pub retest: Option<bool>,
    #[serde(default)]
    pub stuck: bool,
    #[serde(default = "default_format")]
    pub format: String,
}

#[mcp_tool(
    name = "show_task",
    description = "Show a single task with its full status history."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ShowTaskTool {
    pub task: String,
    pub root: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
}

#[mcp_tool(
    name = "add_task",
    description = "Create a task in the backend or frontend section."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct AddTaskTool {
    pub section: String,
    pub name: String,
    #[serde(default)]
    pub file: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    pub root: Option<String>,
}

#[mcp_tool(
    name = "record_status",
    description = "Append a status entry to a task's history and sync its working field."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct RecordStatusTool {
    pub task: String,
    pub working: String,
    pub comment: String,
    pub agent: Option<String>,
    pub root: Option<String>,
}

#[mcp_tool(
    name = "mark_implemented",
    description = "Mark a task implemented and flag it for verification."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct MarkImplementedTool {
    pub task: String,
    pub root: Option<String>,
}

#[mcp_tool(name = "mark_retest", description = "Flag a task for retesting.")]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct MarkRetestTool {
    pub task: String,
    pub root: Option<String>,
}

#[mcp_tool(
    name = "bump_stuck",
    description = "Manually increment a task's stuck count."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct BumpStuckTool {
    pub task: String,
    pub root: Option<String>,
}

#[mcp_tool(
    name = "resolve_stuck",
    description = "Record a testing-agent confirmation that a stuck task works; the only path that resets stuck_count."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ResolveStuckTool {
    pub task: String,
    pub comment: String,
    pub root: Option<String>,
}

#[mcp_tool(
    name = "focus_list",
    description = "Show the test plan focus and stuck lists."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct FocusListTool {
    pub root: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
}

#[mcp_tool(
    name = "focus_set",
    description = "Replace, extend, or clear the test plan focus list."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct FocusSetTool {
    pub root: Option<String>,
    pub entries: Option<ListInput>,
    pub add: Option<String>,
    #[serde(default)]
    pub clear: bool,
}

#[mcp_tool(
    name = "plan_sync",
    description = "Add focus entries for retest-flagged tasks and rebuild stuck_tasks."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct PlanSyncTool {
    pub root: Option<String>,
}

#[mcp_tool(
    name = "plan_check",
    description = "Check that every retest-flagged task is covered by current_focus."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct PlanCheckTool {
    pub root: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
}

#[mcp_tool(
    name = "post_message",
    description = "Append a message to the inter-agent communication log."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct PostMessageTool {
    pub message: String,
    pub agent: Option<String>,
    pub root: Option<String>,
}

#[mcp_tool(
    name = "comm_log",
    description = "Show the inter-agent communication log, optionally limited to the most recent entries."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct CommLogTool {
    pub root: Option<String>,
    pub limit: Option<u32>,
    #[serde(default = "default_format")]
    pub format: String,
}

#[mcp_tool(name = "validate_ledger", description = "Run document integrity checks.")]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ValidateLedgerTool {
    pub root: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
}

#[mcp_tool(
    name = "export_tasks",
    description = "Export the whole ledger as JSON, or one task per line as JSONL."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ExportTasksTool {
    pub root: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
}

tool_box!(
    PunchlistTools,
    [
        VersionTool,
        DoctorTool,
        InitLedgerTool,
        ListTasksTool,
        ShowTaskTool,
        AddTaskTool,
        RecordStatusTool,
        MarkImplementedTool,
        MarkRetestTool,
        BumpStuckTool,
        ResolveStuckTool,
        FocusListTool,
        FocusSetTool,
        PlanSyncTool,
        PlanCheckTool,
        PostMessageTool,
        CommLogTool,
        ValidateLedgerTool,
        ExportTasksTool
    ]
);

pub struct PunchlistServerHandler {
    pub context: McpContext,
}

#[async_trait]
impl ServerHandler for PunchlistServerHandler {
    async fn handle_list_tools_request(
        &self,
        _params: Option<PaginatedRequestParams>,
        _runtime: std::sync::Arc<dyn McpServer>,
    ) -> Result<ListToolsResult, RpcError> {
        Ok(ListToolsResult {
            meta: None,
            next_cursor: None,
            tools: PunchlistTools::tools(),
        })
    }

    async fn handle_call_tool_request(
        &self,
        params: CallToolRequestParams,
        _runtime: std::sync::Arc<dyn McpServer>,
    ) -> Result<CallToolResult, CallToolError> {
        let tool = PunchlistTools::try_from(params).map_err(CallToolError::new)?;
        match tool {
            PunchlistTools::VersionTool(tool) => tool.call(&self.context),
            PunchlistTools::DoctorTool(tool) => tool.call(&self.context),
            PunchlistTools::InitLedgerTool(tool) => tool.call(&self.context),
            PunchlistTools::ListTasksTool(tool) => tool.call(&self.context),
            PunchlistTools::ShowTaskTool(tool) => tool.call(&self.context),
            PunchlistTools::AddTaskTool(tool) => tool.call(&self.context),
            PunchlistTools::RecordStatusTool(tool) => tool.call(&self.context),
            PunchlistTools::MarkImplementedTool(tool) => tool.call(&self.context),
            PunchlistTools::MarkRetestTool(tool) => tool.call(&self.context),
            PunchlistTools::BumpStuckTool(tool) => tool.call(&self.context),
            PunchlistTools::ResolveStuckTool(tool) => tool.call(&self.context),
            PunchlistTools::FocusListTool(tool) => tool.call(&self.context),
            PunchlistTools::FocusSetTool(tool) => tool.call(&self.context),
            PunchlistTools::PlanSyncTool(tool) => tool.call(&self.context),
            PunchlistTools::PlanCheckTool(tool) => tool.call(&self.context),
            PunchlistTools::PostMessageTool(tool) => tool.call(&self.context),
            PunchlistTools::CommLogTool(tool) => tool.call(&self.context),
            PunchlistTools::ValidateLedgerTool(tool) => tool.call(&self.context),
            PunchlistTools::ExportTasksTool(tool) => tool.call(&self.context),
        }
    }
}

impl VersionTool {
    fn call(&self, _context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let payload = serde_json::json!({
            "name": "punchlist",
            "version": env!("CARGO_PKG_VERSION"),
            "full": version::FULL,
        });

        if self.format == "text" {
            return ok_text(format!(
                "punchlist {}\n{}\n",
                payload
                    .get("version")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default(),
                payload
                    .get("full")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
            ));
        }

        ok_json(payload)
    }
}

impl DoctorTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let repo_root = resolve_repo_root(context, self.root.as_deref());
        let report = doctor_report(&repo_root, "punchlist-mcp");
        if self.format == "text" {
            return ok_text(
                serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string()),
            );
        }
        ok_json(report)
    }
}

impl InitLedgerTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let repo_root = resolve_repo_root(context, self.root.as_deref());
        let options = InitOptions {
            problem_statement: self.problem.clone(),
            created_by: self.created_by.clone(),
            ledger: self.ledger.clone(),
            hidden: self.hidden,
        };
        let outcome = match init_at(&repo_root, &options) {
            Ok(outcome) => outcome,
            Err(err @ (InitError::AlreadyInitialized(_) | InitError::EmptyPath)) => {
                return ok_json(serde_json::json!({"error": err.to_string()}));
            }
            Err(err) => return Err(CallToolError::from_message(err.to_string())),
        };
        audit_event(
            &repo_root,
            "init",
            None,
            serde_json::json!({"ledger_path": outcome.ledger_path.to_string_lossy()}),
        )?;
        ok_json(serde_json::json!({
            "ok": true,
            "ledger_path": outcome.ledger_path.to_string_lossy(),
            "config_path": outcome.config_path.as_ref().map(|p| p.to_string_lossy().to_string()),
        }))
    }
}

impl ListTasksTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let (_resolution, ledger) = match open_repo(context, self.root.as_deref()) {
            Ok(pair) => pair,
            Err(err) => return ok_json(err),
        };
        let section = match self.section.as_deref().map(parse_section_arg).transpose() {
            Ok(section) => section,
            Err(err) => return ok_json(err),
        };
        let working = match self.working.as_deref().map(parse_tri_state_arg).transpose() {
            Ok(working) => working,
            Err(err) => return ok_json(err),
        };
        let priority = match self.priority.as_deref().map(parse_priority_arg).transpose() {
            Ok(priority) => priority,
            Err(err) => return ok_json(err),
        };
        let filter = TaskFilter {
            section,
            working,
            priority,
            needs_retesting: self.retest,
            stuck_only: self.stuck,
        };
        let tasks = filter_tasks(&ledger, &filter);

        if self.format == "text" {
            if tasks.is_empty() {
                return ok_text("No tasks match".to_string());
            }
            let body = tasks
                .iter()
                .map(|(section, record)| render_task_line(*section, record))
                .collect::<Vec<_>>()
                .join("\n");
            return ok_text(body);
        }
        let payload: Vec<serde_json::Value> = tasks
            .iter()
            .map(|(section, record)| task_to_json_value(*section, record))
            .collect();
        ok_json(serde_json::Value::Array(payload))
    }
}

impl ShowTaskTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let (_resolution, ledger) = match open_repo(context, self.root.as_deref()) {
            Ok(pair) => pair,
            Err(err) => return ok_json(err),
        };
        let selector = match parse_selector_arg(&self.task) {
            Ok(selector) => selector,
            Err(err) => return ok_json(err),
        };
        let (section, idx) = match find_task(&ledger, &selector) {
            Ok(hit) => hit,
            Err(err) => return ok_json(serde_json::json!({"error": err.to_string()})),
        };
        let record = &ledger.section(section)[idx];

        if self.format == "text" {
            let mut out = String::new();
            out.push_str(&format!("task:            {}\n", record.task));
            out.push_str(&format!("section:         {}\n", section.key()));
            out.push_str(&format!("implemented:     {}\n", record.implemented.as_str()));
            out.push_str(&format!("working:         {}\n", record.working.as_str()));
            if !record.file.is_empty() {
                out.push_str(&format!("file:            {}\n", record.file));
            }
            out.push_str(&format!("priority:        {}\n", record.priority.as_str()));
            out.push_str(&format!("stuck_count:     {}\n", record.stuck_count));
            out.push_str(&format!("needs_retesting: {}\n", record.needs_retesting));
            if record.status_history.is_empty() {
                out.push_str("history:         (none)\n");
            } else {
                out.push_str("history:\n");
                for (idx, entry) in record.status_history.iter().enumerate() {
                    out.push_str(&format!(
                        "  {}. [{}] working={} {}\n",
                        idx + 1,
                        entry.agent.as_str(),
                        entry.working.as_str(),
                        entry.comment
                    ));
                }
            }
            return ok_text(out.trim_end().to_string());
        }
        ok_json(task_to_json_value(section, record))
    }
}

impl AddTaskTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let resolution = match resolve_repo(context, self.root.as_deref()) {
            Ok(resolution) => resolution,
            Err(err) => return ok_json(err),
        };
        let section = match parse_section_arg(&self.section) {
            Ok(section) => section,
            Err(err) => return ok_json(err),
        };
        let priority = match parse_priority_arg(&self.priority) {
            Ok(priority) => priority,
            Err(err) => return ok_json(err),
        };
        let applied = apply_mutation(&resolution, |ledger| {
            create_task(ledger, section, &self.name, &self.file, priority)
        })?;
        let record = match applied {
            Ok(record) => record,
            Err(err) => return ok_json(serde_json::json!({"error": err.to_string()})),
        };
        audit_event(
            &resolution.repo_root,
            "task.create",
            Some(&record.task),
            serde_json::json!({"section": section.key(), "priority": priority.as_str()}),
        )?;
        ok_json(task_to_json_value(section, &record))
    }
}

impl RecordStatusTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let resolution = match resolve_repo(context, self.root.as_deref()) {
            Ok(resolution) => resolution,
            Err(err) => return ok_json(err),
        };
        let selector = match parse_selector_arg(&self.task) {
            Ok(selector) => selector,
            Err(err) => return ok_json(err),
        };
        let working = match parse_tri_state_arg(&self.working) {
            Ok(working) => working,
            Err(err) => return ok_json(err),
        };
        let agent = match parse_agent_arg(&resolution, self.agent.as_deref()) {
            Ok(agent) => agent,
            Err(err) => return ok_json(err),
        };
        let applied = apply_mutation(&resolution, |ledger| {
            append_status(ledger, &selector, working, agent, &self.comment)
        })?;
        let outcome = match applied {
            Ok(outcome) => outcome,
            Err(err) => return ok_json(serde_json::json!({"error": err.to_string()})),
        };
        audit_event(
            &resolution.repo_root,
            "status.append",
            Some(&outcome.record.task),
            serde_json::json!({
                "working": working.as_json(),
                "agent": agent.as_str(),
                "stuck_incremented": outcome.stuck_incremented,
                "stuck_reset": outcome.stuck_reset,
            }),
        )?;
        let mut payload = task_to_json_value(outcome.section, &outcome.record);
        if let Some(map) = payload.as_object_mut() {
            map.insert(
                "stuck_incremented".to_string(),
                serde_json::Value::Bool(outcome.stuck_incremented),
            );
            map.insert(
                "stuck_reset".to_string(),
                serde_json::Value::Bool(outcome.stuck_reset),
            );
            map.insert(
                "retest_cleared".to_string(),
                serde_json::Value::Bool(outcome.retest_cleared),
            );
        }
        ok_json(payload)
    }
}

impl MarkImplementedTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let resolution = match resolve_repo(context, self.root.as_deref()) {
            Ok(resolution) => resolution,
            Err(err) => return ok_json(err),
        };
        let selector = match parse_selector_arg(&self.task) {
            Ok(selector) => selector,
            Err(err) => return ok_json(err),
        };
        let applied = apply_mutation(&resolution, |ledger| mark_implemented(ledger, &selector))?;
        let (section, record) = match applied {
            Ok(value) => value,
            Err(err) => return ok_json(serde_json::json!({"error": err.to_string()})),
        };
        audit_event(
            &resolution.repo_root,
            "task.implemented",
            Some(&record.task),
            serde_json::json!({"section": section.key()}),
        )?;
        ok_json(task_to_json_value(section, &record))
    }
}

impl MarkRetestTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let resolution = match resolve_repo(context, self.root.as_deref()) {
            Ok(resolution) => resolution,
            Err(err) => return ok_json(err),
        };
        let selector = match parse_selector_arg(&self.task) {
            Ok(selector) => selector,
            Err(err) => return ok_json(err),
        };
        let applied = apply_mutation(&resolution, |ledger| mark_retest(ledger, &selector))?;
        let outcome = match applied {
            Ok(outcome) => outcome,
            Err(err) => return ok_json(serde_json::json!({"error": err.to_string()})),
        };
        audit_event(
            &resolution.repo_root,
            "task.retest",
            Some(&outcome.task),
            serde_json::json!({"changed": outcome.changed}),
        )?;
        ok_json(serde_json::json!({
            "section": outcome.section.key(),
            "task": outcome.task,
            "needs_retesting": true,
            "changed": outcome.changed,
        }))
    }
}

impl BumpStuckTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let resolution = match resolve_repo(context, self.root.as_deref()) {
            Ok(resolution) => resolution,
            Err(err) => return ok_json(err),
        };
        let selector = match parse_selector_arg(&self.task) {
            Ok(selector) => selector,
            Err(err) => return ok_json(err),
        };
        let applied = apply_mutation(&resolution, |ledger| increment_stuck(ledger, &selector))?;
        let (section, record) = match applied {
            Ok(value) => value,
            Err(err) => return ok_json(serde_json::json!({"error": err.to_string()})),
        };
        audit_event(
            &resolution.repo_root,
            "task.stuck",
            Some(&record.task),
            serde_json::json!({"stuck_count": record.stuck_count}),
        )?;
        ok_json(task_to_json_value(section, &record))
    }
}

impl ResolveStuckTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let resolution = match resolve_repo(context, self.root.as_deref()) {
            Ok(resolution) => resolution,
            Err(err) => return ok_json(err),
        };
        let selector = match parse_selector_arg(&self.task) {
            Ok(selector) => selector,
            Err(err) => return ok_json(err),
        };
        let applied = apply_mutation(&resolution, |ledger| {
            resolve_stuck(ledger, &selector, &self.comment)
        })?;
        let outcome = match applied {
            Ok(outcome) => outcome,
            Err(err) => return ok_json(serde_json::json!({"error": err.to_string()})),
        };
        audit_event(
            &resolution.repo_root,
            "task.resolve",
            Some(&outcome.record.task),
            serde_json::json!({"stuck_reset": outcome.stuck_reset}),
        )?;
        let mut payload = task_to_json_value(outcome.section, &outcome.record);
        if let Some(map) = payload.as_object_mut() {
            map.insert(
                "stuck_reset".to_string(),
                serde_json::Value::Bool(outcome.stuck_reset),
            );
            map.insert(
                "retest_cleared".to_string(),
                serde_json::Value::Bool(outcome.retest_cleared),
            );
        }
        ok_json(payload)
    }
}

impl FocusListTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let (_resolution, ledger) = match open_repo(context, self.root.as_deref()) {
            Ok(pair) => pair,
            Err(err) => return ok_json(err),
        };
        let plan = &ledger.test_plan;

        if self.format == "text" {
            if plan.current_focus.is_empty() && plan.stuck_tasks.is_empty() {
                return ok_text("Focus is empty".to_string());
            }
            let mut out = String::new();
            for entry in &plan.current_focus {
                out.push_str(&format!("{}\n", entry));
            }
            for name in &plan.stuck_tasks {
                out.push_str(&format!("stuck: {}\n", name));
            }
            return ok_text(out.trim_end().to_string());
        }
        ok_json(serde_json::json!({
            "current_focus": plan.current_focus,
            "stuck_tasks": plan.stuck_tasks,
            "test_priority": plan.test_priority,
        }))
    }
}

impl FocusSetTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let resolution = match resolve_repo(context, self.root.as_deref()) {
            Ok(resolution) => resolution,
            Err(err) => return ok_json(err),
        };

        // clear wins over add, add wins over entries.
        if self.clear {
            let applied = apply_mutation(&resolution, |ledger| {
                let removed = clear_focus(ledger);
                Ok((removed, ledger.test_plan.current_focus.clone()))
            })?;
            let (removed, current) = match applied {
                Ok(value) => value,
                Err(err) => return ok_json(serde_json::json!({"error": err.to_string()})),
            };
            let payload = serde_json::json!({"removed": removed, "current_focus": current});
            audit_event(&resolution.repo_root, "plan.focus.clear", None, payload.clone())?;
            return ok_json(payload);
        }

        if let Some(entry) = self.add.as_deref() {
            let applied = apply_mutation(&resolution, |ledger| {
                let added = add_focus(ledger, entry);
                Ok((added, ledger.test_plan.current_focus.clone()))
            })?;
            let (added, current) = match applied {
                Ok(value) => value,
                Err(err) => return ok_json(serde_json::json!({"error": err.to_string()})),
            };
            let payload =
                serde_json::json!({"entry": entry, "added": added, "current_focus": current});
            audit_event(&resolution.repo_root, "plan.focus.add", None, payload.clone())?;
            return ok_json(payload);
        }

        let Some(entries) = self.entries.clone() else {
            return ok_json(serde_json::json!({"error": "Provide entries, add, or clear"}));
        };
        let entries = parse_list_input(Some(entries));
        let applied = apply_mutation(&resolution, |ledger| {
            let kept = set_focus(ledger, entries);
            Ok((kept, ledger.test_plan.current_focus.clone()))
        })?;
        let (kept, current) = match applied {
            Ok(value) => value,
            Err(err) => return ok_json(serde_json::json!({"error": err.to_string()})),
        };
        let payload = serde_json::json!({"entries": kept, "current_focus": current});
        audit_event(&resolution.repo_root, "plan.focus.set", None, payload.clone())?;
        ok_json(payload)
    }
}

impl PlanSyncTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let resolution = match resolve_repo(context, self.root.as_deref()) {
            Ok(resolution) => resolution,
            Err(err) => return ok_json(err),
        };
        let applied = apply_mutation(&resolution, |ledger| Ok(sync_plan(ledger)))?;
        let report = match applied {
            Ok(report) => report,
            Err(err) => return ok_json(serde_json::json!({"error": err.to_string()})),
        };
        let payload = serde_json::json!({
            "added_focus": report.added_focus,
            "added_stuck": report.added_stuck,
            "removed_stuck": report.removed_stuck,
        });
        audit_event(&resolution.repo_root, "plan.sync", None, payload.clone())?;
        ok_json(payload)
    }
}

impl PlanCheckTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let (_resolution, ledger) = match open_repo(context, self.root.as_deref()) {
            Ok(pair) => pair,
            Err(err) => return ok_json(err),
        };
        let check = check_plan(&ledger);

        if self.format == "text" {
            let mut out = String::new();
            for name in &check.missing_focus {
                out.push_str(&format!("missing focus: {}\n", name));
            }
            for entry in &check.unknown_focus {
                out.push_str(&format!("unknown focus entry: {}\n", entry));
            }
            if check.ok {
                out.push_str("Plan check passed\n");
            } else {
                out.push_str(&format!(
                    "Plan check failed, {} task(s) need focus coverage\n",
                    check.missing_focus.len()
                ));
            }
            return ok_text(out.trim_end().to_string());
        }
        ok_json(serde_json::json!({
            "ok": check.ok,
            "missing_focus": check.missing_focus,
            "unknown_focus": check.unknown_focus,
        }))
    }
}

impl PostMessageTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let resolution = match resolve_repo(context, self.root.as_deref()) {
            Ok(resolution) => resolution,
            Err(err) => return ok_json(err),
        };
        let agent = match parse_agent_arg(&resolution, self.agent.as_deref()) {
            Ok(agent) => agent,
            Err(err) => return ok_json(err),
        };
        let applied =
            apply_mutation(&resolution, |ledger| append_message(ledger, agent, &self.message))?;
        let entry = match applied {
            Ok(entry) => entry,
            Err(err) => return ok_json(serde_json::json!({"error": err.to_string()})),
        };
        audit_event(
            &resolution.repo_root,
            "comm.post",
            None,
            serde_json::json!({"agent": entry.agent.as_str()}),
        )?;
        ok_json(serde_json::json!({
            "agent": entry.agent.as_str(),
            "message": entry.message,
        }))
    }
}

impl CommLogTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let (_resolution, ledger) = match open_repo(context, self.root.as_deref()) {
            Ok(pair) => pair,
            Err(err) => return ok_json(err),
        };
        let entries = &ledger.agent_communication;
        let skip = match self.limit {
            Some(limit) if (limit as usize) < entries.len() => entries.len() - limit as usize,
            _ => 0,
        };

        if self.format == "text" {
            if entries.is_empty() {
                return ok_text("No messages".to_string());
            }
            let body = entries
                .iter()
                .skip(skip)
                .map(|entry| format!("[{}] {}", entry.agent.as_str(), entry.message))
                .collect::<Vec<_>>()
                .join("\n");
            return ok_text(body);
        }
        let payload: Vec<serde_json::Value> = entries
            .iter()
            .skip(skip)
            .map(|entry| {
                serde_json::json!({
                    "agent": entry.agent.as_str(),
                    "message": entry.message,
                })
            })
            .collect();
        ok_json(serde_json::Value::Array(payload))
    }
}

impl ValidateLedgerTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let (_resolution, ledger) = match open_repo(context, self.root.as_deref()) {
            Ok(pair) => pair,
            Err(err) => return ok_json(err),
        };
        let report = validate_ledger(&ledger);

        if self.format == "text" {
            let mut out = String::new();
            for error in &report.errors {
                out.push_str(&format!("error: {}\n", error));
            }
            for warning in &report.warnings {
                out.push_str(&format!("warning: {}\n", warning));
            }
            if report.ok {
                out.push_str(&format!(
                    "Document is valid ({} warning(s))\n",
                    report.warnings.len()
                ));
            } else {
                out.push_str(&format!("Document has {} error(s)\n", report.errors.len()));
            }
            return ok_text(out.trim_end().to_string());
        }
        let payload = serde_json::to_value(&report)
            .map_err(|err| CallToolError::from_message(err.to_string()))?;
        ok_json(payload)
    }
}

impl ExportTasksTool {
    fn call(&self, context: &McpContext) -> Result<CallToolResult, CallToolError> {
        let (_resolution, ledger) = match open_repo(context, self.root.as_deref()) {
            Ok(pair) => pair,
            Err(err) => return ok_json(err),
        };
        match self.format.as_str() {
            "json" => ok_text(export_json(&ledger)),
            "jsonl" => ok_text(export_tasks_jsonl(&ledger)),
            other => ok_json(serde_json::json!({
                "error": format!("Unknown export format: {} (expected json or jsonl)", other)
            })),
        }
    }
}

fn default_format() -> String {
    "json".to_string()
}

fn default_priority() -> String {
    "medium".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn text_payload(result: CallToolResult) -> String {
        result
            .content
            .first()
            .expect("tool content")
            .as_text_content()
            .expect("text content")
            .text
            .clone()
    }

    const SEED: &str = r#"user_problem_statement: "Song request queue for live musicians"
backend:
  - task: "Request API"
    implemented: true
    working: "NA"
    file: "backend/server.py"
    stuck_count: 0
    priority: "high"
    needs_retesting: false
    status_history: []
frontend:
  - task: "Queue Panel"
    implemented: false
    working: "NA"
    file: "frontend/src/App.js"
    stuck_count: 0
    priority: "medium"
    needs_retesting: false
    status_history: []
metadata:
  created_by: "main_agent"
  version: "1.0"
  test_sequence: 0
  run_ui: false
test_plan:
  current_focus: []
  stuck_tasks: []
  test_all: false
  test_priority: "high_first"
agent_communication: []
"#;

    fn seed_repo() -> (TempDir, String, McpContext) {
        let temp = TempDir::new().expect("tempdir");
        std::fs::write(temp.path().join("punchlist.yaml"), SEED).expect("write ledger");
        let root_arg = temp.path().to_string_lossy().to_string();
        let context = McpContext {
            default_root: Some(temp.path().to_path_buf()),
        };
        (temp, root_arg, context)
    }

    #[test]
    fn mcp_version_reports_build_metadata() {
        let context = McpContext { default_root: None };
        let result = VersionTool {
            format: "json".to_string(),
        }
        .call(&context)
        .expect("version");
        let parsed: serde_json::Value = serde_json::from_str(&text_payload(result)).expect("json");
        assert_eq!(parsed["name"], "punchlist");
        assert_eq!(parsed["version"], env!("CARGO_PKG_VERSION"));
        assert!(parsed["full"]
            .as_str()
            .map(|full| full.starts_with(env!("CARGO_PKG_VERSION")))
            .unwrap_or(false));
    }

    #[test]
    fn mcp_list_tasks_filters_by_priority() {
        let (_temp, root_arg, context) = seed_repo();

        let all = ListTasksTool {
            root: Some(root_arg.clone()),
            section: None,
            working: None,
            priority: None,
            retest: None,
            stuck: false,
            format: "json".to_string(),
        }
        .call(&context)
        .expect("list");
        let parsed: serde_json::Value = serde_json::from_str(&text_payload(all)).expect("json");
        let tasks = parsed.as_array().expect("array");
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0]["section"], "backend");
        assert_eq!(tasks[0]["task"], "Request API");

        let high = ListTasksTool {
            root: Some(root_arg),
            section: None,
            working: None,
            priority: Some("high".to_string()),
            retest: None,
            stuck: false,
            format: "json".to_string(),
        }
        .call(&context)
        .expect("list high");
        let parsed: serde_json::Value = serde_json::from_str(&text_payload(high)).expect("json");
        let tasks = parsed.as_array().expect("array");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["task"], "Request API");
    }

    #[test]
    fn mcp_add_task_rejects_duplicates() {
        let (_temp, root_arg, context) = seed_repo();

        let added = AddTaskTool {
            section: "backend".to_string(),
            name: "Login Endpoint".to_string(),
            file: String::new(),
            priority: "critical".to_string(),
            root: Some(root_arg.clone()),
        }
        .call(&context)
        .expect("add");
        let parsed: serde_json::Value = serde_json::from_str(&text_payload(added)).expect("json");
        assert_eq!(parsed["implemented"], false);
        assert_eq!(parsed["working"], "NA");
        assert_eq!(parsed["priority"], "critical");

        let duplicate = AddTaskTool {
            section: "backend".to_string(),
            name: "Login Endpoint".to_string(),
            file: String::new(),
            priority: "low".to_string(),
            root: Some(root_arg),
        }
        .call(&context)
        .expect("duplicate call");
        let parsed: serde_json::Value =
            serde_json::from_str(&text_payload(duplicate)).expect("json");
        assert!(parsed["error"]
            .as_str()
            .map(|msg| msg.contains("already exists"))
            .unwrap_or(false));
    }

    #[test]
    fn mcp_record_status_tracks_recurrences() {
        let (_temp, root_arg, context) = seed_repo();

        let record = |working: &str, agent: &str, comment: &str| {
            let result = RecordStatusTool {
                task: "Queue Panel".to_string(),
                working: working.to_string(),
                comment: comment.to_string(),
                agent: Some(agent.to_string()),
                root: Some(root_arg.clone()),
            }
            .call(&context)
            .expect("record");
            let parsed: serde_json::Value =
                serde_json::from_str(&text_payload(result)).expect("json");
            parsed
        };

        let first = record("false", "user", "broken");
        assert_eq!(first["working"], false);
        assert_eq!(first["stuck_count"], 0);
        assert_eq!(first["status_history"].as_array().map(Vec::len), Some(1));

        record("true", "testing", "fixed");
        let third = record("false", "user", "broken again");
        assert_eq!(third["stuck_count"], 1);
        assert_eq!(third["stuck_incremented"], true);
    }

    #[test]
    fn mcp_missing_ledger_reports_soft_error() {
        let temp = TempDir::new().expect("tempdir");
        let context = McpContext {
            default_root: Some(temp.path().to_path_buf()),
        };
        let result = ListTasksTool {
            root: Some(temp.path().to_string_lossy().to_string()),
            section: None,
            working: None,
            priority: None,
            retest: None,
            stuck: false,
            format: "json".to_string(),
        }
        .call(&context)
        .expect("list");
        let parsed: serde_json::Value = serde_json::from_str(&text_payload(result)).expect("json");
        assert!(parsed["error"]
            .as_str()
            .map(|msg| msg.contains("No ledger document found under"))
            .unwrap_or(false));
    }
}
