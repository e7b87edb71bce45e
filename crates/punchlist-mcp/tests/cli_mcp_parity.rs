use std::collections::{BTreeSet, HashMap};
use std::process::Command;

use async_trait::async_trait;
use serial_test::serial;
use tempfile::TempDir;

use rust_mcp_sdk::schema::{
    CallToolRequestParams, CallToolResult, ClientCapabilities, Implementation,
    InitializeRequestParams, LATEST_PROTOCOL_VERSION,
};
use rust_mcp_sdk::{
    mcp_client::{client_runtime, ClientHandler, McpClientOptions},
    McpClient, StdioTransport, ToMcpClientHandler, TransportOptions,
};

struct NoopClientHandler;

#[async_trait]
impl ClientHandler for NoopClientHandler {}

fn client_details() -> InitializeRequestParams {
    InitializeRequestParams {
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "punchlist-mcp-parity".into(),
            version: "0.1.0".into(),
            title: Some("Punchlist MCP Parity".into()),
            description: Some("CLI/MCP parity test".into()),
            icons: vec![],
            website_url: None,
        },
        protocol_version: LATEST_PROTOCOL_VERSION.into(),
        meta: None,
    }
}

fn cli(home: &TempDir) -> Command {
    let mut command = if let Ok(path) = std::env::var("CARGO_BIN_EXE_punchlist") {
        Command::new(path)
    } else {
        let manifest_dir =
            std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
        let root = std::path::Path::new(&manifest_dir)
            .parent()
            .and_then(|path| path.parent())
            .expect("workspace root");
        Command::new(root.join("target").join("debug").join("punchlist"))
    };
    command.env("PUNCHLIST_HOME", home.path());
    command
}

fn tool_params(name: &str, args: serde_json::Value) -> CallToolRequestParams {
    CallToolRequestParams {
        name: name.to_string(),
        arguments: args.as_object().cloned(),
        meta: None,
        task: None,
    }
}

fn text_of(result: &CallToolResult) -> String {
    result
        .content
        .first()
        .expect("tool content")
        .as_text_content()
        .expect("text content")
        .text
        .clone()
}

fn task_names(text: &str) -> BTreeSet<String> {
    let value: serde_json::Value = serde_json::from_str(text).expect("json array");
    value
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|item| {
            let section = item.get("section").and_then(|v| v.as_str())?;
            let task = item.get("task").and_then(|v| v.as_str())?;
            Some(format!("{}/{}", section, task))
        })
        .collect()
}

#[tokio::test]
#[serial]
async fn cli_and_mcp_agree_on_list_plan_and_validate() {
    let home = TempDir::new().expect("home dir");
    let temp = TempDir::new().expect("tempdir");

    let seed_steps: [&[&str]; 5] = [
        &["init", "--problem", "Song request queue"],
        &["add", "backend", "Request API", "--priority", "high"],
        &["add", "frontend", "Queue Panel"],
        &[
            "record",
            "Request API",
            "--working",
            "false",
            "--comment",
            "rejects valid submissions",
            "--agent",
            "user",
        ],
        &["implemented", "Queue Panel"],
    ];
    for step in seed_steps {
        let output = cli(&home)
            .arg("--root")
            .arg(temp.path())
            .args(step)
            .output()
            .expect("cli seed step");
        assert!(
            output.status.success(),
            "seed step {:?} failed: {}",
            step,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let cli_list = cli(&home)
        .arg("--root")
        .arg(temp.path())
        .arg("list")
        .arg("--json")
        .output()
        .expect("cli list");
    assert!(cli_list.status.success());
    let cli_list_text = String::from_utf8_lossy(&cli_list.stdout).to_string();

    // plan check exits nonzero while the gate fails; stdout still carries the payload.
    let cli_check = cli(&home)
        .arg("--root")
        .arg(temp.path())
        .arg("plan")
        .arg("check")
        .arg("--json")
        .output()
        .expect("cli plan check");
    let cli_check_text = String::from_utf8_lossy(&cli_check.stdout).to_string();

    let cli_validate = cli(&home)
        .arg("--root")
        .arg(temp.path())
        .arg("validate")
        .arg("--json")
        .output()
        .expect("cli validate");
    assert!(cli_validate.status.success());
    let cli_validate_text = String::from_utf8_lossy(&cli_validate.stdout).to_string();

    let server_bin = env!("CARGO_BIN_EXE_punchlist-mcp");
    let transport = StdioTransport::create_with_server_launch(
        server_bin,
        vec!["--root".into(), temp.path().display().to_string()],
        Some(HashMap::from([(
            "PUNCHLIST_HOME".to_string(),
            home.path().display().to_string(),
        )])),
        TransportOptions::default(),
    )
    .expect("transport");

    let client = client_runtime::create_client(McpClientOptions {
        client_details: client_details(),
        transport,
        handler: NoopClientHandler.to_mcp_client_handler(),
        task_store: None,
        server_task_store: None,
    });

    client.clone().start().await.expect("start client");

    let mcp_list = client
        .request_tool_call(tool_params("list_tasks", serde_json::json!({})))
        .await
        .expect("mcp list");
    let mcp_list_text = text_of(&mcp_list);

    let mcp_check = client
        .request_tool_call(tool_params("plan_check", serde_json::json!({})))
        .await
        .expect("mcp plan check");
    let mcp_check_text = text_of(&mcp_check);

    let mcp_validate = client
        .request_tool_call(tool_params("validate_ledger", serde_json::json!({})))
        .await
        .expect("mcp validate");
    let mcp_validate_text = text_of(&mcp_validate);

    client.shut_down().await.expect("shutdown");

    assert_eq!(task_names(&cli_list_text), task_names(&mcp_list_text));

    let cli_check_json: serde_json::Value =
        serde_json::from_str(&cli_check_text).expect("cli check json");
    let mcp_check_json: serde_json::Value =
        serde_json::from_str(&mcp_check_text).expect("mcp check json");
    assert_eq!(cli_check_json["ok"], mcp_check_json["ok"]);
    assert_eq!(cli_check_json["ok"], false);
    assert_eq!(
        cli_check_json["missing_focus"],
        mcp_check_json["missing_focus"]
    );
    assert_eq!(
        cli_check_json["missing_focus"],
        serde_json::json!(["frontend/Queue Panel"])
    );

    let cli_validate_json: serde_json::Value =
        serde_json::from_str(&cli_validate_text).expect("cli validate json");
    let mcp_validate_json: serde_json::Value =
        serde_json::from_str(&mcp_validate_text).expect("mcp validate json");
    assert_eq!(cli_validate_json["ok"], true);
    assert_eq!(cli_validate_json["ok"], mcp_validate_json["ok"]);
}
