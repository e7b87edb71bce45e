use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_punchlist"))
}

fn run(repo: &TempDir, home: &TempDir, args: &[&str]) -> std::process::Output {
    bin()
        .arg("--root")
        .arg(repo.path())
        .env("PUNCHLIST_HOME", home.path())
        .args(args)
        .output()
        .expect("command")
}

fn seed(repo: &TempDir, home: &TempDir) {
    for args in [
        vec!["init", "--problem", "Song request queue"],
        vec!["add", "backend", "Request API", "--priority", "high"],
        vec!["add", "backend", "Dedup Guard", "--priority", "low"],
        vec!["add", "frontend", "Queue Panel"],
    ] {
        let out = run(repo, home, &args);
        assert!(out.status.success(), "failed: {:?}", args);
    }
}

#[test]
fn list_filters_by_section_priority_and_state() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");
    seed(&repo, &home);

    let all = run(&repo, &home, &["list", "--json"]);
    assert!(all.status.success());
    let tasks: Value = serde_json::from_slice(&all.stdout).expect("json");
    assert_eq!(tasks.as_array().map(|a| a.len()), Some(3));
    // Backend tasks come first, in insertion order.
    assert_eq!(tasks[0]["task"], "Request API");
    assert_eq!(tasks[2]["section"], "frontend");

    let backend = run(&repo, &home, &["list", "--section", "backend", "--json"]);
    let tasks: Value = serde_json::from_slice(&backend.stdout).expect("json");
    assert_eq!(tasks.as_array().map(|a| a.len()), Some(2));

    let high = run(&repo, &home, &["list", "--priority", "high", "--json"]);
    let tasks: Value = serde_json::from_slice(&high.stdout).expect("json");
    assert_eq!(tasks.as_array().map(|a| a.len()), Some(1));
    assert_eq!(tasks[0]["task"], "Request API");

    let record = bin()
        .arg("--root")
        .arg(repo.path())
        .env("PUNCHLIST_HOME", home.path())
        .arg("--agent")
        .arg("user")
        .arg("record")
        .arg("Queue Panel")
        .arg("--working")
        .arg("false")
        .arg("--comment")
        .arg("panel renders empty")
        .output()
        .expect("record");
    assert!(record.status.success());

    let broken = run(&repo, &home, &["list", "--working", "false", "--json"]);
    let tasks: Value = serde_json::from_slice(&broken.stdout).expect("json");
    assert_eq!(tasks.as_array().map(|a| a.len()), Some(1));
    assert_eq!(tasks[0]["task"], "Queue Panel");

    let untested = run(&repo, &home, &["list", "--working", "NA", "--json"]);
    let tasks: Value = serde_json::from_slice(&untested.stdout).expect("json");
    assert_eq!(tasks.as_array().map(|a| a.len()), Some(2));
}

#[test]
fn retest_flag_is_idempotent() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");
    seed(&repo, &home);

    let first = run(&repo, &home, &["retest", "Request API", "--json"]);
    assert!(first.status.success());
    let flagged: Value = serde_json::from_slice(&first.stdout).expect("json");
    assert_eq!(flagged["changed"], true);
    assert_eq!(flagged["needs_retesting"], true);

    let second = run(&repo, &home, &["retest", "Request API", "--json"]);
    assert!(second.status.success());
    let again: Value = serde_json::from_slice(&second.stdout).expect("json");
    assert_eq!(again["changed"], false);
    assert_eq!(again["needs_retesting"], true);

    let listed = run(&repo, &home, &["list", "--retest", "--json"]);
    let tasks: Value = serde_json::from_slice(&listed.stdout).expect("json");
    assert_eq!(tasks.as_array().map(|a| a.len()), Some(1));
}

#[test]
fn stuck_tasks_surface_in_list_and_plan() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");
    seed(&repo, &home);

    let out = run(&repo, &home, &["stuck", "Dedup Guard", "--json"]);
    assert!(out.status.success());
    let stuck: Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(stuck["stuck_count"], 1);

    let listed = run(&repo, &home, &["list", "--stuck", "--json"]);
    let tasks: Value = serde_json::from_slice(&listed.stdout).expect("json");
    assert_eq!(tasks.as_array().map(|a| a.len()), Some(1));
    assert_eq!(tasks[0]["task"], "Dedup Guard");

    // The manual report also lands in test_plan.stuck_tasks.
    let text = std::fs::read_to_string(repo.path().join("punchlist.yaml")).expect("ledger");
    assert!(text.contains("stuck_tasks"));
    assert!(text.contains("Dedup Guard"));

    let resolve = run(
        &repo,
        &home,
        &["resolve", "Dedup Guard", "--comment", "replayed imports, clean", "--json"],
    );
    assert!(resolve.status.success());
    let resolved: Value = serde_json::from_slice(&resolve.stdout).expect("json");
    assert_eq!(resolved["stuck_count"], 0);

    let listed = run(&repo, &home, &["list", "--stuck", "--json"]);
    let tasks: Value = serde_json::from_slice(&listed.stdout).expect("json");
    assert_eq!(tasks.as_array().map(|a| a.len()), Some(0));
}

#[test]
fn validate_passes_on_clean_repo_and_fails_on_empty_name() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");
    seed(&repo, &home);

    let ok = run(&repo, &home, &["validate", "--json"]);
    assert!(ok.status.success());
    let report: Value = serde_json::from_slice(&ok.stdout).expect("json");
    assert_eq!(report["ok"], true);

    // Hand-edited document with a nameless task.
    let path = repo.path().join("punchlist.yaml");
    let text = std::fs::read_to_string(&path).expect("ledger");
    let broken = text.replace("task: Dedup Guard", "task: \"\"");
    std::fs::write(&path, broken).expect("write");

    let bad = run(&repo, &home, &["validate", "--json"]);
    assert!(!bad.status.success(), "empty name must fail validation");
    let report: Value = serde_json::from_slice(&bad.stdout).expect("json");
    assert_eq!(report["ok"], false);
    assert!(report["errors"].as_array().map(|e| !e.is_empty()).unwrap_or(false));
}
