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

#[test]
fn plan_check_gates_on_focus_coverage() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");

    for args in [
        vec!["init"],
        vec!["add", "backend", "Request API"],
        vec!["add", "frontend", "Queue Panel"],
    ] {
        let out = run(&repo, &home, &args);
        assert!(out.status.success(), "failed: {:?}", args);
    }

    // Marking implemented flags the task for verification.
    let out = run(&repo, &home, &["implemented", "Request API"]);
    assert!(out.status.success());

    let check = run(&repo, &home, &["plan", "check", "--json"]);
    assert!(!check.status.success(), "uncovered retest must fail the gate");
    let checked: Value = serde_json::from_slice(&check.stdout).expect("json");
    assert_eq!(checked["ok"], false);
    assert_eq!(checked["missing_focus"][0], "backend/Request API");

    let sync = run(&repo, &home, &["plan", "sync", "--json"]);
    assert!(sync.status.success());
    let synced: Value = serde_json::from_slice(&sync.stdout).expect("json");
    assert_eq!(synced["added_focus"][0], "Request API");

    let recheck = run(&repo, &home, &["plan", "check", "--json"]);
    assert!(recheck.status.success());
    let rechecked: Value = serde_json::from_slice(&recheck.stdout).expect("json");
    assert_eq!(rechecked["ok"], true);

    // A testing entry clears the flag; focus list stays as the operator left it.
    let record = bin()
        .arg("--root")
        .arg(repo.path())
        .env("PUNCHLIST_HOME", home.path())
        .arg("--agent")
        .arg("testing")
        .arg("record")
        .arg("Request API")
        .arg("--working")
        .arg("true")
        .arg("--comment")
        .arg("verified")
        .arg("--json")
        .output()
        .expect("record");
    assert!(record.status.success());
    let recorded: Value = serde_json::from_slice(&record.stdout).expect("json");
    assert_eq!(recorded["needs_retesting"], false);
    assert_eq!(recorded["retest_cleared"], true);

    let focus = run(&repo, &home, &["focus", "show", "--json"]);
    assert!(focus.status.success());
    let entries: Value = serde_json::from_slice(&focus.stdout).expect("json");
    assert_eq!(entries.as_array().map(|a| a.len()), Some(1));
}

#[test]
fn focus_subcommands_edit_the_list() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");

    for args in [
        vec!["init"],
        vec!["add", "backend", "Auth"],
        vec!["add", "backend", "Sessions"],
    ] {
        let out = run(&repo, &home, &args);
        assert!(out.status.success());
    }

    let set = run(&repo, &home, &["focus", "set", "Auth", "Sessions", "auth"]);
    assert!(set.status.success());

    // Case-insensitive duplicates collapse on set.
    let show = run(&repo, &home, &["focus", "show", "--json"]);
    let entries: Value = serde_json::from_slice(&show.stdout).expect("json");
    assert_eq!(entries.as_array().map(|a| a.len()), Some(2));

    let add_again = run(&repo, &home, &["focus", "add", "Auth", "--json"]);
    assert!(add_again.status.success());
    let added: Value = serde_json::from_slice(&add_again.stdout).expect("json");
    assert_eq!(added["added"], false);

    let clear = run(&repo, &home, &["focus", "clear", "--json"]);
    assert!(clear.status.success());
    let cleared: Value = serde_json::from_slice(&clear.stdout).expect("json");
    assert_eq!(cleared["removed"], 2);

    // Unknown focus entries surface in check output but do not fail the gate.
    let set_ghost = run(&repo, &home, &["focus", "set", "Ghost Task"]);
    assert!(set_ghost.status.success());
    let check = run(&repo, &home, &["plan", "check", "--json"]);
    assert!(check.status.success());
    let checked: Value = serde_json::from_slice(&check.stdout).expect("json");
    assert_eq!(checked["ok"], true);
    assert_eq!(checked["unknown_focus"][0], "Ghost Task");
}

#[test]
fn status_reports_counts_and_gate() {
    let repo = TempDir::new().expect("repo");
    let home = TempDir::new().expect("home");

    for args in [
        vec!["init", "--problem", "Song requests"],
        vec!["add", "backend", "Request API"],
        vec!["add", "frontend", "Queue Panel"],
        vec!["implemented", "Queue Panel"],
    ] {
        let out = run(&repo, &home, &args);
        assert!(out.status.success());
    }

    let status = run(&repo, &home, &["status", "--json"]);
    assert!(status.status.success());
    let report: Value = serde_json::from_slice(&status.stdout).expect("json");
    assert_eq!(report["sections"]["backend"]["total"], 1);
    assert_eq!(report["sections"]["frontend"]["total"], 1);
    assert_eq!(report["sections"]["frontend"]["needs_retesting"], 1);
    assert_eq!(report["plan_ok"], false);
    assert_eq!(report["missing_focus"][0], "frontend/Queue Panel");
}
