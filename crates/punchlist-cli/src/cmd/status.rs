//! `punchlist status`: per-section counts and the state of the plan gate.

use std::path::Path;

use anyhow::Result;
use punchlist_core::ops::summarize;
use punchlist_core::plan::check_plan;
use serde_json::json;

use super::{open_ledger, OutputMode};

pub fn run_status(output: OutputMode, root: &Path) -> Result<()> {
    let (_resolution, ledger) = open_ledger(root)?;
    let sections = summarize(&ledger);
    let check = check_plan(&ledger);

    if output.is_json() {
        let mut section_map = serde_json::Map::new();
        for (name, counts) in &sections {
            section_map.insert(
                name.to_string(),
                json!({
                    "total": counts.total,
                    "working": counts.working,
                    "broken": counts.broken,
                    "untested": counts.untested,
                    "needs_retesting": counts.needs_retesting,
                    "stuck": counts.stuck,
                }),
            );
        }
        let payload = json!({
            "sections": section_map,
            "plan_ok": check.ok,
            "missing_focus": check.missing_focus,
            "current_focus": ledger.test_plan.current_focus,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if !ledger.problem_statement.is_empty() {
        println!("{}", ledger.problem_statement);
        println!();
    }
    for (name, counts) in &sections {
        println!(
            "{}: {} tasks | working {} | broken {} | untested {} | retest {} | stuck {}",
            name,
            counts.total,
            counts.working,
            counts.broken,
            counts.untested,
            counts.needs_retesting,
            counts.stuck
        );
    }
    if check.ok {
        println!("plan: ok");
    } else {
        println!(
            "plan: {} task(s) need retesting but are not in current_focus",
            check.missing_focus.len()
        );
    }
    Ok(())
}
