//! `punchlist doctor`: machine-readable diagnostics.

use std::path::Path;

use anyhow::Result;
use punchlist_core::doctor::doctor_report;

use super::OutputMode;

pub fn run_doctor(_output: OutputMode, root: &Path) -> Result<()> {
    // Diagnostics are JSON either way; agents are the primary audience.
    let report = doctor_report(root, "punchlist");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
