//! `punchlist validate`: document integrity checks.

use std::path::Path;

use anyhow::Result;
use punchlist_core::validate::validate_ledger;

use super::{open_ledger, OutputMode};

/// Returns whether the document is valid. Warnings alone do not fail.
pub fn run_validate(output: OutputMode, root: &Path) -> Result<bool> {
    let (_resolution, ledger) = open_ledger(root)?;
    let report = validate_ledger(&ledger);

    if output.is_json() {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.ok);
    }

    for error in &report.errors {
        println!("error: {}", error);
    }
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    if report.ok {
        println!("Document is valid ({} warning(s))", report.warnings.len());
    } else {
        println!("Document has {} error(s)", report.errors.len());
    }
    Ok(report.ok)
}
