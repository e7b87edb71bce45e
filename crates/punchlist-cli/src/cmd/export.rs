//! `punchlist export`: dump the ledger for external tooling.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use punchlist_core::export::{export_json, export_tasks_jsonl};

use super::open_ledger;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output format: json (whole document) or jsonl (one task per line).
    #[arg(long, default_value = "json")]
    pub format: String,

    /// Write to a file instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn run_export(args: &ExportArgs, root: &Path) -> Result<()> {
    let (_resolution, ledger) = open_ledger(root)?;
    let text = match args.format.as_str() {
        "json" => export_json(&ledger),
        "jsonl" => export_tasks_jsonl(&ledger),
        other => anyhow::bail!("Unknown export format: {} (expected json or jsonl)", other),
    };

    match args.output.as_ref() {
        Some(path) => {
            std::fs::write(path, &text)?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}
