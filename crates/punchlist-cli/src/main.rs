mod cmd;
mod version;

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cmd::OutputMode;

#[derive(Parser, Debug)]
#[command(
    name = "punchlist",
    version = version::FULL,
    about = "Status ledger for features built and tested by cooperating agents"
)]
struct Cli {
    /// Repo root or ledger file to operate on. Defaults to the current directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Emit JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Act as this agent: main, testing, or user. Overrides configuration.
    #[arg(long, global = true)]
    agent: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the ledger document for this repo
    Init(cmd::init::InitArgs),
    /// Add a task to the backend or frontend section
    Add(cmd::add::AddArgs),
    /// Append a status entry to a task's history
    Record(cmd::record::RecordArgs),
    /// Mark a task implemented and flag it for verification
    Implemented(cmd::mark::ImplementedArgs),
    /// Flag a task for retesting
    Retest(cmd::mark::RetestArgs),
    /// Report a recurrence of a previously fixed failure
    Stuck(cmd::mark::StuckArgs),
    /// Record a testing-agent confirmation that a stuck task now works
    Resolve(cmd::mark::ResolveArgs),
    /// List tasks with optional filters
    List(cmd::list::ListArgs),
    /// Show one task with its full history
    Show(cmd::show::ShowArgs),
    /// Summarize both sections and the plan gate
    Status,
    /// Manage the current test focus
    Focus {
        #[command(subcommand)]
        command: cmd::focus::FocusCommand,
    },
    /// Sync or check the test plan; check fails when retests lack focus
    Plan {
        #[command(subcommand)]
        command: cmd::plan::PlanCommand,
    },
    /// Post a message to the agent communication log
    Say(cmd::comm::SayArgs),
    /// Show the agent communication log
    Comm(cmd::comm::CommArgs),
    /// Check document integrity
    Validate,
    /// Print a machine-readable diagnostics report
    Doctor,
    /// Export the ledger as JSON or JSONL
    Export(cmd::export::ExportArgs),
    /// Print version information
    Version,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PUNCHLIST_LOG")
        .unwrap_or_else(|_| EnvFilter::new("punchlist=info,warn"));

    let format = env::var("PUNCHLIST_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let root = cmd::resolve_root(cli.root.as_deref())?;
    let output = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let agent = cli.agent.as_deref();

    let passed = match cli.command {
        Some(Commands::Init(args)) => {
            cmd::init::run_init(&args, agent, output, &root)?;
            true
        }
        Some(Commands::Add(args)) => {
            cmd::add::run_add(&args, agent, output, &root)?;
            true
        }
        Some(Commands::Record(args)) => {
            cmd::record::run_record(&args, agent, output, &root)?;
            true
        }
        Some(Commands::Implemented(args)) => {
            cmd::mark::run_implemented(&args, agent, output, &root)?;
            true
        }
        Some(Commands::Retest(args)) => {
            cmd::mark::run_retest(&args, agent, output, &root)?;
            true
        }
        Some(Commands::Stuck(args)) => {
            cmd::mark::run_stuck(&args, agent, output, &root)?;
            true
        }
        Some(Commands::Resolve(args)) => {
            cmd::mark::run_resolve(&args, agent, output, &root)?;
            true
        }
        Some(Commands::List(args)) => {
            cmd::list::run_list(&args, output, &root)?;
            true
        }
        Some(Commands::Show(args)) => {
            cmd::show::run_show(&args, output, &root)?;
            true
        }
        Some(Commands::Status) => {
            cmd::status::run_status(output, &root)?;
            true
        }
        Some(Commands::Focus { command }) => {
            cmd::focus::run_focus(&command, agent, output, &root)?;
            true
        }
        Some(Commands::Plan { command }) => cmd::plan::run_plan(&command, agent, output, &root)?,
        Some(Commands::Say(args)) => {
            cmd::comm::run_say(&args, agent, output, &root)?;
            true
        }
        Some(Commands::Comm(args)) => {
            cmd::comm::run_comm(&args, output, &root)?;
            true
        }
        Some(Commands::Validate) => cmd::validate::run_validate(output, &root)?,
        Some(Commands::Doctor) => {
            cmd::doctor::run_doctor(output, &root)?;
            true
        }
        Some(Commands::Export(args)) => {
            cmd::export::run_export(&args, &root)?;
            true
        }
        Some(Commands::Version) => {
            println!("punchlist {}", version::FULL);
            true
        }
        None => {
            Cli::command().print_help()?;
            println!();
            true
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
