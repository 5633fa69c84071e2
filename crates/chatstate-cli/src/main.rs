use std::path::PathBuf;

use anyhow::Result;
use chatstate_cli::cli::{init_tracing, inspect, load_actions, load_snapshot, replay, Report, ReplayOptions};
use chatstate_core::models::FolderId;
use chatstate_core::CoreConfig;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatstate")]
#[command(about = "Replay chat state snapshots and actions through the folder manager")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON core config file (camelCase keys, missing keys use defaults)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply actions to a snapshot and report every folder
    Replay {
        /// GlobalState snapshot (JSON)
        snapshot: PathBuf,

        /// JSON array of actions to dispatch in order
        #[arg(long, short = 'a')]
        actions: Option<PathBuf>,

        /// Wait for the throttled folder update instead of forcing the last pass
        #[arg(long)]
        settle: bool,

        /// Check the incremental results against a full rebuild
        #[arg(long)]
        verify: bool,
    },

    /// Report the folders of a snapshot without applying anything
    Inspect {
        /// GlobalState snapshot (JSON)
        snapshot: PathBuf,

        /// Only report this folder
        #[arg(long, short = 'f', allow_hyphen_values = true)]
        folder: Option<FolderId>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Warning: {:#}", e);
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };

    let report = match cli.command {
        Commands::Replay {
            snapshot,
            actions,
            settle,
            verify,
        } => {
            let state = load_snapshot(&snapshot)?;
            let actions = match actions {
                Some(path) => load_actions(&path)?,
                None => Vec::new(),
            };
            let report = replay(state, actions, &config, ReplayOptions { settle, verify })?;
            if report.matches_full_rebuild == Some(false) {
                print_report(&report, cli.pretty)?;
                anyhow::bail!("incremental folder results differ from a full rebuild");
            }
            report
        }
        Commands::Inspect { snapshot, folder } => {
            let state = load_snapshot(&snapshot)?;
            let mut report = inspect(&state);
            if let Some(folder_id) = folder {
                report.folders.retain(|folder| folder.id == folder_id);
                if report.folders.is_empty() {
                    anyhow::bail!("Unknown folder: {}", folder_id);
                }
            }
            report
        }
    };

    print_report(&report, cli.pretty)
}

fn print_report(report: &Report, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    println!("{}", output);
    Ok(())
}
