//! fmpilot CLI
//!
//! Drives the Manage Database dialog from the command line. Every command
//! prints one JSON line on stdout; logs go to stderr.
//!
//! Usage:
//!   fmpilot read --save fields.json
//!   fmpilot fix suggestions.json
//!   fmpilot create '[{"name": "Total", "type": "計算"}]'
//!   fmpilot reset --yes
//!   fmpilot finalize

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fmpilot::model::{parse_fixes, parse_records, StatusReport};
use fmpilot::{AppProfile, BatchRunner, Desktop, StatusFile};
use serde::Serialize;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

mod utils;

use crate::utils::{init_logging, load_json_input};

#[derive(Parser, Debug)]
#[command(name = "fmpilot")]
#[command(about = "Automate the Manage Database dialog of FileMaker Pro")]
struct Cli {
    /// Application profile (YAML, or JSON by extension)
    #[arg(long, global = true, env = "FMPILOT_PROFILE")]
    profile: Option<PathBuf>,

    /// File an overlay process polls for progress messages
    #[arg(long, global = true, env = "FMPILOT_STATUS_FILE")]
    status_file: Option<PathBuf>,

    /// Leave keyboard and mouse usable while automating
    #[arg(long, global = true)]
    no_input_lock: bool,

    /// error, warn, info, debug or trace
    #[arg(long, global = true, env = "LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Dialog(DialogCommand),
    /// Print the effective profile as YAML
    Profile,
}

/// Commands that drive the running application.
#[derive(Subcommand, Debug)]
enum DialogCommand {
    /// Read every field of the current table
    Read {
        /// Also write the fields to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Rename, retype and comment fields
    Fix {
        /// JSON fixes or suggestions, inline or as a file path
        input: String,
        /// Refuse the whole batch when names would clash
        #[arg(long)]
        strict: bool,
    },
    /// Create fields
    Create {
        /// JSON field records, inline or as a file path
        input: String,
    },
    /// Delete every field of the current table
    Reset {
        #[arg(long)]
        yes: bool,
    },
    /// Dismiss alerts and press OK on the dialog
    Finalize,
    /// Close option and calculation dialogs left open
    ClosePopups,
    /// Open the dialog on the fields tab
    OpenDialog,
}

fn load_profile(path: Option<&PathBuf>) -> Result<AppProfile> {
    match path {
        Some(path) => AppProfile::load(path)
            .with_context(|| format!("failed to load profile {}", path.display())),
        None => Ok(AppProfile::default()),
    }
}

fn to_json<T: Serialize>(report: &T) -> Result<Value> {
    serde_json::to_value(report).context("failed to serialize result")
}

async fn run(cli: &Cli, command: &DialogCommand, profile: AppProfile) -> Result<Value> {
    let desktop = Desktop::new().context("failed to connect to UI Automation")?;
    let mut runner = BatchRunner::new(desktop, profile).with_input_lock(!cli.no_input_lock);
    if let Some(path) = &cli.status_file {
        runner = runner.with_status_file(StatusFile::new(path));
    }

    match command {
        DialogCommand::Read { save } => {
            let report = runner.read_fields().await?;
            if let Some(path) = save {
                let content = serde_json::to_string_pretty(&report.fields)?;
                fs::write(path, content)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!("saved {} fields to {}", report.fields.len(), path.display());
            }
            to_json(&report)
        }
        DialogCommand::Fix { input, strict } => {
            let fixes = parse_fixes(load_json_input(input)?)?;
            info!("loaded {} fixes", fixes.len());
            to_json(&runner.apply_fixes(&fixes, *strict).await?)
        }
        DialogCommand::Create { input } => {
            let records = parse_records(load_json_input(input)?)?;
            to_json(&runner.create_fields(&records).await?)
        }
        DialogCommand::Reset { yes } => {
            if !yes {
                bail!("reset deletes every field; pass --yes to confirm");
            }
            to_json(&runner.reset_fields().await?)
        }
        DialogCommand::Finalize => {
            runner.finalize().await?;
            to_json(&StatusReport::ok())
        }
        DialogCommand::ClosePopups => {
            let closed = runner.close_popups().await?;
            Ok(json!({ "success": true, "closed": closed }))
        }
        DialogCommand::OpenDialog => {
            runner.open_dialog().await?;
            to_json(&StatusReport::ok())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_level.as_deref()) {
        eprintln!("{e:#}");
    }

    let profile = match load_profile(cli.profile.as_ref()) {
        Ok(profile) => profile,
        Err(e) => return fail(&e),
    };

    let command = match &cli.command {
        Commands::Dialog(command) => command,
        Commands::Profile => {
            return match profile.to_yaml() {
                Ok(yaml) => {
                    print!("{yaml}");
                    ExitCode::SUCCESS
                }
                Err(e) => fail(&e.into()),
            };
        }
    };

    match run(&cli, command, profile).await {
        Ok(result) => {
            println!("{result}");
            if result["success"].as_bool().unwrap_or(false) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => fail(&e),
    }
}

fn fail(e: &anyhow::Error) -> ExitCode {
    error!("{:#}", e);
    println!("{}", json!({ "success": false, "error": format!("{e:#}") }));
    ExitCode::FAILURE
}
