// Copyright 2026 Pairwatch Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pairwatch_runtime::cli;
use pairwatch_runtime::config::interval_from_minutes;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pairwatch",
    about = "Pairwatch: supervised trading-pair listing capture",
    version,
    after_help = "Run 'pairwatch <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Snapshot directory (overrides PAIRWATCH_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the acquisition loop in the foreground
    Daemon {
        /// Run a single tick and exit
        #[arg(long)]
        once: bool,
        /// Minutes between ticks (overrides PAIRWATCH_SCRAPE_INTERVAL_MINUTES)
        #[arg(long)]
        interval_minutes: Option<u64>,
    },
    /// Acquire once and commit, without metrics or alerts
    Scrape,
    /// Show snapshot health and daemon metrics
    Status,
    /// Print the snapshot a reader would be served
    Snapshot {
        /// Show at most this many records
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Manage snapshot backups
    Backups {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Merge a records or snapshot file into the canonical snapshot
    Merge {
        /// JSON file holding a record array or a snapshot
        file: PathBuf,
    },
    /// Run extraction against a saved page
    Replay {
        /// Saved HTML file
        file: PathBuf,
        /// URL the page was captured from
        #[arg(long)]
        url: Option<String>,
        /// Commit extracted records to the snapshot
        #[arg(long)]
        commit: bool,
    },
    /// Send a test alert through the configured webhook
    AlertTest {
        #[arg(long, default_value = "Test alert")]
        title: String,
        #[arg(long, default_value = "This is a test alert from pairwatch.")]
        body: String,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    /// List backups, newest first
    List,
    /// Restore a backup over the canonical snapshot
    Restore {
        /// Backup file name (e.g. coins.json.bak.1700000000000)
        name: String,
    },
    /// Parse every backup and report failures
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    cli::output::configure(args.json, args.quiet);
    cli::init_tracing(args.verbose);

    let mut config = cli::load_config(args.data_dir.as_deref());

    let result = match args.command {
        Commands::Daemon {
            once,
            interval_minutes,
        } => {
            config.run_once |= once;
            if let Some(minutes) = interval_minutes {
                config.interval = interval_from_minutes(minutes);
            }
            cli::start::run(config).await
        }
        Commands::Scrape => cli::scrape_cmd::run(&config).await,
        Commands::Status => cli::status::run(&config).await,
        Commands::Snapshot { limit } => cli::snapshot_cmd::run(&config, limit).await,
        Commands::Backups { action } => match action {
            BackupAction::List => cli::backups_cmd::run_list(&config).await,
            BackupAction::Restore { name } => cli::backups_cmd::run_restore(&config, &name).await,
            BackupAction::Validate => cli::backups_cmd::run_validate(&config).await,
        },
        Commands::Merge { file } => cli::merge_cmd::run(&config, &file).await,
        Commands::Replay { file, url, commit } => {
            cli::replay_cmd::run(&config, &file, url.as_deref(), commit).await
        }
        Commands::AlertTest { title, body } => cli::alert_cmd::run(&config, &title, &body).await,
        Commands::Doctor => cli::doctor::run(&config).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "pairwatch", &mut std::io::stdout());
            Ok(())
        }
    };

    // 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}
