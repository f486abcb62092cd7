//! Reciprocity CLI
//!
//! Completes one-sided Prisma relations in place:
//! - `reconcile` inserts every missing reciprocal field (after writing a backup)
//! - `check` plans the same edits without writing anything

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use reciprocity_reconcile::{plan_reconcile, reconcile};
use reciprocity_storage::{FsSchemaStore, SchemaStore, StoreConfig};

mod summary;

#[derive(Parser)]
#[command(name = "reciprocity")]
#[command(
    author,
    version,
    about = "Reciprocity: add the missing side of one-sided Prisma relations"
)]
struct Cli {
    /// Log verbosity (`-v` info, `-vv` debug). Logs go to stderr.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct StoreArgs {
    /// Schema file (default: apps/api/prisma/schema.prisma)
    #[arg(long)]
    schema: Option<PathBuf>,
    /// JSON config file (`schema_path`, `backup_extension`)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert every missing reciprocal relation field.
    ///
    /// The schema is copied to its backup before anything is written.
    Reconcile {
        #[command(flatten)]
        store: StoreArgs,
        /// Extension replacing the schema's own for the backup file
        #[arg(long)]
        backup_extension: Option<String>,
    },

    /// Report the edits `reconcile` would make. Exits 1 when there are any.
    Check {
        #[command(flatten)]
        store: StoreArgs,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Reconcile {
            store,
            backup_extension,
        } => {
            let config = store_config(&store, backup_extension.as_deref())?;
            cmd_reconcile(config, store.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { store } => {
            let config = store_config(&store, None)?;
            cmd_check(config, store.json)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Defaults, then `--config`, then explicit flags.
fn store_config(args: &StoreArgs, backup_extension: Option<&str>) -> Result<StoreConfig> {
    let mut config = match &args.config {
        Some(path) => StoreConfig::from_json_file(path)?,
        None => StoreConfig::default(),
    };
    if let Some(schema) = &args.schema {
        config.schema_path = schema.clone();
    }
    if let Some(extension) = backup_extension {
        config.backup_extension = extension.to_string();
    }
    Ok(config)
}

fn cmd_reconcile(config: StoreConfig, json: bool) -> Result<()> {
    let mut store = FsSchemaStore::new(config);
    let report = reconcile(&mut store)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.is_noop() && report.skipped.is_empty() {
        println!("No edits necessary");
    } else {
        println!(
            "{} {} opposite relation insertions ({} skipped); backup at {}",
            "Applied".green().bold(),
            report.insertions_applied,
            report.insertions_skipped(),
            store.backup_path().display()
        );
    }
    summary::print_report(&report);
    Ok(())
}

fn cmd_check(config: StoreConfig, json: bool) -> Result<ExitCode> {
    let store = FsSchemaStore::new(config);
    let text = store.load_schema_text()?;
    let plan = plan_reconcile(&text)?;
    let pending = plan.text != text;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan.report)?);
    } else {
        if pending {
            println!(
                "{} {} opposite relation insertions ({} skipped) pending in {}",
                "Would apply".yellow().bold(),
                plan.report.insertions_applied,
                plan.report.insertions_skipped(),
                store.schema_path().display()
            );
        } else {
            println!("No edits necessary");
        }
        summary::print_report(&plan.report);
    }

    Ok(if pending {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}
