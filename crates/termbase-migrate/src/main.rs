//! termbase legacy import CLI
//!
//! CLI tool for importing legacy terminology exports into termbase.
//! Pedantic lints relaxed for CLI ergonomics.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use termbase_core::{BackgroundIndexer, MemoryStore};
use termbase_migrate::{Environment, ImportConfig, ImporterKind, Pipeline};

#[derive(Parser)]
#[command(name = "termbase-migrate")]
#[command(version)]
#[command(about = "Import legacy terminology exports into termbase", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (debug logs, full record lists in the report)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an import from a config file
    Run {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Run an import from command-line arguments
    Import {
        /// Importer name (see `kinds`)
        importer: String,

        /// Input file path or http(s) URL
        input: String,

        /// Store snapshot loaded before and saved after the run
        #[arg(long, env = "TERMBASE_SNAPSHOT", value_name = "FILE")]
        snapshot: Option<PathBuf>,

        /// Legacy API environment (production, staging, qa, demo)
        #[arg(long)]
        legacy_env: Option<String>,

        /// Legacy API base URL; wins over --legacy-env
        #[arg(long)]
        legacy_base_url: Option<String>,

        /// Retry reference lookups without the version suffix
        #[arg(long)]
        drop_version_if_version_missing: bool,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Validate configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// List importers and their buckets
    Kinds,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run { config } => {
            info!("Loading configuration from {:?}", config);
            let mut config = ImportConfig::from_file(&config)?;
            if cli.verbose {
                config.options.verbose = true;
            }
            run_import(config).await?;
        }
        Commands::Import {
            importer,
            input,
            snapshot,
            legacy_env,
            legacy_base_url,
            drop_version_if_version_missing,
            no_progress,
        } => {
            let mut config = ImportConfig::new(importer, input);
            config.store.snapshot = snapshot;
            config.legacy_api.environment =
                legacy_env.as_deref().map(str::parse::<Environment>).transpose()?;
            config.legacy_api.base_url = legacy_base_url;
            config.options.drop_version_if_version_missing = drop_version_if_version_missing;
            config.options.show_progress = !no_progress;
            config.options.verbose = cli.verbose;
            run_import(config).await?;
        }
        Commands::Validate { config } => {
            validate_config(&config)?;
        }
        Commands::Kinds => {
            list_kinds();
        }
    }

    Ok(())
}

async fn run_import(config: ImportConfig) -> anyhow::Result<()> {
    config.validate()?;

    let store = Arc::new(match &config.store.snapshot {
        Some(path) => MemoryStore::open(path)?,
        None => {
            warn!("No snapshot configured, imported rows will not be persisted");
            MemoryStore::new()
        }
    });
    let indexer = Arc::new(BackgroundIndexer::spawn()?);

    let pipeline = Pipeline::from_config(&config, store.clone(), indexer.clone())?;
    let report = pipeline.run().await?;
    drop(pipeline);

    if let Some(path) = &config.store.snapshot {
        store.save(path)?;
    }
    match Arc::try_unwrap(indexer) {
        Ok(indexer) => {
            let dropped = indexer.dropped();
            if dropped > 0 {
                warn!("Index queue was full, {} tasks dropped", dropped);
            }
            let handled = indexer.shutdown();
            info!("Indexer handled {} tasks", handled);
        }
        Err(_) => warn!("Indexer still shared, skipping shutdown"),
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&report.to_json(config.options.verbose))?
    );

    Ok(())
}

fn validate_config(config_path: &Path) -> anyhow::Result<()> {
    info!("Validating configuration from {:?}", config_path);

    let config = ImportConfig::from_file(config_path)?;
    config.validate()?;

    println!("✅ Configuration is valid!");
    println!("   Importer: {}", config.importer_kind()?);
    println!("   Input:    {}", config.input);
    if let Some(snapshot) = &config.store.snapshot {
        println!("   Snapshot: {:?}", snapshot);
    }
    if let Some(url) = config.legacy_api.resolve_base_url() {
        println!("   Legacy API: {}", url);
    }

    Ok(())
}

fn list_kinds() {
    for kind in ImporterKind::ALL {
        let buckets: Vec<&str> = kind.buckets().iter().map(|b| b.name()).collect();
        println!(
            "{:<22} aliases: {:<60} buckets: {}",
            kind.name(),
            kind.aliases().join(", "),
            buckets.join(", ")
        );
    }
}
