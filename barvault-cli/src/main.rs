//! BarVault CLI: collection loop, configuration, and table inspection.
//!
//! Commands:
//! - `run`: continuous collection (optionally bounded by `--cycles`)
//! - `once`: a single collection cycle
//! - `config init`: write a preset configuration as TOML
//! - `status`: row counts and time span of every configured table
//! - `export`: dump one table as CSV

use anyhow::{bail, Context, Result};
use barvault_core::config::{CollectorConfig, ProviderKind};
use barvault_core::data::provider_factory;
use barvault_core::domain::Timeframe;
use barvault_core::store::{export_csv, ParquetStore, TableKey, TableStatus};
use barvault_runner::Scheduler;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "barvault",
    about = "BarVault: incremental OHLCV collector with rolling Parquet tables"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect continuously at the configured cadence.
    Run {
        #[command(flatten)]
        source: ConfigArgs,

        /// Stop after this many cycles (default: run until killed).
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Run one collection cycle and exit.
    Once {
        #[command(flatten)]
        source: ConfigArgs,
    },
    /// Configuration helpers.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Report row counts and time spans of stored tables.
    Status {
        #[command(flatten)]
        source: ConfigArgs,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Export one stored table as CSV.
    Export {
        #[command(flatten)]
        source: ConfigArgs,

        /// Bucket name (e.g. fno, broader_index).
        #[arg(long)]
        bucket: String,

        /// Timeframe: 15m, 30m, 1H, 4H, D, W, M.
        #[arg(long)]
        timeframe: Timeframe,

        #[arg(long)]
        instrument: String,

        /// Output file. Defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a preset configuration as TOML.
    Init {
        #[arg(long, value_enum, default_value_t = Preset::Fno)]
        preset: Preset,

        /// Output file. Defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to a TOML config file. Takes precedence over --preset.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Built-in universe to use without a config file.
    #[arg(long, value_enum, default_value_t = Preset::Fno)]
    preset: Preset,

    /// Use the offline synthetic provider instead of Yahoo Finance.
    #[arg(long, default_value_t = false)]
    synthetic: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Fno,
    Indices,
}

impl Preset {
    fn config(self) -> CollectorConfig {
        match self {
            Preset::Fno => CollectorConfig::default_fno(),
            Preset::Indices => CollectorConfig::default_indices(),
        }
    }
}

impl ConfigArgs {
    fn load(&self) -> Result<CollectorConfig> {
        let mut config = match &self.config {
            Some(path) => CollectorConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => self.preset.config(),
        };
        if self.synthetic {
            config.provider.kind = ProviderKind::Synthetic;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { source, cycles } => run_continuous(source.load()?, cycles),
        Commands::Once { source } => run_once(source.load()?),
        Commands::Config { action } => match action {
            ConfigAction::Init { preset, out, force } => {
                run_config_init(preset, out.as_deref(), force)
            }
        },
        Commands::Status { source, json } => run_status(&source.load()?, json),
        Commands::Export {
            source,
            bucket,
            timeframe,
            instrument,
            out,
        } => run_export(&source.load()?, &bucket, timeframe, &instrument, out.as_deref()),
    }
}

fn build_scheduler(config: CollectorConfig) -> Result<Scheduler> {
    info!(
        name = %config.name,
        jobs = config.job_count(),
        workers = config.max_workers,
        window = config.window,
        provider = ?config.provider.kind,
        root = %config.root_dir.display(),
        "starting collector"
    );
    let providers = provider_factory(&config.provider);
    Scheduler::new(Arc::new(config), providers).context("initializing collector")
}

fn run_continuous(config: CollectorConfig, cycles: Option<u64>) -> Result<()> {
    let mut scheduler = build_scheduler(config)?;
    let ran = scheduler.run_continuous(cycles);
    info!(cycles = ran, "collector stopped");
    Ok(())
}

fn run_once(config: CollectorConfig) -> Result<()> {
    let mut scheduler = build_scheduler(config)?;
    let summary = scheduler.run_once();
    // Task failures are in the failure log; they do not change the exit code
    if summary.timeframes_failed > 0 {
        info!(failed = summary.timeframes_failed, "some timeframes failed");
    }
    Ok(())
}

fn run_config_init(preset: Preset, out: Option<&Path>, force: bool) -> Result<()> {
    let text = preset.config().to_toml()?;
    match out {
        Some(path) => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn table_keys(config: &CollectorConfig) -> Vec<TableKey> {
    config
        .buckets
        .iter()
        .flat_map(|bucket| {
            bucket.timeframes.iter().flat_map(move |tf| {
                bucket
                    .instruments
                    .iter()
                    .map(move |instrument| TableKey::new(&bucket.dir, *tf, instrument))
            })
        })
        .collect()
}

fn run_status(config: &CollectorConfig, json: bool) -> Result<()> {
    let store = ParquetStore::new(&config.root_dir);
    let statuses = store.status(&table_keys(config));

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    let stored = statuses.iter().filter(|s| s.stored).count();
    println!("Store: {}", config.root_dir.display());
    println!("Tables: {stored}/{} present", statuses.len());
    println!();
    println!(
        "{:<16} {:<4} {:<20} {:>6}  {:<41}",
        "Bucket", "TF", "Instrument", "Rows", "Span"
    );
    println!("{}", "-".repeat(92));
    for status in statuses.iter().filter(|s| s.stored) {
        println!(
            "{:<16} {:<4} {:<20} {:>6}  {}",
            status.key.bucket_dir,
            status.key.timeframe,
            status.key.instrument,
            status.rows,
            describe_span(status)
        );
    }

    Ok(())
}

fn describe_span(status: &TableStatus) -> String {
    if let Some(err) = &status.error {
        return format!("(unreadable: {err})");
    }
    match (status.first, status.last) {
        (Some(first), Some(last)) => format!("{first} to {last}"),
        _ => "(empty)".into(),
    }
}

fn run_export(
    config: &CollectorConfig,
    bucket: &str,
    timeframe: Timeframe,
    instrument: &str,
    out: Option<&Path>,
) -> Result<()> {
    let Some(bucket_config) = config.bucket(bucket) else {
        bail!("unknown bucket '{bucket}'");
    };

    let store = ParquetStore::new(&config.root_dir);
    let key = TableKey::new(&bucket_config.dir, timeframe, instrument);
    let rows = store
        .load(&key)
        .with_context(|| format!("reading table {key}"))?
        .with_context(|| format!("no table stored for {key}"))?;

    let csv = export_csv(&rows)?;
    match out {
        Some(path) => {
            std::fs::write(path, csv).with_context(|| format!("writing {}", path.display()))?;
            println!("Exported {} rows to {}", rows.len(), path.display());
        }
        None => print!("{csv}"),
    }
    Ok(())
}
