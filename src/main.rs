//! Binary entry point for peoplesync.
//!
//! This binary provides the CLI for migrating people from the source
//! database into Planning Center People.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use peoplesync::config::SyncConfig;
use peoplesync::io::{CsvExporter, PlanWriter};
use peoplesync::observability::{self, LoggingConfig};
use peoplesync::remote::{CachedGeocoder, NominatimGeocoder, PcoClient};
use peoplesync::services::{HouseholdCensus, OperationExecutor, RecordNormalizer, SyncPipeline};
use peoplesync::source::{SourceBatch, SourceWindow, SqliteSource};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// peoplesync - reconcile a legacy membership database into Planning Center.
#[derive(Parser)]
#[command(name = "peoplesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Source selection shared by commands that read the database.
#[derive(clap::Args)]
struct SourceArgs {
    /// Source database (overrides `source.database`).
    #[arg(long)]
    database: Option<PathBuf>,

    /// Index of the first sorted row to load.
    #[arg(long)]
    start: Option<usize>,

    /// Index one past the last sorted row to load.
    #[arg(long)]
    end: Option<usize>,

    /// Only load these source ids (comma-separated).
    #[arg(long, value_delimiter = ',')]
    ids: Vec<i64>,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Reconcile source records against the remote directory.
    Migrate {
        #[command(flatten)]
        source: SourceArgs,

        /// Print planned writes as JSON lines instead of applying them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Write the loaded records to CSV audit files.
    Export {
        #[command(flatten)]
        source: SourceArgs,

        /// Output directory (overrides `output.directory`).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Count active remote households by adult members.
    Households {
        /// Minimum age counted as an adult.
        #[arg(long, default_value_t = 16)]
        min_age: u32,

        /// Adult count from which a household is listed as large.
        #[arg(long, default_value_t = 7)]
        large: usize,
    },

    /// Manage configuration.
    Config {
        /// Show the effective configuration.
        #[arg(long)]
        show: bool,
    },
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match SyncConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init(LoggingConfig::from_settings(&config.logging, cli.verbose))
    {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: SyncConfig) -> peoplesync::Result<()> {
    match command {
        Commands::Migrate { source, dry_run } => cmd_migrate(apply_source(config, source)?, dry_run),
        Commands::Export { source, output } => {
            let mut config = apply_source(config, source)?;
            if let Some(output) = output {
                config.output.directory = output;
            }
            cmd_export(&config)
        },
        Commands::Households { min_age, large } => cmd_households(&config, min_age, large),
        Commands::Config { show } => cmd_config(&config, show),
    }
}

fn apply_source(mut config: SyncConfig, args: SourceArgs) -> peoplesync::Result<SyncConfig> {
    if let Some(database) = args.database {
        config.source.database = database;
    }
    if let Some(start) = args.start {
        config.source.start = start;
    }
    if args.end.is_some() {
        config.source.end = args.end;
    }
    if !args.ids.is_empty() {
        config.source.ids = args.ids;
    }
    config.validate()?;
    Ok(config)
}

fn load_batch(config: &SyncConfig) -> peoplesync::Result<(SqliteSource, SourceBatch)> {
    let normalizer = RecordNormalizer::new(&config.matching.region);
    let source = SqliteSource::open(&config.source.database)?;
    let window = SourceWindow::all()
        .with_range(config.source.start, config.source.end)
        .with_ids(config.source.ids.clone());
    let batch = source.load(&window, &normalizer)?;
    Ok((source, batch))
}

fn cmd_migrate(config: SyncConfig, dry_run: bool) -> peoplesync::Result<()> {
    let (source, batch) = load_batch(&config)?;
    let mappings = source.field_mappings()?;

    let client = Arc::new(PcoClient::new(&config.remote, &config.matching.region)?);
    let geocoder = Arc::new(CachedGeocoder::new(
        NominatimGeocoder::new(&config.geocoder),
        config.geocoder.cache_capacity,
    ));
    let pipeline = SyncPipeline::new(&config.matching, Arc::clone(&client), geocoder, mappings);

    let summary = if dry_run {
        let mut plan = PlanWriter::new(std::io::stdout().lock());
        let summary = pipeline.run(&batch, &mut plan);
        eprintln!("{} operations planned", plan.written());
        summary
    } else {
        let mut executor = OperationExecutor::new(client);
        pipeline.run(&batch, &mut executor)
    };

    eprint!("{summary}");
    Ok(())
}

fn cmd_export(config: &SyncConfig) -> peoplesync::Result<()> {
    let (_, batch) = load_batch(config)?;
    let counts = CsvExporter::new(&config.output.directory).export(&batch.records)?;
    println!(
        "Exported {} people, {} contacts, {} addresses, {} attributes to {}",
        counts.people,
        counts.contacts,
        counts.addresses,
        counts.attributes,
        config.output.directory.display()
    );
    if !batch.failures.is_empty() {
        eprintln!("{} source rows could not be read", batch.failures.len());
    }
    Ok(())
}

fn cmd_households(config: &SyncConfig, min_age: u32, large: usize) -> peoplesync::Result<()> {
    let client = Arc::new(PcoClient::new(&config.remote, &config.matching.region)?);
    let report = HouseholdCensus::new(client)
        .with_min_adult_age(min_age)
        .with_large_household(large)
        .run()?;
    print!("{report}");
    Ok(())
}

fn cmd_config(config: &SyncConfig, show: bool) -> peoplesync::Result<()> {
    if show {
        print!("{}", config.to_toml()?);
    } else {
        match SyncConfig::default_path() {
            Some(path) => println!("Default config path: {}", path.display()),
            None => println!("No platform config directory"),
        }
        println!("Use --show to print the effective configuration");
    }
    Ok(())
}
