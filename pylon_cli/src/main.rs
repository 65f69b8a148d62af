//! # Pylon CLI
//!
//! Thin developer shell over `pylon_core`. Reads JSON requests, prints
//! envelopes as pretty JSON on stdout and inspects a file-backed
//! resilience store. Logs go to stderr.
//!
//! ## Commands
//!
//! - `pylon solve <request.json>` - run the sign pipeline
//! - `pylon evaluate <item.json>` - run one tagged calculation item
//! - `pylon reliability --load-mean .. --resistance-std ..` - Monte Carlo check
//! - `pylon breaker <store.json> <dependency>` - circuit status
//! - `pylon dead-letters <store.json> <dependency> [--drain]` - dead-letter entries

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use pylon_core::calculations::CalculationItem;
use pylon_core::envelope::ResultEnvelope;
use pylon_core::materials::steel::{builtin_catalog, SectionCatalog};
use pylon_core::pipeline::{Pipeline, SignRequest};
use pylon_core::reliability::monte_carlo::{self, ReliabilityInput};
use pylon_core::resilience::{CircuitBreaker, DeadLetterQueue, FileStore, SharedStore};
use pylon_core::settings::{load_settings, EngineSettings};

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Pylon - sign structure solver pipeline
#[derive(Parser)]
#[command(name = "pylon")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "PYLON_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Engine settings file (JSON)
    #[arg(long, global = true, env = "PYLON_SETTINGS", value_name = "FILE")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for one sign request
    Solve {
        request: PathBuf,

        /// Section catalog CSV (defaults to the built-in catalog)
        #[arg(long, value_name = "FILE")]
        catalog: Option<PathBuf>,
    },

    /// Run a single calculation item (`{"type": "Foundation", ...}`)
    Evaluate {
        item: PathBuf,

        #[arg(long, value_name = "FILE")]
        catalog: Option<PathBuf>,
    },

    /// Monte Carlo reliability of resistance minus load
    Reliability {
        #[arg(long)]
        load_mean: f64,
        #[arg(long)]
        load_std: f64,
        #[arg(long)]
        resistance_mean: f64,
        #[arg(long)]
        resistance_std: f64,
        #[arg(long, default_value_t = 10_000)]
        samples: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Show the circuit breaker state for a dependency
    Breaker { store: PathBuf, dependency: String },

    /// List dead-letter entries for a dependency
    DeadLetters {
        store: PathBuf,
        dependency: String,

        /// Remove the entries after printing them
        #[arg(long)]
        drain: bool,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json)?;

    let settings = match &cli.settings {
        Some(path) => load_settings(path)?,
        None => EngineSettings::default(),
    };

    match cli.command {
        Commands::Solve { request, catalog } => {
            let request: SignRequest = read_json(&request)?;
            let catalog = load_catalog(catalog.as_deref())?;
            let report = Pipeline::new(&catalog, &settings).run(&request)?;
            info!(confidence = report.confidence(), "solved");
            print_json(&report)
        }
        Commands::Evaluate { item, catalog } => {
            let item: CalculationItem = read_json(&item)?;
            let catalog = load_catalog(catalog.as_deref())?;
            print_json(&item.evaluate(&catalog, &settings)?)
        }
        Commands::Reliability {
            load_mean,
            load_std,
            resistance_mean,
            resistance_std,
            samples,
            seed,
        } => {
            let input = ReliabilityInput::new(load_mean, load_std, resistance_mean, resistance_std)
                .with_samples(samples)
                .with_seed(seed);
            let envelope = ResultEnvelope::from_solved(
                monte_carlo::SOLVER,
                monte_carlo::simulate(&input)?,
                settings.envelope.duplicate_warnings,
            )?;
            print_json(&envelope)
        }
        Commands::Breaker { store, dependency } => {
            let breaker = CircuitBreaker::new(dependency, open_store(&store), settings.resilience.breaker.clone());
            print_json(&breaker.status().await?)
        }
        Commands::DeadLetters {
            store,
            dependency,
            drain,
        } => {
            let dead_letters = DeadLetterQueue::new(open_store(&store));
            let entries = if drain {
                dead_letters.drain(&dependency).await?
            } else {
                dead_letters.list(&dependency).await?
            };
            info!(count = entries.len(), drain, "dead letters");
            print_json(&entries)
        }
    }
}

fn open_store(path: &Path) -> Arc<dyn SharedStore> {
    Arc::new(FileStore::open(path))
}

fn load_catalog(path: Option<&Path>) -> CliResult<SectionCatalog> {
    match path {
        Some(path) => Ok(SectionCatalog::load_from_csv(path)?),
        None => Ok(builtin_catalog()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CliResult<T> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&contents).map_err(|e| format!("{}: {}", path.display(), e))?)
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, json: bool) -> CliResult<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
    Ok(())
}
