//! Ampere CLI binary.
//!
//! Scores customer records against the deployed propensity models and explains
//! which feature values drive the predictions.

use ampere::output::{ExportFormat, Exporter};
use ampere::store::{BlobCache, StoreConfig};
use ampere::{
    Direction, Engine, EngineConfig, FeatureFrame, ScoreOptions, ScoringOutcome,
};
use clap::{Parser, Subcommand, ValueEnum};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "ampere")]
#[command(about = "Ampere: propensity scoring with SHAP explanations", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read artifacts from this directory
    #[arg(long, global = true, conflicts_with = "store_url")]
    store_root: Option<PathBuf>,

    /// Read artifacts from this HTTP object store
    #[arg(long, global = true)]
    store_url: Option<String>,

    /// Bucket on the HTTP object store
    #[arg(long, global = true, requires = "store_url")]
    bucket: Option<String>,

    /// Disable the local artifact cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Markdown,
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// List the deployed models
    Models {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Score customer records
    Score {
        /// Model name
        #[arg(long)]
        model: String,

        /// Input file (.json or .csv, "-" for JSON on stdin)
        #[arg(long)]
        input: PathBuf,

        /// Compute SHAP attributions
        #[arg(long)]
        explain: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Rank the factors pushing predictions up or down
    Explain {
        /// Model name
        #[arg(long)]
        model: String,

        /// Input file (.json or .csv, "-" for JSON on stdin)
        #[arg(long)]
        input: PathBuf,

        /// Direction of the factors (positive or negative)
        #[arg(long, default_value = "positive")]
        direction: Direction,

        /// Number of factors to keep
        #[arg(long)]
        top_k: Option<usize>,

        /// Report format
        #[arg(long, value_enum, default_value = "markdown")]
        format: ReportFormat,

        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Rank the products each customer is eligible for
    Products {
        /// Input file (.json or .csv, "-" for JSON on stdin)
        #[arg(long)]
        input: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show how records are normalized for a model
    Normalize {
        /// Model name
        #[arg(long)]
        model: String,

        /// Input file (.json or .csv, "-" for JSON on stdin)
        #[arg(long)]
        input: PathBuf,
    },

    /// Load models ahead of time
    Warm {
        /// Models to load (default: all deployed models)
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
    },

    /// Inspect or clear the local artifact cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache statistics
    Stats,
    /// Remove every cached artifact
    Clear,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> CliResult<EngineConfig> {
    let mut config = EngineConfig::load(cli.config.as_deref())?;

    if let Some(root) = &cli.store_root {
        config.store = StoreConfig::Local { root: root.clone() };
    }
    if let Some(url) = &cli.store_url {
        config.apply_vars(|key| match key {
            "AMPERE_STORE_URL" => Some(url.clone()),
            "AMPERE_BUCKET" => cli.bucket.clone(),
            _ => None,
        })?;
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }

    debug!(?config, "resolved configuration");
    Ok(config)
}

async fn run(cli: Cli) -> CliResult {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Models { format } => list_models(&config, format)?,
        Commands::Cache { action } => cache_command(&config, action)?,
        Commands::Score {
            model,
            input,
            explain,
            format,
        } => {
            let engine = Engine::from_config(config)?;
            score_command(&engine, &model, &input, explain, format).await?;
        }
        Commands::Explain {
            model,
            input,
            direction,
            top_k,
            format,
            output,
        } => {
            let engine = Engine::from_config(config)?;
            let frame = read_frame(&input)?;
            let report = engine.analyze(&model, &frame, direction, top_k).await?;
            let rendered = match format {
                ReportFormat::Markdown => report.to_markdown(),
                ReportFormat::Table => report.to_ascii_table(),
                ReportFormat::Json => report.export_to_string(ExportFormat::PrettyJson)?,
                ReportFormat::Csv => report.export_to_string(ExportFormat::Csv)?,
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    eprintln!("Report written to {}", path.display());
                }
                None => print!("{rendered}"),
            }
        }
        Commands::Products { input, format } => {
            let engine = Engine::from_config(config)?;
            products_command(&engine, &input, format).await?;
        }
        Commands::Normalize { model, input } => {
            let engine = Engine::from_config(config)?;
            let frame = read_frame(&input)?;
            let normalized = engine.normalize(&model, &frame).await?;
            println!("{}", normalized.matrix.to_dataframe()?);
            println!("{}", serde_json::to_string_pretty(&normalized.report)?);
        }
        Commands::Warm { models } => {
            let engine = Engine::from_config(config)?;
            warm_models(&engine, models).await?;
        }
    }

    Ok(())
}

/// Read a `.json` (object or array) or `.csv` input file; `-` reads JSON from stdin.
fn read_frame(path: &Path) -> CliResult<FeatureFrame> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        return Ok(FeatureFrame::from_json(&value)?);
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let file = File::open(path)?;
    match extension.as_deref() {
        Some("json") => {
            let value: serde_json::Value = serde_json::from_reader(BufReader::new(file))?;
            Ok(FeatureFrame::from_json(&value)?)
        }
        Some("csv") => Ok(FeatureFrame::from_csv_reader(BufReader::new(file))?),
        _ => Err(format!("unsupported input file {} (expected .json or .csv)", path.display()).into()),
    }
}

fn list_models(config: &EngineConfig, format: OutputFormat) -> CliResult {
    let registry = ampere::ModelRegistry::restricted_to(&config.models[..])?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(registry.entries())?);
        return Ok(());
    }

    println!("{:<28} {:<28} Eligibility column", "Model", "Product");
    println!("{}", "-".repeat(86));
    for entry in registry.entries() {
        println!(
            "{:<28} {:<28} {}",
            entry.name,
            entry.product.unwrap_or("-"),
            entry.eligibility_column.unwrap_or("-")
        );
    }
    Ok(())
}

async fn score_command(
    engine: &Engine,
    model: &str,
    input: &Path,
    explain: bool,
    format: OutputFormat,
) -> CliResult {
    let frame = read_frame(input)?;
    let options = ScoreOptions {
        explain,
        ..ScoreOptions::default()
    };
    let outcome = engine.score(model, &frame, &options).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => print_outcome(&outcome, engine.config().top_k),
    }
    Ok(())
}

fn print_outcome(outcome: &ScoringOutcome, top_k: usize) {
    println!("\nModel: {}", outcome.model_name);
    println!("Rows scored: {}", outcome.sample_count);
    println!(
        "Average probability: {:.3} ({:.1}%)",
        outcome.average_probability,
        outcome.average_probability * 100.0
    );
    for (row, probability) in outcome.probabilities().iter().enumerate() {
        println!("  row {row:>4}: {probability:.4}");
    }

    let report = &outcome.normalization;
    if report.is_clean() {
        println!("Normalization: clean");
    } else {
        println!(
            "Normalization: {} cell(s) defaulted, {} value(s) remapped to \"unknown\", {} column(s) synthesized",
            report.defaulted_cells(),
            report.remapped_cells(),
            report.synthesized.len()
        );
    }

    if let Some(warning) = &outcome.shap_warning {
        println!("SHAP warning: {warning}");
    }
    if let Some(error) = &outcome.shap_error {
        println!("SHAP error: {error}");
    }
    for direction in [Direction::Positive, Direction::Negative] {
        if let Some(factors) = outcome.report(direction, Some(top_k)) {
            print!("{}", factors.to_ascii_table());
        }
    }
}

async fn products_command(engine: &Engine, input: &Path, format: OutputFormat) -> CliResult {
    let frame = read_frame(input)?;
    let mut ranked = Vec::with_capacity(frame.n_rows());
    for row in 0..frame.n_rows() {
        let Some(record) = frame.row(row) else {
            continue;
        };
        ranked.push(engine.rank_eligible_products(&record).await?);
    }

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
        return Ok(());
    }

    for (row, offers) in ranked.iter().enumerate() {
        println!("\nCustomer row {row}:");
        if offers.is_empty() {
            println!("  No eligible products");
            continue;
        }
        for (rank, offer) in offers.iter().enumerate() {
            let marker = if rank == 0 { "*" } else { " " };
            println!(
                "{} {:<28} {:>6.1}%  {}",
                marker,
                offer.entry.product.unwrap_or(offer.entry.name),
                offer.probability * 100.0,
                offer.entry.description
            );
        }
    }
    Ok(())
}

async fn warm_models(engine: &Engine, models: Vec<String>) -> CliResult {
    let names = if models.is_empty() {
        engine
            .registry()
            .names()
            .into_iter()
            .map(String::from)
            .collect()
    } else {
        models
    };

    let pb = ProgressBar::new(names.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Loading models...");

    let mut pending: FuturesUnordered<_> = names
        .iter()
        .map(|name| async move { (name, engine.artifact(name).await) })
        .collect();

    let mut failures = 0usize;
    while let Some((name, result)) = pending.next().await {
        match result {
            Ok(artifact) => pb.set_message(format!(
                "{name} ({} features)",
                artifact.feature_order().len()
            )),
            Err(e) => {
                failures += 1;
                pb.println(format!("Failed to load {name}: {e}"));
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message(format!(
        "Loaded {} of {} models",
        names.len() - failures,
        names.len()
    ));
    if failures > 0 {
        return Err(format!("{failures} model(s) failed to load").into());
    }
    Ok(())
}

fn cache_command(config: &EngineConfig, action: CacheAction) -> CliResult {
    let path = config.cache.resolved_path();
    let cache = BlobCache::new(&path)?;

    match action {
        CacheAction::Stats => {
            let stats = cache.stats()?;
            println!("Cache: {}", path.display());
            println!("  Entries: {}", stats.entries);
            println!("  Size: {:.1} KiB", stats.total_bytes as f64 / 1024.0);
            if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
                println!("  Oldest: {}", oldest.format("%Y-%m-%d %H:%M:%S UTC"));
                println!("  Newest: {}", newest.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
        CacheAction::Clear => {
            cache.clear()?;
            println!("Cleared {}", path.display());
        }
    }
    Ok(())
}
