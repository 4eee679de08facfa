//! CEP geocoding pipeline.
//!
//! Reads raw postal codes from a CSV column or a plain list, resolves them
//! to coordinates through the configured provider, and maintains the
//! durable cache so re-runs only pay for codes never seen before.

mod config;

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ipe::cache::GeocodeCache;
use ipe::providers::{
    CepProvider, ChainedProvider, DirectProvider, NominatimClient, Strategy, ViaCepClient,
};
use ipe::resolver::{ResolveOutcome, Resolver};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "geocode")]
#[command(about = "Resolve CEPs to coordinates with a durable cache")]
struct Args {
    /// Input file: .csv (reads --cep-column) or plain text, one CEP per line
    #[arg(short, long)]
    input: PathBuf,

    /// CSV column holding the CEPs
    #[arg(long, default_value = "cep")]
    cep_column: String,

    /// Cache file path
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Resolution strategy
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    /// Base URL of the structured geocoder (direct strategy)
    #[arg(long)]
    geocoder_url: Option<String>,

    /// Maximum uncached CEPs to attempt this run
    #[arg(long)]
    limit: Option<usize>,

    /// Flush the cache after this many new entries
    #[arg(long)]
    flush_every: Option<usize>,

    /// Write the resolved CEP -> [lat, lon] mapping as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Optional TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };

    let strategy = args
        .strategy
        .or(config.strategy)
        .unwrap_or(Strategy::Chained);
    let cache_path = args
        .cache
        .clone()
        .or_else(|| config.cache_file.clone())
        .unwrap_or_else(|| PathBuf::from("cep_geocode_cache.json"));
    let flush_every = args.flush_every.or(config.flush_every).unwrap_or(10);

    info!("Ipê CEP Geocoder");
    info!("Input: {}", args.input.display());

    let codes = read_codes(&args.input, &args.cep_column)?;
    info!("Read {} raw codes", codes.len());

    // A corrupt cache must stop the run here, before any quota is spent.
    let cache = GeocodeCache::load(&cache_path)
        .with_context(|| format!("Failed to load cache {}", cache_path.display()))?;
    if !cache.is_empty() {
        info!(
            "Cache loaded: {} CEPs ({} with coordinates)",
            cache.len(),
            cache.resolved_count()
        );
    }

    let provider: Box<dyn CepProvider> = match strategy {
        Strategy::Chained => {
            let registry = match config.viacep_url {
                Some(url) => ViaCepClient::with_base_url(url),
                None => ViaCepClient::new(),
            };
            let geocoder = match config.nominatim_url {
                Some(url) => NominatimClient::with_base_url(url),
                None => NominatimClient::new(),
            };
            Box::new(ChainedProvider::with_clients(registry, geocoder))
        }
        Strategy::Direct => {
            let url = args
                .geocoder_url
                .clone()
                .or(config.geocoder_url)
                .context("direct strategy needs --geocoder-url or geocoder_url in the config")?;
            Box::new(DirectProvider::new(url))
        }
    };
    info!("Strategy: {}", provider.id());

    let mut resolver = Resolver::new(cache, provider)
        .flush_every(flush_every)
        .limit(args.limit)
        .with_progress(!args.no_progress);

    let outcome = resolver.run(codes).await?;

    let stats = &outcome.stats;
    info!("Geocoding complete");
    info!("  raw codes: {} ({} invalid)", stats.total, stats.invalid);
    info!(
        "  unique: {} ({} already cached)",
        stats.unique, stats.cache_hits
    );
    info!(
        "  resolved: {}, unresolvable: {}, failed: {}",
        stats.resolved, stats.unresolvable, stats.failed
    );

    if let Some(path) = &args.output {
        write_output(path, &outcome)?;
        info!("Resolved mapping written to {}", path.display());
    }

    Ok(())
}

/// Read raw CEP strings from a CSV column or a line-per-code text file.
fn read_codes(path: &Path, cep_column: &str) -> Result<Vec<String>> {
    let is_csv = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        read_csv_column(path, cep_column)
    } else {
        read_lines(path)
    }
}

fn read_csv_column(path: &Path, column: &str) -> Result<Vec<String>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(file);

    let headers = reader.headers().context("Failed to read CSV headers")?;
    let idx = headers
        .iter()
        .position(|h| h == column)
        .with_context(|| format!("CSV has no column {:?}", column))?;

    let mut codes = Vec::new();
    for record in reader.records() {
        let record = record.context("Failed to read CSV record")?;
        if let Some(value) = record.get(idx) {
            if !value.trim().is_empty() {
                codes.push(value.to_string());
            }
        }
    }
    Ok(codes)
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

fn write_output(path: &Path, outcome: &ResolveOutcome) -> Result<()> {
    let json = serde_json::to_string_pretty(&outcome.coordinates)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
