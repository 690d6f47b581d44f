//! Colocation search tool.
//!
//! Compares a reference satellite product against either one named
//! product or a whole mission catalog, and reports which acquisitions
//! overlap it in time and footprint.
//!
//! Exit codes: 0 = colocation found, 20 = no colocation found,
//! 1 = unrecoverable error. Schedulers branch on the distinction between
//! "no match" (expected, skippable) and an actual failure.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use coloc_core::{
    CatalogTable, ColocationEngine, ColocationResult, ColocationStatus, EngineConfig,
    ProviderRegistry, SidecarOpener,
};

const EXIT_NO_COLOC: u8 = 20;
const EXIT_ERROR: u8 = 1;

#[derive(Parser, Debug)]
#[command(name = "coloc-cli")]
#[command(about = "Find co-located satellite acquisitions for a reference product")]
struct Args {
    /// Path of the reference product
    #[arg(long)]
    product1_id: PathBuf,

    /// Path of a second product to compare against (instead of a catalog)
    #[arg(long)]
    product2_id: Option<PathBuf>,

    /// Mission catalog to compare against (instead of a second product)
    #[arg(long)]
    mission_name: Option<String>,

    /// Product level restriction, SAR catalogs only
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    level: Option<u8>,

    /// Text file listing a subset of mission product paths to consider
    #[arg(long)]
    input_ds: Option<PathBuf>,

    /// Maximum time in minutes between the two acquisitions
    #[arg(long, default_value_t = 30)]
    delta_time: i64,

    /// Folder where listings are written
    #[arg(long, default_value = "/tmp")]
    destination_folder: PathBuf,

    /// Do not create a listing of co-located files
    #[arg(long)]
    no_listing: bool,

    /// Do not derive co-location product outputs
    #[arg(long)]
    no_product_generation: bool,

    /// Name of the listing file, overriding the derived one
    #[arg(long)]
    listing_filename: Option<String>,

    /// Name of the co-location product, overriding the derived one
    #[arg(long)]
    colocation_filename: Option<String>,

    /// Catalog table YAML overriding the built-in one
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    match run(args) {
        Ok(ColocationStatus::HasColocation) => {
            info!("Colocation program successfully ended");
            ExitCode::SUCCESS
        }
        Ok(ColocationStatus::NoColocation) => {
            info!("No colocation found for the reference product");
            ExitCode::from(EXIT_NO_COLOC)
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Colocation run failed");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn init_tracing(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(args: Args) -> Result<ColocationStatus> {
    let table = match &args.config {
        Some(path) => CatalogTable::from_yaml(path)
            .with_context(|| format!("loading catalog table from {}", path.display()))?,
        None => CatalogTable::builtin(),
    };

    let mut registry = ProviderRegistry::new();
    for mission in table.missions() {
        registry.register(mission.to_string(), Box::new(SidecarOpener));
    }
    registry.set_fallback(Box::new(SidecarOpener));

    let subset = match &args.input_ds {
        Some(path) => Some(
            read_subset(path)
                .with_context(|| format!("reading product subset from {}", path.display()))?,
        ),
        None => None,
    };

    let config = EngineConfig {
        product1: args.product1_id.clone(),
        product2: args.product2_id.clone(),
        mission: args.mission_name.clone(),
        level: args.level,
        subset,
        delta_minutes: args.delta_time,
        listing: !args.no_listing,
        product_generation: !args.no_product_generation,
        listing_filename: args.listing_filename.clone(),
        colocation_filename: args.colocation_filename.clone(),
    };

    if config.listing {
        info!("A listing of the co-located products will be created. To disable, use --no-listing.");
    }
    if config.product_generation {
        info!("Co-location product names will be derived. To disable, use --no-product-generation.");
    }

    let engine = ColocationEngine::new(&table, &registry, config);
    let result = engine.run()?;

    if result.listing_requested {
        write_listings(&args.destination_folder, &result)?;
    }
    for pair in &result.pairs {
        if let Some(name) = &pair.colocation_filename {
            // artifact writing is delegated to the product writer
            info!(
                file = %args.destination_folder.join(name).display(),
                candidate = %pair.candidate.display(),
                "Colocation product output"
            );
        }
    }

    Ok(result.status())
}

/// One product path per non-empty line.
fn read_subset(path: &Path) -> Result<Vec<PathBuf>> {
    let raw = fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Append co-located candidate paths to their listing files, one path per
/// line, skipping paths a previous run already listed.
fn write_listings(destination: &Path, result: &ColocationResult) -> Result<()> {
    let mut by_listing: BTreeMap<&str, Vec<&Path>> = BTreeMap::new();
    for pair in &result.pairs {
        by_listing
            .entry(pair.listing_filename.as_str())
            .or_default()
            .push(pair.candidate.as_path());
    }

    fs::create_dir_all(destination)?;
    for (name, candidates) in by_listing {
        let path = destination.join(name);
        let existing: HashSet<String> = match fs::read_to_string(&path) {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(_) => HashSet::new(),
        };

        let mut file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
        let mut added = 0usize;
        for candidate in candidates {
            let line = candidate.display().to_string();
            if !existing.contains(&line) {
                writeln!(file, "{line}")?;
                added += 1;
            }
        }
        info!(listing = %path.display(), added, "Wrote colocation listing");
    }
    Ok(())
}
