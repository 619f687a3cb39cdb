#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the boundary ingestion tool.

use std::path::PathBuf;
use std::time::Instant;

use boundary_map_cli_utils::IndicatifProgress;
use boundary_map_database::paths;
use boundary_map_geography::listings::ListingStore;
use boundary_map_geography::resolver::resolve_region_at_point;
use boundary_map_geography::store::BoundaryStore;
use boundary_map_geography_models::Level;
use boundary_map_ingest::dedup::DedupStrategy;
use boundary_map_ingest::parents::{ResolveOptions, resolve_parents};
use boundary_map_ingest::{ImportOptions, import_level, parse_level};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "boundary_map_ingest", about = "Administrative boundary ingestion tool")]
struct Cli {
    /// Boundaries `DuckDB` path (overrides `BOUNDARY_MAP_BOUNDARIES_DB`)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Listings `DuckDB` path (overrides `BOUNDARY_MAP_LISTINGS_DB`)
    #[arg(long, global = true)]
    listings_db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one administrative level from a shapefile or `GeoJSON` file,
    /// replacing every stored boundary at that level
    Import {
        /// Level to import (province, county, bakhsh, city)
        #[arg(long)]
        level: String,
        /// Path to the `.shp`, `.geojson`, or `.json` source
        path: PathBuf,
        /// Drop duplicate features instead of merging their geometry
        #[arg(long)]
        first_seen: bool,
        /// proj4 definition of the source CRS, used when coordinates are
        /// projected (defaults to the national Lambert Conformal Conic)
        #[arg(long)]
        projection: Option<String>,
        /// Normalize and report without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Fill in missing parents from geometry, county through city
    ResolveParents {
        /// Recompute parents that are already set
        #[arg(long)]
        force: bool,
    },
    /// Recompute the region names stored on every listing
    Attribute,
    /// Print the regions containing a point
    Resolve {
        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// Show boundary counts per level
    Status,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = boundary_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let db_path = cli.db.unwrap_or_else(paths::boundaries_db_path);
    log::debug!("Using boundaries DB at {}", db_path.display());
    let store = BoundaryStore::open(&db_path)?;

    let start = Instant::now();
    match cli.command {
        Commands::Import {
            level,
            path,
            first_seen,
            projection,
            dry_run,
        } => {
            let level = parse_level(&level)?;
            let options = ImportOptions {
                dedup: if first_seen {
                    DedupStrategy::FirstSeen
                } else {
                    DedupStrategy::Union
                },
                projection,
                dry_run,
            };
            let progress = IndicatifProgress::features_bar(&multi, &format!("Reading {level}"));
            let report = import_level(&store, level, &path, &options, Some(&progress))?;
            if report.skipped() > 0 {
                log::warn!(
                    "{} of {} {level} features were skipped",
                    report.skipped(),
                    report.features_read
                );
            }
        }
        Commands::ResolveParents { force } => {
            let progress = IndicatifProgress::batch_bar(&multi, "Resolving parents");
            let report = resolve_parents(&store, ResolveOptions { force }, Some(&progress))?;
            for pass in &report.passes {
                log::info!(
                    "{}: {} examined, {} resolved, {} unresolved",
                    pass.level,
                    pass.examined,
                    pass.resolved,
                    pass.unresolved
                );
            }
        }
        Commands::Attribute => {
            let listings_path = cli.listings_db.unwrap_or_else(paths::listings_db_path);
            let listings = ListingStore::open(&listings_path)?;
            let report = listings.reattribute(&store)?;
            log::info!(
                "{} listings: {} attributed, {} unattributed",
                report.examined,
                report.attributed,
                report.unattributed
            );
        }
        Commands::Resolve { lat, lng } => {
            let regions = resolve_region_at_point(&store, lat, lng)?;
            if regions.is_empty() {
                log::info!("No region contains ({lat}, {lng})");
            }
            println!("{}", serde_json::to_string_pretty(&regions)?);
        }
        Commands::Status => {
            let counts = store.count_by_level()?;
            for level in Level::ALL {
                println!("{level:<10} {}", counts.get(level).copied().unwrap_or(0));
            }
        }
    }

    log::info!("Done in {:.1}s", start.elapsed().as_secs_f64());

    Ok(())
}
