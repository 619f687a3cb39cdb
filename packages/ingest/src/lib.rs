#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for importing administrative boundary layers into the boundary
//! store.
//!
//! One import handles one level: read a shapefile (or `GeoJSON` export),
//! normalize each feature, deduplicate, and replace the level in a single
//! transaction. [`parents::resolve_parents`] then fills in missing parents
//! from geometry.

pub mod crs;
pub mod dedup;
pub mod encoding;
pub mod normalize;
pub mod parents;
pub mod registry;
pub mod source;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use boundary_map_geography::GeoError;
use boundary_map_geography::store::BoundaryStore;
use boundary_map_geography_models::{Boundary, Level};
use boundary_map_ingest_models::{ImportReport, LayerDefinition, ProgressCallback, RawFeature};

use crate::crs::{CrsError, DEFAULT_LAMBERT, LazyReprojector};
use crate::dedup::{DedupStrategy, deduplicate};
use crate::normalize::{FeatureOutcome, normalize_feature};

/// Errors that can occur while importing boundaries.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The shapefile or its attribute table couldn't be read.
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// The `GeoJSON` source couldn't be parsed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The boundary store rejected a read or write.
    #[error("Database error: {0}")]
    Database(#[from] GeoError),

    /// Reprojection was required and failed. Nothing was written.
    #[error(transparent)]
    Crs(#[from] CrsError),

    /// The source file type isn't supported.
    #[error("Unsupported boundary source: {path}")]
    UnsupportedFormat {
        /// Offending path or description.
        path: String,
    },

    /// A level name didn't parse.
    #[error("Unknown level: {0}")]
    UnknownLevel(String),

    /// No layer definition exists for a level.
    #[error("Layer registry error: {message}")]
    Registry {
        /// Description of the problem.
        message: String,
    },
}

/// Options for a single level import.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// How duplicate names are combined.
    pub dedup: DedupStrategy,
    /// proj4 definition of the source CRS. Overrides the layer's own.
    pub projection: Option<String>,
    /// Normalize and report without writing to the store.
    pub dry_run: bool,
}

/// Parses a level name, accepting local terms (`ostan`, `shahrestan`, ...).
///
/// # Errors
///
/// Returns [`IngestError::UnknownLevel`] if `name` isn't a level.
pub fn parse_level(name: &str) -> Result<Level, IngestError> {
    name.trim()
        .parse()
        .map_err(|_| IngestError::UnknownLevel(name.to_string()))
}

/// Reads `path` and imports it as `level`.
///
/// # Errors
///
/// Returns an error if the file can't be read, the source projection
/// can't be loaded, or the store rejects the write. Malformed and
/// out-of-range features are skipped and counted, not errors.
pub fn import_level(
    store: &BoundaryStore,
    level: Level,
    path: &Path,
    options: &ImportOptions,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<ImportReport, IngestError> {
    let layer = registry::layer_for(level).ok_or_else(|| IngestError::Registry {
        message: format!("No layer definition for level {level}"),
    })?;

    log::info!("Importing {} from {}", layer.description, path.display());
    let features = source::read_features(path)?;

    import_features(store, &layer, features, options, progress)
}

/// Normalizes, deduplicates, and stores already-read `features`.
///
/// The level is replaced only after every feature has been processed, so an
/// unavailable projection part way through leaves the stored level intact.
/// A feature whose vertices can't be transformed is skipped on its own.
///
/// # Errors
///
/// Returns [`IngestError::Crs`] if a feature needs reprojection and the
/// source projection can't be loaded, or [`IngestError::Database`] if the
/// write fails.
pub fn import_features(
    store: &BoundaryStore,
    layer: &LayerDefinition,
    features: Vec<RawFeature>,
    options: &ImportOptions,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<ImportReport, IngestError> {
    let start = Instant::now();
    let progress = progress
        .cloned()
        .unwrap_or_else(boundary_map_ingest_models::null_progress);

    let definition = options
        .projection
        .as_deref()
        .or(layer.projection.as_deref())
        .unwrap_or(DEFAULT_LAMBERT);
    let mut reprojector = LazyReprojector::new(definition);

    let mut report = ImportReport::new(layer.level);
    report.features_read = features.len() as u64;

    progress.set_total(report.features_read);
    progress.set_message(format!("Normalizing {}", layer.level));

    let mut boundaries: Vec<Boundary> = Vec::with_capacity(features.len());
    for feature in features {
        let index = feature.index;
        match normalize_feature(feature, layer, &mut reprojector)? {
            FeatureOutcome::Normalized(normalized) => {
                if normalized.reprojected {
                    report.reprojected += 1;
                }
                if normalized.parent_from_attributes {
                    report.parents_from_attributes += 1;
                }
                report.names_repaired += normalized.names_repaired;
                boundaries.push(normalized.boundary);
            }
            FeatureOutcome::Malformed(reason) => {
                log::warn!("Skipping {} feature {index}: {reason}", layer.level);
                report.skipped_malformed += 1;
            }
            FeatureOutcome::OutOfRange(e) => {
                log::warn!("Skipping {} feature {index}: {e}", layer.level);
                report.skipped_out_of_range += 1;
            }
        }
        progress.inc(1);
    }

    let outcome = deduplicate(boundaries, options.dedup);
    report.duplicates_merged = outcome.merged;
    report.duplicates_dropped = outcome.dropped;

    if options.dry_run {
        report.imported = outcome.boundaries.len() as u64;
        log::info!("Dry run, not writing {} boundaries", report.imported);
    } else {
        progress.set_message(format!("Writing {}", layer.level));
        let inserted = store.replace_level(layer.level, &outcome.boundaries)?;
        report.imported = inserted as u64;
    }

    progress.finish(format!("{} import done", layer.level));
    log::info!(
        "Import complete: {report}, took {:.1}s",
        start.elapsed().as_secs_f64()
    );

    Ok(report)
}
