#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary ingestion configuration, input, progress, and result types.

use std::fmt;
use std::sync::Arc;

use boundary_map_geography_models::Level;
use serde::{Deserialize, Serialize};

/// One feature as read from a source file, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    /// Zero-based position in the source file.
    pub index: usize,
    /// Attribute-table values, keyed by column name.
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// Geometry in source coordinates. `None` for null or unreadable shapes.
    pub geometry: Option<geo::Geometry<f64>>,
}

/// Per-level attribute naming, embedded as TOML.
///
/// Source files disagree about which columns carry names, so each list is
/// a set of candidates tried in order. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayerDefinition {
    /// Level this definition applies to.
    pub level: Level,
    /// Human-readable description of the layer.
    pub description: String,
    /// Columns holding the localized (local-script) name for this level.
    #[serde(default)]
    pub localized_fields: Vec<String>,
    /// Columns holding the Latin/transliterated name for this level.
    #[serde(default)]
    pub latin_fields: Vec<String>,
    /// Columns holding the parent region's name, if the source has them.
    #[serde(default)]
    pub parent_fields: Vec<String>,
    /// proj4 definition of the source CRS when coordinates are projected.
    /// `None` means the default national Lambert projection.
    pub projection: Option<String>,
}

/// Counters from one level import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Level that was imported.
    pub level: Level,
    /// Features read from the source file.
    pub features_read: u64,
    /// Canonical boundaries written (or that would be, on a dry run).
    pub imported: u64,
    /// Features skipped for missing or non-areal geometry.
    pub skipped_malformed: u64,
    /// Features skipped for coordinates outside WGS84 after reprojection.
    pub skipped_out_of_range: u64,
    /// Duplicate features whose geometry was merged into an earlier one.
    pub duplicates_merged: u64,
    /// Duplicate features discarded under first-seen deduplication.
    pub duplicates_dropped: u64,
    /// Features whose geometry was reprojected to WGS84.
    pub reprojected: u64,
    /// Names whose text encoding was repaired.
    pub names_repaired: u64,
    /// Boundaries whose parent came from a source attribute.
    pub parents_from_attributes: u64,
}

impl ImportReport {
    /// An all-zero report for `level`.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self {
            level,
            features_read: 0,
            imported: 0,
            skipped_malformed: 0,
            skipped_out_of_range: 0,
            duplicates_merged: 0,
            duplicates_dropped: 0,
            reprojected: 0,
            names_repaired: 0,
            parents_from_attributes: 0,
        }
    }

    /// Total features skipped for any reason.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.skipped_malformed + self.skipped_out_of_range
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} read, {} imported, {} skipped ({} malformed, {} out of range), \
             {} merged, {} dropped, {} reprojected, {} names repaired, {} parents from attributes",
            self.level,
            self.features_read,
            self.imported,
            self.skipped(),
            self.skipped_malformed,
            self.skipped_out_of_range,
            self.duplicates_merged,
            self.duplicates_dropped,
            self.reprojected,
            self.names_repaired,
            self.parents_from_attributes,
        )
    }
}

/// Outcome of one parent-resolution pass (one child level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    /// Level whose parents were resolved.
    pub level: Level,
    /// Boundaries considered.
    pub examined: u64,
    /// Boundaries given a parent.
    pub resolved: u64,
    /// Boundaries left without a parent.
    pub unresolved: u64,
}

/// Outcome of a full parent-resolution run, one entry per pass in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveReport {
    /// Pass results, root-most child level first.
    pub passes: Vec<PassReport>,
}

impl ResolveReport {
    /// Sum of `unresolved` across passes.
    #[must_use]
    pub fn total_unresolved(&self) -> u64 {
        self.passes.iter().map(|p| p.unresolved).sum()
    }

    /// The pass for `level`, if it ran.
    #[must_use]
    pub fn pass(&self, level: Level) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.level == level)
    }
}

/// Trait for reporting progress from long-running operations.
///
/// Implementations must be `Send + Sync` so one can be shared via `Arc`.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work (enables percentage/ETA).
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// A [`ProgressCallback`] that ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
