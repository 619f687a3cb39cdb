//! Raw feature → canonical [`Boundary`] conversion.
//!
//! Name extraction follows a fixed order, first match wins:
//!
//! 1. the layer's localized-name columns
//! 2. [`GENERIC_LOCALIZED_FIELDS`]
//! 3. the layer's Latin-name columns
//! 4. [`GENERIC_LATIN_FIELDS`]
//! 5. the first non-empty string attribute, in column order
//! 6. `"Unknown <level>"`
//!
//! `name` is the first Latin match (steps 3-4) if there is one, otherwise
//! the primary name above. `name_fa` is the first localized match (steps
//! 1-2) if there is one, otherwise the primary name.

use boundary_map_geography_models::{Boundary, BoundaryGeometry};
use boundary_map_ingest_models::{LayerDefinition, RawFeature};
use boundary_map_spatial::{GeometryError, geometry};

use crate::crs::{CrsError, LazyReprojector, Reprojection};
use crate::encoding::repair_text;

/// Localized-name columns tried for every level.
pub const GENERIC_LOCALIZED_FIELDS: &[&str] = &["NAME_FA", "NAM_FA", "FA_NAME", "PERSIAN", "NAME_LOCAL"];

/// Latin-name columns tried for every level.
pub const GENERIC_LATIN_FIELDS: &[&str] = &["NAME_EN", "NAME_ENG", "EN_NAME", "ENGLISH", "NAME"];

/// A successfully normalized feature and what was done to it.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFeature {
    /// The canonical record.
    pub boundary: Boundary,
    /// Whether the geometry was reprojected.
    pub reprojected: bool,
    /// How many extracted names had their encoding repaired.
    pub names_repaired: u64,
    /// Whether the parent came from a source attribute.
    pub parent_from_attributes: bool,
}

/// Per-feature normalization result. Skips are not errors: the caller
/// counts them and moves on.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureOutcome {
    /// The feature became a boundary.
    Normalized(Box<NormalizedFeature>),
    /// Missing, empty, or non-areal geometry.
    Malformed(String),
    /// Coordinates outside WGS84, either as read or because a projected
    /// vertex couldn't be transformed into range.
    OutOfRange(GeometryError),
}

/// Names pulled from a feature's attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedNames {
    /// Canonical name.
    pub name: String,
    /// Localized display name.
    pub name_fa: String,
    /// How many of the two slots were encoding-repaired.
    pub repaired: u64,
}

/// Case-insensitive, trimmed, non-empty string lookup.
fn lookup<'a>(
    properties: &'a serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> Option<&'a str> {
    properties
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(field))
        .and_then(|(_, value)| value.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn first_match<'a, S: AsRef<str>>(
    properties: &'a serde_json::Map<String, serde_json::Value>,
    fields: &[S],
) -> Option<&'a str> {
    fields.iter().find_map(|f| lookup(properties, f.as_ref()))
}

/// Extracts `name`/`name_fa` following the ordered policy above.
#[must_use]
pub fn extract_names(
    properties: &serde_json::Map<String, serde_json::Value>,
    layer: &LayerDefinition,
) -> ExtractedNames {
    let localized = first_match(properties, &layer.localized_fields)
        .or_else(|| first_match(properties, GENERIC_LOCALIZED_FIELDS));
    let latin = first_match(properties, &layer.latin_fields)
        .or_else(|| first_match(properties, GENERIC_LATIN_FIELDS));

    let primary = localized
        .or(latin)
        .or_else(|| {
            properties
                .values()
                .filter_map(serde_json::Value::as_str)
                .map(str::trim)
                .find(|s| !s.is_empty())
        })
        .map_or_else(|| format!("Unknown {}", layer.level), str::to_string);

    let mut repaired = 0;
    let mut repair = |text: String| {
        let result = repair_text(&text);
        if result.is_corrected() {
            repaired += 1;
        }
        result.into_text(&text)
    };

    let name = repair(latin.map_or_else(|| primary.clone(), str::to_string));
    let name_fa = repair(localized.map_or(primary, str::to_string));

    ExtractedNames {
        name,
        name_fa,
        repaired,
    }
}

/// Converts one raw feature to a canonical boundary.
///
/// Projected geometry is reprojected through `reprojector` and the bbox is
/// computed from the result. A parent is taken from the layer's parent
/// columns when present.
///
/// # Errors
///
/// Returns [`CrsError::Unavailable`] if the geometry needs reprojection
/// and the source projection can't be loaded. A vertex that fails to
/// transform only skips this feature, as [`FeatureOutcome::OutOfRange`].
pub fn normalize_feature(
    feature: RawFeature,
    layer: &LayerDefinition,
    reprojector: &mut LazyReprojector,
) -> Result<FeatureOutcome, CrsError> {
    let Some(raw_geometry) = feature.geometry else {
        return Ok(FeatureOutcome::Malformed("no geometry".to_string()));
    };

    let (geometry, reprojected) = match reprojector.reproject(raw_geometry) {
        Ok(Reprojection::AlreadyGeographic(g)) => (g, false),
        Ok(Reprojection::Reprojected(g)) => (g, true),
        Err(CrsError::TransformFailed { x, y, message }) => {
            log::debug!("Feature {} vertex ({x}, {y}) did not reproject: {message}", feature.index);
            return Ok(FeatureOutcome::OutOfRange(GeometryError::OutOfRange { x, y }));
        }
        Err(e @ CrsError::Unavailable { .. }) => return Err(e),
    };

    let geometry = match BoundaryGeometry::try_from(geometry) {
        Ok(g) => g,
        Err(e) => return Ok(FeatureOutcome::Malformed(e.to_string())),
    };

    match geometry::validate_boundary_geometry(&geometry) {
        Ok(()) => {}
        Err(e @ GeometryError::OutOfRange { .. }) => return Ok(FeatureOutcome::OutOfRange(e)),
        Err(e) => return Ok(FeatureOutcome::Malformed(e.to_string())),
    }

    let names = extract_names(&feature.properties, layer);
    let parent = first_match(&feature.properties, &layer.parent_fields)
        .map(|p| repair_text(p).into_text(p));

    let Some(mut boundary) = Boundary::new(
        layer.level,
        names.name,
        names.name_fa,
        geometry,
        feature.properties,
    ) else {
        return Ok(FeatureOutcome::Malformed("empty geometry".to_string()));
    };

    let parent_from_attributes = parent.is_some_and(|p| boundary.set_parent(p));

    Ok(FeatureOutcome::Normalized(Box::new(NormalizedFeature {
        boundary,
        reprojected,
        names_repaired: names.repaired,
        parent_from_attributes,
    })))
}
