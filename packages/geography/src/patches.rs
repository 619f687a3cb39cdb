//! Province fallback boxes for known-defective source geometry.
//!
//! Some imported province polygons are present but fail containment tests
//! for points that are plainly inside them (self-intersecting rings,
//! slivers left by the source digitization). For those provinces only,
//! this table supplies a coarse bounding box consulted when the spatial
//! index finds no province at all.
//!
//! This is a data-quality patch. Delete an entry once the source geometry
//! for that province is fixed; nothing else depends on it.

use boundary_map_geography_models::BoundingBox;

/// One province whose stored geometry is unreliable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProvinceFallback {
    /// Canonical province name, as stored.
    pub name: &'static str,
    /// Localized province name, used when the store has no record.
    pub name_fa: &'static str,
    /// Coarse box covering the province.
    pub bbox: BoundingBox,
}

/// Provinces with defective source geometry.
pub const PROVINCE_FALLBACKS: &[ProvinceFallback] = &[
    ProvinceFallback {
        name: "Alborz",
        name_fa: "البرز",
        bbox: BoundingBox::new(50.1, 35.6, 51.3, 36.4),
    },
    ProvinceFallback {
        name: "Qom",
        name_fa: "قم",
        bbox: BoundingBox::new(50.1, 34.1, 51.9, 35.2),
    },
];

/// First fallback entry whose box contains the point (edges inclusive).
#[must_use]
pub fn find_fallback_province(lng: f64, lat: f64) -> Option<&'static ProvinceFallback> {
    PROVINCE_FALLBACKS
        .iter()
        .find(|fallback| fallback.bbox.contains(lng, lat))
}
