#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the boundary map server.
//!
//! Listings pages, region matches, and child summaries are served as their
//! model types directly. This crate holds the query parameter types and
//! the responses that only exist at the HTTP edge.

use boundary_map_geography_models::{Boundary, BoundingBox, Level};
use serde::{Deserialize, Serialize};

/// Response from the health endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
}

impl ApiError {
    /// Wraps `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Query parameters for the listings endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingsQueryParams {
    /// Bounding box as `west,south,east,north`.
    pub bbox: String,
    /// Province name (canonical or localized).
    pub province: Option<String>,
    /// County name (canonical or localized).
    pub county: Option<String>,
    /// Bakhsh name (canonical or localized).
    pub bakhsh: Option<String>,
    /// 1-based page number.
    pub page: Option<u32>,
    /// Results per page.
    pub page_size: Option<u32>,
}

/// Query parameters for the point-resolve endpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ResolveQueryParams {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

/// Properties attached to a boundary `GeoJSON` feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBoundaryProperties {
    /// Canonical name.
    pub name: String,
    /// Localized name.
    pub name_fa: String,
    /// Hierarchy tier.
    pub level: Level,
    /// Canonical name of the parent boundary.
    pub parent: Option<String>,
    /// Tier of `parent`.
    pub parent_level: Option<Level>,
    /// Bounds as `[west, south, east, north]`.
    pub bbox: [f64; 4],
}

/// A boundary rendered as a `GeoJSON` `Feature`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiBoundaryFeature {
    /// Always `"Feature"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// WGS84 geometry.
    pub geometry: geojson::Geometry,
    /// Name, level, and parent.
    pub properties: ApiBoundaryProperties,
    /// Feature-level bounds, per `GeoJSON` convention.
    pub bbox: [f64; 4],
}

impl From<&Boundary> for ApiBoundaryFeature {
    fn from(boundary: &Boundary) -> Self {
        let bbox = boundary.bbox.to_array();
        Self {
            kind: "Feature",
            geometry: boundary.geometry.to_geojson(),
            properties: ApiBoundaryProperties {
                name: boundary.name.clone(),
                name_fa: boundary.name_fa.clone(),
                level: boundary.level,
                parent: boundary.parent.clone(),
                parent_level: boundary.parent_level,
                bbox,
            },
            bbox,
        }
    }
}

/// Parses a bounding box string `"west,south,east,north"`.
///
/// Returns `None` unless there are exactly four numbers. Range and
/// degeneracy checks are left to the viewport query.
#[must_use]
pub fn parse_bbox(s: &str) -> Option<BoundingBox> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    if parts.len() == 4 {
        Some(BoundingBox::new(parts[0], parts[1], parts[2], parts[3]))
    } else {
        None
    }
}
