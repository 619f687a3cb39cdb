#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Administrative boundary types.
//!
//! Defines the fixed four-tier hierarchy (province, county, bakhsh, city),
//! the canonical [`Boundary`] record produced by ingestion and persisted
//! by the boundary store, and the small region types returned by point
//! lookups. Geometry is always WGS84 in (longitude, latitude) order.

use geo::{BoundingRect, MultiPolygon, Polygon};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumString};

/// One tier of the administrative hierarchy. Province is the root.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Level {
    /// Top tier (ostan).
    #[strum(to_string = "province", serialize = "ostan")]
    Province,
    /// Second tier (shahrestan).
    #[strum(to_string = "county", serialize = "shahrestan")]
    County,
    /// Third tier, the district within a county.
    #[strum(to_string = "bakhsh", serialize = "district")]
    Bakhsh,
    /// Fourth tier (shahr).
    #[strum(to_string = "city", serialize = "shahr")]
    City,
}

impl Level {
    /// All levels, root first.
    pub const ALL: &[Self] = &[Self::Province, Self::County, Self::Bakhsh, Self::City];

    /// Returns the level directly above this one, or `None` for provinces.
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Province => None,
            Self::County => Some(Self::Province),
            Self::Bakhsh => Some(Self::County),
            Self::City => Some(Self::Bakhsh),
        }
    }

    /// Returns the level directly below this one, or `None` for cities.
    #[must_use]
    pub const fn child(self) -> Option<Self> {
        match self {
            Self::Province => Some(Self::County),
            Self::County => Some(Self::Bakhsh),
            Self::Bakhsh => Some(Self::City),
            Self::City => None,
        }
    }
}

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Creates a bounding box from `[minLng, minLat, maxLng, maxLat]`.
    #[must_use]
    pub const fn from_array(bbox: [f64; 4]) -> Self {
        Self::new(bbox[0], bbox[1], bbox[2], bbox[3])
    }

    /// Returns `[minLng, minLat, maxLng, maxLat]`.
    #[must_use]
    pub const fn to_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }

    /// Whether the box has finite corners and a positive extent on both
    /// axes. A box whose min equals its max on either axis is degenerate.
    #[must_use]
    pub fn is_non_degenerate(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
            && self.west < self.east
            && self.south < self.north
    }

    /// Whether every corner lies inside the WGS84 coordinate range.
    #[must_use]
    pub fn is_within_wgs84(&self) -> bool {
        self.west >= -180.0
            && self.east <= 180.0
            && self.south >= -90.0
            && self.north <= 90.0
    }

    /// Inclusive point test.
    #[must_use]
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        lng >= self.west && lng <= self.east && lat >= self.south && lat <= self.north
    }

    /// Smallest box covering both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            self.west.min(other.west),
            self.south.min(other.south),
            self.east.max(other.east),
            self.north.max(other.north),
        )
    }
}

impl From<geo::Rect<f64>> for BoundingBox {
    fn from(rect: geo::Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// Boundary geometry: a single polygon or a multi-part region.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryGeometry {
    /// A single polygon with optional holes.
    Polygon(Polygon<f64>),
    /// Several disjoint parts (islands, enclaves).
    MultiPolygon(MultiPolygon<f64>),
}

impl BoundaryGeometry {
    /// Returns the geometry as a [`MultiPolygon`], wrapping a lone polygon.
    #[must_use]
    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        match self {
            Self::Polygon(p) => MultiPolygon(vec![p.clone()]),
            Self::MultiPolygon(mp) => mp.clone(),
        }
    }

    /// Consumes the geometry and returns it as a [`MultiPolygon`].
    #[must_use]
    pub fn into_multi_polygon(self) -> MultiPolygon<f64> {
        match self {
            Self::Polygon(p) => MultiPolygon(vec![p]),
            Self::MultiPolygon(mp) => mp,
        }
    }

    /// Merges another geometry into this one as additional parts.
    ///
    /// The result is always a `MultiPolygon`. Parts are appended, not
    /// dissolved, so overlapping inputs stay overlapping.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        let mut parts = self.into_multi_polygon();
        parts.0.extend(other.into_multi_polygon().0);
        Self::MultiPolygon(parts)
    }

    /// Number of polygon parts.
    #[must_use]
    pub fn part_count(&self) -> usize {
        match self {
            Self::Polygon(_) => 1,
            Self::MultiPolygon(mp) => mp.0.len(),
        }
    }

    /// Axis-aligned bounds of every vertex, or `None` for an empty geometry.
    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            Self::Polygon(p) => p.bounding_rect().map(BoundingBox::from),
            Self::MultiPolygon(mp) => mp.bounding_rect().map(BoundingBox::from),
        }
    }

    /// Converts to a `GeoJSON` geometry object.
    #[must_use]
    pub fn to_geojson(&self) -> geojson::Geometry {
        match self {
            Self::Polygon(p) => geojson::Geometry::new(geojson::Value::from(p)),
            Self::MultiPolygon(mp) => geojson::Geometry::new(geojson::Value::from(mp)),
        }
    }

    /// Serializes to a `GeoJSON` geometry string.
    #[must_use]
    pub fn to_geojson_string(&self) -> String {
        self.to_geojson().to_string()
    }

    /// Parses a `GeoJSON` geometry string.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryParseError`] if the text is not `GeoJSON` or the
    /// geometry is not a `Polygon`/`MultiPolygon`.
    pub fn from_geojson_str(text: &str) -> Result<Self, GeometryParseError> {
        let geojson: geojson::GeoJson = text
            .parse()
            .map_err(|e: geojson::Error| GeometryParseError::InvalidGeoJson(e.to_string()))?;
        match geojson {
            geojson::GeoJson::Geometry(geometry) => Self::try_from(geometry),
            geojson::GeoJson::Feature(feature) => feature
                .geometry
                .ok_or(GeometryParseError::Unsupported("null"))
                .and_then(Self::try_from),
            geojson::GeoJson::FeatureCollection(_) => {
                Err(GeometryParseError::Unsupported("FeatureCollection"))
            }
        }
    }
}

impl TryFrom<geo::Geometry<f64>> for BoundaryGeometry {
    type Error = GeometryParseError;

    fn try_from(geometry: geo::Geometry<f64>) -> Result<Self, Self::Error> {
        match geometry {
            geo::Geometry::Polygon(p) => Ok(Self::Polygon(p)),
            geo::Geometry::MultiPolygon(mp) => Ok(Self::MultiPolygon(mp)),
            geo::Geometry::Point(_) => Err(GeometryParseError::Unsupported("Point")),
            geo::Geometry::Line(_) => Err(GeometryParseError::Unsupported("Line")),
            geo::Geometry::LineString(_) => Err(GeometryParseError::Unsupported("LineString")),
            geo::Geometry::MultiPoint(_) => Err(GeometryParseError::Unsupported("MultiPoint")),
            geo::Geometry::MultiLineString(_) => {
                Err(GeometryParseError::Unsupported("MultiLineString"))
            }
            geo::Geometry::GeometryCollection(_) => {
                Err(GeometryParseError::Unsupported("GeometryCollection"))
            }
            geo::Geometry::Rect(r) => Ok(Self::Polygon(r.to_polygon())),
            geo::Geometry::Triangle(t) => Ok(Self::Polygon(t.to_polygon())),
        }
    }
}

impl TryFrom<geojson::Geometry> for BoundaryGeometry {
    type Error = GeometryParseError;

    fn try_from(geometry: geojson::Geometry) -> Result<Self, Self::Error> {
        let geo_geom: geo::Geometry<f64> = geometry
            .try_into()
            .map_err(|e: geojson::Error| GeometryParseError::InvalidGeoJson(e.to_string()))?;
        Self::try_from(geo_geom)
    }
}

impl Serialize for BoundaryGeometry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_geojson().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BoundaryGeometry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let geometry = geojson::Geometry::deserialize(deserializer)?;
        Self::try_from(geometry).map_err(serde::de::Error::custom)
    }
}

/// Error returned when text or a geometry can't become a [`BoundaryGeometry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryParseError {
    /// The input was not valid `GeoJSON`.
    InvalidGeoJson(String),
    /// The geometry type is not areal.
    Unsupported(&'static str),
}

impl std::fmt::Display for GeometryParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidGeoJson(message) => write!(f, "invalid GeoJSON: {message}"),
            Self::Unsupported(kind) => {
                write!(f, "unsupported geometry type {kind}: expected Polygon or MultiPolygon")
            }
        }
    }
}

impl std::error::Error for GeometryParseError {}

/// A canonical administrative boundary.
///
/// Exactly one record exists per `(level, name)`. `bbox` always matches
/// `geometry`; use [`Boundary::set_geometry`] rather than assigning the
/// field directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boundary {
    /// Hierarchy tier.
    pub level: Level,
    /// Canonical (Latin or transliterated) name, unique within the level.
    pub name: String,
    /// Localized display name. Equal to `name` when only a local-script
    /// name was available.
    pub name_fa: String,
    /// Canonical name of the containing boundary one level up.
    pub parent: Option<String>,
    /// Level of `parent`; always `level.parent()` when set.
    pub parent_level: Option<Level>,
    /// WGS84 geometry.
    pub geometry: BoundaryGeometry,
    /// Cached bounds of `geometry`.
    pub bbox: BoundingBox,
    /// Original source attributes, passed through untouched.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Boundary {
    /// Builds a boundary with no parent, computing `bbox` from `geometry`.
    ///
    /// Returns `None` if the geometry has no vertices.
    #[must_use]
    pub fn new(
        level: Level,
        name: impl Into<String>,
        name_fa: impl Into<String>,
        geometry: BoundaryGeometry,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Option<Self> {
        let bbox = geometry.bounding_box()?;
        Some(Self {
            level,
            name: name.into(),
            name_fa: name_fa.into(),
            parent: None,
            parent_level: None,
            geometry,
            bbox,
            metadata,
        })
    }

    /// Replaces the geometry and recomputes `bbox`.
    ///
    /// Leaves the record untouched and returns `false` if the new geometry
    /// is empty.
    pub fn set_geometry(&mut self, geometry: BoundaryGeometry) -> bool {
        let Some(bbox) = geometry.bounding_box() else {
            return false;
        };
        self.geometry = geometry;
        self.bbox = bbox;
        true
    }

    /// Sets `parent` and derives `parent_level` from `level`.
    ///
    /// Returns `false` (and changes nothing) for provinces.
    pub fn set_parent(&mut self, parent: impl Into<String>) -> bool {
        let Some(parent_level) = self.level.parent() else {
            return false;
        };
        self.parent = Some(parent.into());
        self.parent_level = Some(parent_level);
        true
    }

    /// Case-insensitive match against either the canonical or the
    /// localized name.
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        let needle = name.trim();
        self.name.eq_ignore_ascii_case(needle) || self.name_fa == needle
    }
}

/// Name pair identifying a resolved region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionRef {
    /// Canonical name.
    pub name: String,
    /// Localized display name.
    pub name_fa: String,
}

impl From<&Boundary> for RegionRef {
    fn from(boundary: &Boundary) -> Self {
        Self {
            name: boundary.name.clone(),
            name_fa: boundary.name_fa.clone(),
        }
    }
}

/// The province/county/bakhsh containing a point. Any tier may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionMatch {
    /// Containing province.
    pub province: Option<RegionRef>,
    /// Containing county.
    pub county: Option<RegionRef>,
    /// Containing bakhsh.
    pub bakhsh: Option<RegionRef>,
}

impl RegionMatch {
    /// Whether no tier was resolved.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.province.is_none() && self.county.is_none() && self.bakhsh.is_none()
    }
}

/// Lightweight listing of a boundary for cascading selection lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundarySummary {
    /// Canonical name.
    pub name: String,
    /// Localized display name.
    pub name_fa: String,
    /// Hierarchy tier.
    pub level: Level,
}

impl From<&Boundary> for BoundarySummary {
    fn from(boundary: &Boundary) -> Self {
        Self {
            name: boundary.name.clone(),
            name_fa: boundary.name_fa.clone(),
            level: boundary.level,
        }
    }
}
