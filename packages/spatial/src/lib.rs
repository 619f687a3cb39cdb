#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for administrative boundary lookups.
//!
//! Builds one R-tree per hierarchy level from canonical [`Boundary`]
//! records and answers point-in-polygon queries. Also hosts the
//! coordinate-level [`geometry`] helpers shared by ingestion and the
//! parent resolver.

pub mod geometry;

use std::collections::BTreeMap;

use boundary_map_geography_models::{Boundary, Level, RegionMatch, RegionRef};
use geo::Point;
use rstar::{AABB, RTree, RTreeObject};

/// Errors from geometry validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// The geometry has no vertices.
    #[error("Geometry has no coordinates")]
    Empty,

    /// A vertex is NaN or infinite.
    #[error("Geometry has a non-finite coordinate")]
    NonFinite,

    /// A vertex lies outside the WGS84 range.
    #[error("Coordinate ({x}, {y}) is outside the WGS84 range")]
    OutOfRange {
        /// Offending x (longitude) value.
        x: f64,
        /// Offending y (latitude) value.
        y: f64,
    },
}

/// A boundary stored in the R-tree with its precomputed envelope and area.
struct BoundaryEntry {
    area: f64,
    envelope: AABB<[f64; 2]>,
    boundary: Boundary,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Per-level R-tree indexes over boundary geometry.
///
/// Immutable once built. Callers rebuild it after the underlying boundary
/// set changes.
pub struct SpatialIndex {
    levels: BTreeMap<Level, RTree<BoundaryEntry>>,
}

impl SpatialIndex {
    /// Bulk-loads one R-tree per level present in `boundaries`.
    #[must_use]
    pub fn build(boundaries: Vec<Boundary>) -> Self {
        let mut grouped: BTreeMap<Level, Vec<BoundaryEntry>> = BTreeMap::new();

        for boundary in boundaries {
            let envelope = AABB::from_corners(
                [boundary.bbox.west, boundary.bbox.south],
                [boundary.bbox.east, boundary.bbox.north],
            );
            let area = geometry::planar_area(&boundary.geometry);
            grouped.entry(boundary.level).or_default().push(BoundaryEntry {
                area,
                envelope,
                boundary,
            });
        }

        let levels = grouped
            .into_iter()
            .map(|(level, entries)| {
                log::debug!("Indexing {} {level} boundaries", entries.len());
                (level, RTree::bulk_load(entries))
            })
            .collect();

        Self { levels }
    }

    /// Number of indexed boundaries at `level`.
    #[must_use]
    pub fn len(&self, level: Level) -> usize {
        self.levels.get(&level).map_or(0, RTree::size)
    }

    /// Whether nothing is indexed at any level.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.values().all(|tree| tree.size() == 0)
    }

    /// The boundary at `level` whose geometry strictly contains `point`.
    ///
    /// Boundaries at one level should tile without overlap, but source data
    /// is not always clean: when several contain the point, the smallest
    /// area wins, then the lexically first name. Never returns a nearest
    /// non-containing match.
    #[must_use]
    pub fn find_containing(&self, level: Level, point: Point<f64>) -> Option<&Boundary> {
        let tree = self.levels.get(&level)?;
        let query_env = AABB::from_point([point.x(), point.y()]);

        let mut best: Option<&BoundaryEntry> = None;

        for entry in tree.locate_in_envelope_intersecting(&query_env) {
            if !geometry::contains_point(&entry.boundary.geometry, &point) {
                continue;
            }
            best = match best {
                None => Some(entry),
                Some(current)
                    if entry.area < current.area
                        || (entry.area.total_cmp(&current.area).is_eq()
                            && entry.boundary.name < current.boundary.name) =>
                {
                    Some(entry)
                }
                keep => keep,
            };
        }

        best.map(|e| &e.boundary)
    }

    /// Resolves province, county, and bakhsh for a point in one pass.
    #[must_use]
    pub fn find_all_containing(&self, point: Point<f64>) -> RegionMatch {
        let lookup = |level| self.find_containing(level, point).map(RegionRef::from);
        RegionMatch {
            province: lookup(Level::Province),
            county: lookup(Level::County),
            bakhsh: lookup(Level::Bakhsh),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boundary_map_geography_models::BoundaryGeometry;
    use geo::{Polygon, polygon};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0)]
    }

    fn boundary(level: Level, name: &str, poly: Polygon<f64>) -> Boundary {
        Boundary::new(
            level,
            name,
            name,
            BoundaryGeometry::Polygon(poly),
            serde_json::Map::new(),
        )
        .unwrap()
    }

    fn fixture() -> SpatialIndex {
        SpatialIndex::build(vec![
            boundary(Level::Province, "Tehran", rect(50.0, 35.0, 53.0, 36.5)),
            boundary(Level::Province, "Gilan", rect(48.5, 36.5, 50.5, 38.5)),
            boundary(Level::County, "Rasht", rect(49.3, 37.0, 49.9, 37.5)),
            boundary(Level::County, "Rey", rect(51.3, 35.0, 52.0, 35.6)),
            boundary(Level::Bakhsh, "Kuchesfahan", rect(49.5, 37.2, 49.9, 37.5)),
        ])
    }

    #[test]
    fn finds_boundary_for_interior_point() {
        let index = fixture();
        let hit = index
            .find_containing(Level::Province, Point::new(51.4, 35.7))
            .unwrap();
        assert_eq!(hit.name, "Tehran");
        assert_eq!(index.len(Level::Province), 2);
    }

    #[test]
    fn outside_every_boundary_returns_none() {
        let index = fixture();
        assert!(index
            .find_containing(Level::Province, Point::new(60.0, 30.0))
            .is_none());
        // Inside Tehran's envelope row but not within any county.
        assert!(index
            .find_containing(Level::County, Point::new(50.5, 35.2))
            .is_none());
    }

    #[test]
    fn empty_level_returns_none() {
        let index = fixture();
        assert!(index.find_containing(Level::City, Point::new(49.6, 37.3)).is_none());
        assert_eq!(index.len(Level::City), 0);
    }

    #[test]
    fn overlapping_candidates_resolve_to_smallest() {
        let index = SpatialIndex::build(vec![
            boundary(Level::County, "Big", rect(0.0, 0.0, 10.0, 10.0)),
            boundary(Level::County, "Small", rect(4.0, 4.0, 6.0, 6.0)),
        ]);
        let hit = index.find_containing(Level::County, Point::new(5.0, 5.0)).unwrap();
        assert_eq!(hit.name, "Small");
    }

    #[test]
    fn resolves_all_tiers_at_once() {
        let index = fixture();
        let regions = index.find_all_containing(Point::new(49.7, 37.3));
        assert_eq!(regions.province.map(|r| r.name).as_deref(), Some("Gilan"));
        assert_eq!(regions.county.map(|r| r.name).as_deref(), Some("Rasht"));
        assert_eq!(regions.bakhsh.map(|r| r.name).as_deref(), Some("Kuchesfahan"));

        let partial = index.find_all_containing(Point::new(51.0, 36.0));
        assert_eq!(partial.province.map(|r| r.name).as_deref(), Some("Tehran"));
        assert!(partial.county.is_none());
        assert!(partial.bakhsh.is_none());
    }
}
