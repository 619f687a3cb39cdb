//! Coordinate-level geometry helpers: bounds, approximate centroids,
//! WGS84 range validation, and ring vertex sampling.

use boundary_map_geography_models::{BoundaryGeometry, BoundingBox};
use geo::{Area, Contains, CoordsIter, Point, Polygon};

use crate::GeometryError;

/// Largest absolute longitude in WGS84.
pub const MAX_LONGITUDE: f64 = 180.0;

/// Largest absolute latitude in WGS84.
pub const MAX_LATITUDE: f64 = 90.0;

/// Minimal axis-aligned box containing every vertex of `geometry`.
///
/// Walks all coordinates regardless of nesting, so polygons, rings, and
/// multi-polygons all work. Returns `None` when there are no vertices.
pub fn compute_bbox<G>(geometry: &G) -> Option<BoundingBox>
where
    G: CoordsIter<Scalar = f64>,
{
    geometry.coords_iter().fold(None, |acc, c| {
        Some(match acc {
            None => BoundingBox::new(c.x, c.y, c.x, c.y),
            Some(b) => BoundingBox::new(
                b.west.min(c.x),
                b.south.min(c.y),
                b.east.max(c.x),
                b.north.max(c.y),
            ),
        })
    })
}

/// [`compute_bbox`] for a [`BoundaryGeometry`].
#[must_use]
pub fn boundary_bbox(geometry: &BoundaryGeometry) -> Option<BoundingBox> {
    match geometry {
        BoundaryGeometry::Polygon(p) => compute_bbox(p),
        BoundaryGeometry::MultiPolygon(mp) => compute_bbox(mp),
    }
}

/// Arithmetic mean of every vertex across every ring.
///
/// This is an approximation, not an area-weighted centroid. For concave or
/// multi-part shapes the result can fall outside the geometry, so it is
/// only suitable as a first sample point.
#[must_use]
pub fn compute_centroid(geometry: &BoundaryGeometry) -> Option<Point<f64>> {
    fn mean<G: CoordsIter<Scalar = f64>>(geometry: &G) -> Option<Point<f64>> {
        let (sum_x, sum_y, count) = geometry
            .coords_iter()
            .fold((0.0, 0.0, 0_usize), |(x, y, n), c| (x + c.x, y + c.y, n + 1));
        if count == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = count as f64;
        Some(Point::new(sum_x / n, sum_y / n))
    }

    match geometry {
        BoundaryGeometry::Polygon(p) => mean(p),
        BoundaryGeometry::MultiPolygon(mp) => mean(mp),
    }
}

/// Rejects a geometry with no vertices or with any vertex that is
/// non-finite or outside `|lng| <= 180, |lat| <= 90`.
///
/// # Errors
///
/// Returns the first offending condition as a [`GeometryError`].
pub fn validate_coordinate_range<G>(geometry: &G) -> Result<(), GeometryError>
where
    G: CoordsIter<Scalar = f64>,
{
    let mut seen = false;
    for c in geometry.coords_iter() {
        seen = true;
        if !c.x.is_finite() || !c.y.is_finite() {
            return Err(GeometryError::NonFinite);
        }
        if c.x.abs() > MAX_LONGITUDE || c.y.abs() > MAX_LATITUDE {
            return Err(GeometryError::OutOfRange { x: c.x, y: c.y });
        }
    }
    if seen {
        Ok(())
    } else {
        Err(GeometryError::Empty)
    }
}

/// [`validate_coordinate_range`] for a [`BoundaryGeometry`].
///
/// # Errors
///
/// See [`validate_coordinate_range`].
pub fn validate_boundary_geometry(geometry: &BoundaryGeometry) -> Result<(), GeometryError> {
    match geometry {
        BoundaryGeometry::Polygon(p) => validate_coordinate_range(p),
        BoundaryGeometry::MultiPolygon(mp) => validate_coordinate_range(mp),
    }
}

/// Strict point-in-polygon test. Points on an edge are not contained.
#[must_use]
pub fn contains_point(geometry: &BoundaryGeometry, point: &Point<f64>) -> bool {
    match geometry {
        BoundaryGeometry::Polygon(p) => p.contains(point),
        BoundaryGeometry::MultiPolygon(mp) => mp.contains(point),
    }
}

/// Planar area in square degrees. Only meaningful for ordering.
#[must_use]
pub fn planar_area(geometry: &BoundaryGeometry) -> f64 {
    match geometry {
        BoundaryGeometry::Polygon(p) => p.unsigned_area(),
        BoundaryGeometry::MultiPolygon(mp) => mp.unsigned_area(),
    }
}

/// Up to `max` vertices taken at even strides from the outer ring of the
/// largest part. The closing vertex is skipped.
#[must_use]
pub fn sample_outer_ring(geometry: &BoundaryGeometry, max: usize) -> Vec<Point<f64>> {
    let largest: Option<&Polygon<f64>> = match geometry {
        BoundaryGeometry::Polygon(p) => Some(p),
        BoundaryGeometry::MultiPolygon(mp) => mp
            .0
            .iter()
            .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area())),
    };
    let Some(polygon) = largest else {
        return Vec::new();
    };

    let ring = &polygon.exterior().0;
    let open_len = if ring.len() > 1 && ring.first() == ring.last() {
        ring.len() - 1
    } else {
        ring.len()
    };
    if open_len == 0 || max == 0 {
        return Vec::new();
    }

    let stride = open_len.div_ceil(max);
    ring[..open_len]
        .iter()
        .step_by(stride)
        .take(max)
        .map(|c| Point::from(*c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPolygon, polygon};

    fn l_shape() -> Polygon<f64> {
        // Concave: the vertex mean lands in the notch.
        polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 1.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 10.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ]
    }

    #[test]
    fn bbox_covers_every_vertex() {
        let mp = MultiPolygon(vec![
            l_shape(),
            polygon![(x: -3.0, y: 2.0), (x: -1.0, y: 2.0), (x: -2.0, y: 15.0), (x: -3.0, y: 2.0)],
        ]);
        let bbox = compute_bbox(&mp).unwrap();
        assert_eq!(bbox, BoundingBox::new(-3.0, 0.0, 10.0, 15.0));
        for c in mp.coords_iter() {
            assert!(bbox.contains(c.x, c.y));
        }
    }

    #[test]
    fn bbox_of_nothing_is_none() {
        let empty: MultiPolygon<f64> = MultiPolygon(vec![]);
        assert!(compute_bbox(&empty).is_none());
    }

    #[test]
    fn bbox_matches_model_bounds() {
        let geometry = BoundaryGeometry::Polygon(l_shape());
        assert_eq!(boundary_bbox(&geometry), geometry.bounding_box());
    }

    #[test]
    fn centroid_is_vertex_mean_and_can_fall_outside() {
        let geometry = BoundaryGeometry::Polygon(l_shape());
        let centroid = compute_centroid(&geometry).unwrap();
        // 7 coords including the closing one.
        assert!((centroid.x() - 22.0 / 7.0).abs() < 1e-12);
        assert!((centroid.y() - 22.0 / 7.0).abs() < 1e-12);
        assert!(!contains_point(&geometry, &centroid));
    }

    #[test]
    fn rejects_out_of_range_vertices() {
        let projected = polygon![
            (x: 600_000.0, y: 3_900_000.0),
            (x: 600_100.0, y: 3_900_000.0),
            (x: 600_100.0, y: 3_900_100.0),
            (x: 600_000.0, y: 3_900_000.0),
        ];
        assert!(matches!(
            validate_coordinate_range(&projected),
            Err(GeometryError::OutOfRange { .. })
        ));
        assert!(validate_coordinate_range(&l_shape()).is_ok());
        let empty: MultiPolygon<f64> = MultiPolygon(vec![]);
        assert!(matches!(
            validate_coordinate_range(&empty),
            Err(GeometryError::Empty)
        ));
    }

    #[test]
    fn sampled_vertices_come_from_largest_part() {
        let geometry = BoundaryGeometry::MultiPolygon(MultiPolygon(vec![
            polygon![(x: 50.0, y: 50.0), (x: 50.5, y: 50.0), (x: 50.0, y: 50.5), (x: 50.0, y: 50.0)],
            l_shape(),
        ]));
        let samples = sample_outer_ring(&geometry, 3);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], Point::new(0.0, 0.0));
        assert!(samples.iter().all(|p| p.x() <= 10.0));
    }
}
