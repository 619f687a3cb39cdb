//! Projected-coordinate detection and reprojection to WGS84.
//!
//! Some national boundary shapefiles ship in a Lambert Conformal Conic
//! projection with coordinates in metres. Any vertex outside the
//! longitude/latitude range marks the whole geometry as projected.

use boundary_map_spatial::geometry::{MAX_LATITUDE, MAX_LONGITUDE};
use geo::{Coord, CoordsIter, MapCoords};
use proj4rs::proj::Proj;

/// Lambert Conformal Conic definition used by national boundary datasets
/// when the layer doesn't name its own.
pub const DEFAULT_LAMBERT: &str = "+proj=lcc +lat_1=30 +lat_2=36 +lat_0=0 +lon_0=53 \
     +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs";

const WGS84: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Errors from reprojection.
#[derive(Debug, thiserror::Error)]
pub enum CrsError {
    /// A projection definition could not be loaded.
    #[error("Reprojection unavailable for {definition:?}: {message}")]
    Unavailable {
        /// The proj4 definition that failed.
        definition: String,
        /// Underlying error.
        message: String,
    },

    /// A coordinate could not be transformed.
    #[error("Failed to reproject ({x}, {y}): {message}")]
    TransformFailed {
        /// Source x.
        x: f64,
        /// Source y.
        y: f64,
        /// Underlying error.
        message: String,
    },
}

/// Result of [`Reprojector::reproject`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reprojection {
    /// Coordinates were already longitude/latitude; returned untouched.
    AlreadyGeographic(geo::Geometry<f64>),
    /// Coordinates were projected and have been converted.
    Reprojected(geo::Geometry<f64>),
}

impl Reprojection {
    /// The WGS84 geometry, whichever way it was obtained.
    #[must_use]
    pub fn into_geometry(self) -> geo::Geometry<f64> {
        match self {
            Self::AlreadyGeographic(g) | Self::Reprojected(g) => g,
        }
    }
}

/// Whether any vertex of `geometry` lies outside the longitude/latitude
/// range and so must be projected coordinates.
pub fn is_projected<G>(geometry: &G) -> bool
where
    G: CoordsIter<Scalar = f64>,
{
    geometry
        .coords_iter()
        .any(|c| c.x.abs() > MAX_LONGITUDE || c.y.abs() > MAX_LATITUDE)
}

/// Converts projected coordinates to WGS84 degrees.
pub struct Reprojector {
    source: Proj,
    target: Proj,
}

impl Reprojector {
    /// Builds a reprojector from a proj4 definition of the source CRS.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::Unavailable`] if either definition can't be
    /// parsed.
    pub fn new(definition: &str) -> Result<Self, CrsError> {
        let load = |def: &str| {
            Proj::from_proj_string(def).map_err(|e| CrsError::Unavailable {
                definition: def.to_string(),
                message: e.to_string(),
            })
        };
        Ok(Self {
            source: load(definition)?,
            target: load(WGS84)?,
        })
    }

    /// Reprojector for [`DEFAULT_LAMBERT`].
    ///
    /// # Errors
    ///
    /// See [`Reprojector::new`].
    pub fn lambert() -> Result<Self, CrsError> {
        Self::new(DEFAULT_LAMBERT)
    }

    /// Transforms one projected `(x, y)` to `(longitude, latitude)`.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::TransformFailed`] if the point can't be
    /// transformed or lands outside WGS84.
    pub fn transform_coord(&self, x: f64, y: f64) -> Result<Coord<f64>, CrsError> {
        let mut point = (x, y, 0.0);
        proj4rs::transform::transform(&self.source, &self.target, &mut point).map_err(|e| {
            CrsError::TransformFailed {
                x,
                y,
                message: e.to_string(),
            }
        })?;

        // Geographic output is in radians.
        let lng = point.0.to_degrees();
        let lat = point.1.to_degrees();
        if !lng.is_finite() || !lat.is_finite() || lng.abs() > MAX_LONGITUDE || lat.abs() > MAX_LATITUDE
        {
            return Err(CrsError::TransformFailed {
                x,
                y,
                message: format!("result ({lng}, {lat}) is not a WGS84 coordinate"),
            });
        }

        Ok(Coord { x: lng, y: lat })
    }

    /// Reprojects `geometry` if it's projected; otherwise hands it back.
    ///
    /// Every vertex is transformed and the ring/polygon nesting is kept.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::TransformFailed`] on the first vertex that fails.
    pub fn reproject(&self, geometry: geo::Geometry<f64>) -> Result<Reprojection, CrsError> {
        if !is_projected(&geometry) {
            return Ok(Reprojection::AlreadyGeographic(geometry));
        }
        let transformed = geometry.try_map_coords(|c| self.transform_coord(c.x, c.y))?;
        Ok(Reprojection::Reprojected(transformed))
    }
}

/// Builds its [`Reprojector`] only once a projected geometry shows up, so
/// geographic layers never need a projection definition at all.
pub struct LazyReprojector {
    definition: String,
    reprojector: Option<Reprojector>,
}

impl LazyReprojector {
    /// Defers loading `definition` until first use.
    #[must_use]
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
            reprojector: None,
        }
    }

    /// See [`Reprojector::reproject`].
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::Unavailable`] if the definition can't be loaded
    /// when it's first needed, or [`CrsError::TransformFailed`].
    pub fn reproject(&mut self, geometry: geo::Geometry<f64>) -> Result<Reprojection, CrsError> {
        if !is_projected(&geometry) {
            return Ok(Reprojection::AlreadyGeographic(geometry));
        }
        if self.reprojector.is_none() {
            log::info!("Loading source projection {}", self.definition);
            self.reprojector = Some(Reprojector::new(&self.definition)?);
        }
        match &self.reprojector {
            Some(reprojector) => reprojector.reproject(geometry),
            None => Err(CrsError::Unavailable {
                definition: self.definition.clone(),
                message: "projection was not initialized".to_string(),
            }),
        }
    }
}
