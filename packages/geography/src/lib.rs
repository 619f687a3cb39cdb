#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query-side boundary engine.
//!
//! [`store::BoundaryStore`] is the explicit handle over the persisted
//! boundaries and their in-memory spatial index. On top of it sit the
//! point-region resolver (with its isolated [`patches`] table), the
//! viewport listing query, and listing region attribution.

pub mod listings;
pub mod patches;
pub mod resolver;
pub mod store;
pub mod viewport;

use boundary_map_database::DbError;
use boundary_map_spatial::GeometryError;
use thiserror::Error;

/// Errors that can occur during geography operations.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Persistence layer failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// A boundary geometry failed validation.
    #[error("Invalid geometry for {name}: {source}")]
    Geometry {
        /// Canonical name of the offending boundary.
        name: String,
        /// What was wrong with it.
        source: GeometryError,
    },

    /// Caller input was rejected (bad bbox, point, or page).
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what was rejected.
        message: String,
    },

    /// A lock guarding the store was poisoned by a panicking thread.
    #[error("Boundary store lock poisoned")]
    Poisoned,
}

impl From<duckdb::Error> for GeoError {
    fn from(e: duckdb::Error) -> Self {
        Self::Database(DbError::Database(e))
    }
}

/// Rejects coordinates outside the WGS84 range or non-finite values.
///
/// # Errors
///
/// Returns [`GeoError::Validation`] describing the offending value.
pub fn validate_point(lat: f64, lng: f64) -> Result<geo::Point<f64>, GeoError> {
    if !lat.is_finite() || !lng.is_finite() {
        return Err(GeoError::Validation {
            message: format!("Coordinates must be finite: lat={lat}, lng={lng}"),
        });
    }
    if lat.abs() > boundary_map_spatial::geometry::MAX_LATITUDE {
        return Err(GeoError::Validation {
            message: format!("Latitude {lat} is outside [-90, 90]"),
        });
    }
    if lng.abs() > boundary_map_spatial::geometry::MAX_LONGITUDE {
        return Err(GeoError::Validation {
            message: format!("Longitude {lng} is outside [-180, 180]"),
        });
    }
    Ok(geo::Point::new(lng, lat))
}
