#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` persistence for the boundary map.
//!
//! Boundaries and listings live in separate `DuckDB` files under `data/`.
//! Geometry is stored as `GeoJSON` TEXT with its bounding box alongside;
//! spatial indexing happens in memory (see `boundary_map_spatial`).

pub mod boundaries_db;
pub mod listings_db;
pub mod paths;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query or connection error.
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    /// Filesystem error preparing the data directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of stored metadata failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
