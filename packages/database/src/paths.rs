#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the `DuckDB` data directory.
//!
//! All paths are relative to the project root's `data/` directory and can
//! be overridden through environment variables by the binaries.

use std::path::{Path, PathBuf};

/// Environment variable overriding [`boundaries_db_path`].
pub const BOUNDARIES_DB_ENV: &str = "BOUNDARY_MAP_BOUNDARIES_DB";

/// Environment variable overriding [`listings_db_path`].
pub const LISTINGS_DB_ENV: &str = "BOUNDARY_MAP_LISTINGS_DB";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`; falls back to the
/// manifest directory itself if it has fewer than two ancestors.
#[must_use]
pub fn project_root() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest.ancestors().nth(2).unwrap_or(manifest).to_path_buf()
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the `data/shared/` directory for shared databases.
#[must_use]
pub fn shared_dir() -> PathBuf {
    data_dir().join("shared")
}

/// Returns the path for the boundaries `DuckDB` file.
///
/// Honors [`BOUNDARIES_DB_ENV`] when set.
#[must_use]
pub fn boundaries_db_path() -> PathBuf {
    std::env::var_os(BOUNDARIES_DB_ENV)
        .map_or_else(|| shared_dir().join("boundaries.duckdb"), PathBuf::from)
}

/// Returns the path for the listings `DuckDB` file.
///
/// Honors [`LISTINGS_DB_ENV`] when set.
#[must_use]
pub fn listings_db_path() -> PathBuf {
    std::env::var_os(LISTINGS_DB_ENV)
        .map_or_else(|| shared_dir().join("listings.duckdb"), PathBuf::from)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
