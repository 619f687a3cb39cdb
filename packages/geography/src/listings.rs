//! Listing storage with region attribution.
//!
//! Region names on a listing are computed once, when it's written. A
//! boundary re-import does not touch them; [`ListingStore::reattribute`]
//! is the explicit resync.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use boundary_map_database::listings_db;
use boundary_map_database_models::{
    AdministrativeRegion, ListingRow, NewListing, ViewportPage, ViewportQuery,
};
use duckdb::Connection;

use crate::GeoError;
use crate::resolver::resolve_region_at_point;
use crate::store::BoundaryStore;

/// Counters from a listing region resync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReattributeReport {
    /// Listings visited.
    pub examined: u64,
    /// Listings that resolved to at least a province.
    pub attributed: u64,
    /// Listings outside every known province.
    pub unattributed: u64,
}

/// Handle over the listings database.
pub struct ListingStore {
    conn: Mutex<Connection>,
}

impl ListingStore {
    /// Opens the listings DB at `path`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Database`] if the DB can't be opened.
    pub fn open(path: &Path) -> Result<Self, GeoError> {
        Ok(Self {
            conn: Mutex::new(listings_db::open(path)?),
        })
    }

    /// Opens an empty in-memory listings store.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Database`] if the DB can't be created.
    pub fn open_in_memory() -> Result<Self, GeoError> {
        Ok(Self {
            conn: Mutex::new(listings_db::open_in_memory()?),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, GeoError> {
        self.conn.lock().map_err(|_| GeoError::Poisoned)
    }

    /// Inserts a listing, filling its region by point containment.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Validation`] if the location is outside WGS84,
    /// or [`GeoError::Database`] if the write fails.
    pub fn insert(
        &self,
        listing: &NewListing,
        boundaries: &BoundaryStore,
    ) -> Result<ListingRow, GeoError> {
        let regions = resolve_region_at_point(boundaries, listing.latitude, listing.longitude)?;
        let region = AdministrativeRegion::from(&regions);

        let conn = self.conn()?;
        let id = listings_db::insert_listing(&conn, listing, &region)?;

        listings_db::get_listing(&conn, id)?.ok_or_else(|| {
            GeoError::Database(boundary_map_database::DbError::Conversion {
                message: format!("Inserted listing {id} not found"),
            })
        })
    }

    /// Fetches one listing by ID.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Database`] if the query fails.
    pub fn get(&self, id: i64) -> Result<Option<ListingRow>, GeoError> {
        Ok(listings_db::get_listing(&*self.conn()?, id)?)
    }

    /// Recomputes the region of every listing against the current
    /// boundaries.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if a query or update fails.
    pub fn reattribute(&self, boundaries: &BoundaryStore) -> Result<ReattributeReport, GeoError> {
        let conn = self.conn()?;
        let mut report = ReattributeReport::default();

        for (id, lng, lat) in listings_db::load_locations(&conn)? {
            report.examined += 1;
            let regions = match resolve_region_at_point(boundaries, lat, lng) {
                Ok(regions) => regions,
                Err(GeoError::Validation { message }) => {
                    log::warn!("Listing {id} has an invalid location: {message}");
                    report.unattributed += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if regions.province.is_some() {
                report.attributed += 1;
            } else {
                report.unattributed += 1;
            }
            listings_db::update_region(&conn, id, &AdministrativeRegion::from(&regions))?;
        }

        log::info!(
            "Reattributed {} listings: {} attributed, {} outside every province",
            report.examined,
            report.attributed,
            report.unattributed
        );

        Ok(report)
    }

    /// Runs an already-validated viewport query.
    pub(crate) fn query_viewport(&self, query: &ViewportQuery) -> Result<ViewportPage, GeoError> {
        Ok(listings_db::query_viewport(&*self.conn()?, query)?)
    }
}
