#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Listing row types and viewport query parameter definitions.
//!
//! A listing is a located entity owned by the surrounding application. This
//! crate only models the parts the boundary engine reads and writes: the
//! point location and the denormalized administrative region triple.

use boundary_map_geography_models::{BoundingBox, RegionMatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of listings per viewport page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Region names cached on a listing at write time.
///
/// Not kept in sync with boundary re-imports; a resync has to be run
/// explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdministrativeRegion {
    /// Canonical province name.
    pub province: Option<String>,
    /// Canonical county name.
    pub county: Option<String>,
    /// Canonical bakhsh name.
    pub bakhsh: Option<String>,
}

impl From<&RegionMatch> for AdministrativeRegion {
    fn from(regions: &RegionMatch) -> Self {
        Self {
            province: regions.province.as_ref().map(|r| r.name.clone()),
            county: regions.county.as_ref().map(|r| r.name.clone()),
            bakhsh: regions.bakhsh.as_ref().map(|r| r.name.clone()),
        }
    }
}

/// A listing to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    /// Display title.
    pub title: String,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Creation time. Drives pagination order.
    pub created_at: DateTime<Utc>,
}

/// A listing row as retrieved from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRow {
    /// Primary key.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Denormalized region names.
    pub region: AdministrativeRegion,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Exact-match region filters. `None` means "don't filter on this tier".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionFilters {
    /// Required province name.
    pub province: Option<String>,
    /// Required county name.
    pub county: Option<String>,
    /// Required bakhsh name.
    pub bakhsh: Option<String>,
}

/// Parameters for a viewport listing query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportQuery {
    /// Visible map area.
    pub bbox: BoundingBox,
    /// Region restrictions.
    pub filters: RegionFilters,
    /// 1-based page number.
    pub page: u32,
    /// Listings per page.
    pub page_size: u32,
}

impl ViewportQuery {
    /// Creates a query for the given page with the default page size.
    #[must_use]
    pub const fn new(bbox: BoundingBox, filters: RegionFilters, page: u32) -> Self {
        Self {
            bbox,
            filters,
            page,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Row offset for the requested page. Page 0 is treated as page 1.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.page_size as u64
    }
}

/// Pagination metadata for a viewport result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// 1-based page number.
    pub page: u32,
    /// Listings per page.
    pub page_size: u32,
    /// Total matching listings across all pages.
    pub total: u64,
    /// Number of pages needed to cover `total`.
    pub total_pages: u64,
}

impl Pagination {
    /// Builds pagination metadata for a page of a result of size `total`.
    #[must_use]
    pub const fn new(page: u32, page_size: u32, total: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size as u64)
        };
        Self {
            page,
            page_size,
            total,
            total_pages,
        }
    }
}

/// One page of listings inside a viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportPage {
    /// Listings on this page.
    pub entities: Vec<ListingRow>,
    /// Pagination metadata.
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_one_based() {
        let bbox = BoundingBox::new(51.0, 35.0, 52.0, 36.0);
        let mut query = ViewportQuery::new(bbox, RegionFilters::default(), 1);
        assert_eq!(query.offset(), 0);
        query.page = 3;
        query.page_size = 25;
        assert_eq!(query.offset(), 50);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(Pagination::new(1, 20, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 20, 20).total_pages, 1);
        assert_eq!(Pagination::new(1, 20, 21).total_pages, 2);
    }
}
