//! Map viewport listing queries.
//!
//! Validates the request, normalizes region filters to canonical names,
//! and pages through listings whose point lies in the box. Filters compare
//! against the region names stored on each listing at write time.

use boundary_map_database_models::{
    MAX_PAGE_SIZE, RegionFilters, ViewportPage, ViewportQuery,
};
use boundary_map_geography_models::Level;

use crate::GeoError;
use crate::listings::ListingStore;
use crate::store::BoundaryStore;

/// Returns one page of listings inside `query.bbox` matching every filter.
///
/// `page` is 1-based; `page_size` is clamped to `1..=100`. A localized
/// filter value (e.g. `تهران`) is translated to the canonical name it
/// refers to; unknown names are used as given and simply match nothing.
///
/// # Errors
///
/// Returns [`GeoError::Validation`] for a degenerate or out-of-range bbox
/// or page 0, and [`GeoError::Database`] if a query fails.
pub fn query_viewport(
    listings: &ListingStore,
    boundaries: &BoundaryStore,
    query: &ViewportQuery,
) -> Result<ViewportPage, GeoError> {
    let bbox = query.bbox;
    if !bbox.is_non_degenerate() {
        return Err(GeoError::Validation {
            message: format!(
                "Degenerate bbox [{}, {}, {}, {}]: min must be less than max on both axes",
                bbox.west, bbox.south, bbox.east, bbox.north
            ),
        });
    }
    if !bbox.is_within_wgs84() {
        return Err(GeoError::Validation {
            message: format!(
                "Bbox [{}, {}, {}, {}] is outside the WGS84 range",
                bbox.west, bbox.south, bbox.east, bbox.north
            ),
        });
    }
    if query.page == 0 {
        return Err(GeoError::Validation {
            message: "Page numbers start at 1".to_string(),
        });
    }

    let normalized = ViewportQuery {
        bbox,
        filters: normalize_filters(boundaries, &query.filters)?,
        page: query.page,
        page_size: query.page_size.clamp(1, MAX_PAGE_SIZE),
    };

    log::debug!(
        "Viewport query {:?} page {} (size {})",
        normalized.filters,
        normalized.page,
        normalized.page_size
    );

    listings.query_viewport(&normalized)
}

fn normalize_filters(
    boundaries: &BoundaryStore,
    filters: &RegionFilters,
) -> Result<RegionFilters, GeoError> {
    let canonical = |value: Option<&String>, level: Level| -> Result<Option<String>, GeoError> {
        let Some(value) = value.map(|v| v.trim()).filter(|v| !v.is_empty()) else {
            return Ok(None);
        };
        Ok(Some(
            boundaries
                .find_by_name_and_level(value, level)?
                .map_or_else(|| value.to_string(), |b| b.name),
        ))
    };

    Ok(RegionFilters {
        province: canonical(filters.province.as_ref(), Level::Province)?,
        county: canonical(filters.county.as_ref(), Level::County)?,
        bakhsh: canonical(filters.bakhsh.as_ref(), Level::Bakhsh)?,
    })
}
