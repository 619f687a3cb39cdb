//! Point-to-region resolution for map clicks and listing attribution.

use boundary_map_geography_models::{Level, RegionMatch, RegionRef};

use crate::patches;
use crate::store::BoundaryStore;
use crate::{GeoError, validate_point};

/// Resolves the province, county, and bakhsh containing `(lat, lng)`.
///
/// A point inside no boundary is not an error: the result is simply empty
/// or partial. When no province contains the point, the
/// [`patches::PROVINCE_FALLBACKS`] table is consulted before giving up.
///
/// # Errors
///
/// Returns [`GeoError::Validation`] for coordinates outside WGS84, or
/// other [`GeoError`]s if the store fails.
pub fn resolve_region_at_point(
    store: &BoundaryStore,
    lat: f64,
    lng: f64,
) -> Result<RegionMatch, GeoError> {
    let point = validate_point(lat, lng)?;
    let mut regions = store.find_all_containing_regions(point)?;

    if regions.province.is_none()
        && let Some(fallback) = patches::find_fallback_province(lng, lat)
    {
        let stored = store.find_by_name_and_level(fallback.name, Level::Province)?;
        log::debug!(
            "No province contains ({lat}, {lng}); using fallback box for {}",
            fallback.name
        );
        regions.province = Some(stored.as_ref().map_or_else(
            || RegionRef {
                name: fallback.name.to_string(),
                name_fa: fallback.name_fa.to_string(),
            },
            RegionRef::from,
        ));
    }

    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{boundary, rect, seeded_store};

    #[test]
    fn resolves_all_tiers_inside_stored_geometry() {
        let store = seeded_store();
        let regions = resolve_region_at_point(&store, 37.3, 49.7).unwrap();
        assert_eq!(regions.province.unwrap().name, "Gilan");
        assert_eq!(regions.county.unwrap().name, "Rasht");
        assert_eq!(regions.bakhsh.unwrap().name_fa, "کوچصفهان");
    }

    #[test]
    fn point_outside_everything_is_empty_not_error() {
        let store = seeded_store();
        let regions = resolve_region_at_point(&store, 29.6, 52.5).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn fallback_box_supplies_defective_province() {
        let store = BoundaryStore::open_in_memory().unwrap();
        // Stored Alborz geometry is a sliver far from where Karaj is.
        store
            .replace_level(
                Level::Province,
                &[boundary(
                    Level::Province,
                    "Alborz",
                    "البرز",
                    rect(50.10, 36.30, 50.11, 36.31),
                )],
            )
            .unwrap();

        let regions = resolve_region_at_point(&store, 35.83, 50.99).unwrap();
        let province = regions.province.unwrap();
        assert_eq!(province.name, "Alborz");
        assert_eq!(province.name_fa, "البرز");
        assert!(regions.county.is_none());
    }

    #[test]
    fn fallback_works_without_stored_record() {
        let store = BoundaryStore::open_in_memory().unwrap();
        let regions = resolve_region_at_point(&store, 34.64, 50.88).unwrap();
        assert_eq!(regions.province.unwrap().name_fa, "قم");
    }

    #[test]
    fn spatial_match_wins_over_fallback() {
        // Seeded Tehran province covers the Alborz fallback box.
        let store = seeded_store();
        let regions = resolve_region_at_point(&store, 35.83, 50.99).unwrap();
        assert_eq!(regions.province.unwrap().name, "Tehran");
    }

    #[test]
    fn rejects_invalid_coordinates() {
        let store = seeded_store();
        assert!(matches!(
            resolve_region_at_point(&store, 91.0, 51.0),
            Err(GeoError::Validation { .. })
        ));
    }
}
