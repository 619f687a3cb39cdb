//! Collapsing duplicate features into one boundary per name.
//!
//! Two records are duplicates when their canonical names match
//! case-insensitively or their localized names are equal. Shapefiles often
//! split one region across several features (islands, exclaves), so the
//! default [`DedupStrategy::Union`] keeps every part.

use std::collections::BTreeMap;

use boundary_map_geography_models::Boundary;

/// How duplicate records are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DedupStrategy {
    /// Merge each duplicate's polygons into the first record as extra
    /// `MultiPolygon` parts.
    #[default]
    Union,
    /// Keep the first record and discard later duplicates entirely,
    /// geometry included. Loses multi-part regions; kept for comparison
    /// with older imports.
    FirstSeen,
}

/// Deduplicated records plus counts.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    /// One record per name, in first-seen order.
    pub boundaries: Vec<Boundary>,
    /// Duplicates merged into an earlier record.
    pub merged: u64,
    /// Duplicates discarded.
    pub dropped: u64,
}

fn name_key(name: &str) -> String {
    format!("name:{}", name.trim().to_lowercase())
}

fn localized_key(name_fa: &str) -> String {
    format!("fa:{}", name_fa.trim().to_lowercase())
}

/// Collapses `boundaries` so each name appears once.
#[must_use]
pub fn deduplicate(boundaries: Vec<Boundary>, strategy: DedupStrategy) -> DedupOutcome {
    let mut kept: Vec<Boundary> = Vec::with_capacity(boundaries.len());
    let mut keys: BTreeMap<String, usize> = BTreeMap::new();
    let mut merged = 0;
    let mut dropped = 0;

    for boundary in boundaries {
        let name = name_key(&boundary.name);
        let localized = localized_key(&boundary.name_fa);
        let existing = keys.get(&name).or_else(|| keys.get(&localized)).copied();

        let Some(index) = existing else {
            keys.insert(name, kept.len());
            keys.entry(localized).or_insert(kept.len());
            kept.push(boundary);
            continue;
        };

        let first = &mut kept[index];
        match strategy {
            DedupStrategy::Union => {
                log::debug!(
                    "Merging duplicate {} {} into existing record",
                    boundary.level,
                    boundary.name
                );
                let combined = first.geometry.clone().merge(boundary.geometry);
                first.set_geometry(combined);
                if first.parent.is_none()
                    && let Some(parent) = boundary.parent
                {
                    first.set_parent(parent);
                }
                merged += 1;
            }
            DedupStrategy::FirstSeen => {
                log::warn!(
                    "Dropping duplicate {} {} and its geometry",
                    boundary.level,
                    boundary.name
                );
                dropped += 1;
            }
        }
    }

    DedupOutcome {
        boundaries: kept,
        merged,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boundary_map_geography_models::{BoundaryGeometry, BoundingBox, Level};
    use geo::polygon;

    fn county(name: &str, name_fa: &str, x: f64) -> Boundary {
        Boundary::new(
            Level::County,
            name,
            name_fa,
            BoundaryGeometry::Polygon(polygon![
                (x: x, y: 37.0),
                (x: x + 0.5, y: 37.0),
                (x: x + 0.5, y: 37.5),
                (x: x, y: 37.0),
            ]),
            serde_json::Map::new(),
        )
        .unwrap()
    }

    #[test]
    fn union_keeps_every_part() {
        let outcome = deduplicate(
            vec![
                county("Anzali", "انزلی", 49.0),
                county("Rasht", "رشت", 49.5),
                county("ANZALI", "انزلی", 48.0),
            ],
            DedupStrategy::Union,
        );

        assert_eq!(outcome.boundaries.len(), 2);
        assert_eq!(outcome.merged, 1);
        assert_eq!(outcome.dropped, 0);

        let anzali = &outcome.boundaries[0];
        assert_eq!(anzali.name, "Anzali");
        assert_eq!(anzali.geometry.part_count(), 2);
        assert_eq!(anzali.bbox, BoundingBox::new(48.0, 37.0, 49.5, 37.5));
    }

    #[test]
    fn first_seen_drops_later_geometry() {
        let outcome = deduplicate(
            vec![county("Anzali", "انزلی", 49.0), county("anzali", "x", 48.0)],
            DedupStrategy::FirstSeen,
        );
        assert_eq!(outcome.boundaries.len(), 1);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.boundaries[0].geometry.part_count(), 1);
        assert!((outcome.boundaries[0].bbox.west - 49.0).abs() < f64::EPSILON);
    }

    #[test]
    fn localized_name_alone_identifies_duplicates() {
        let outcome = deduplicate(
            vec![county("Bandar-e Anzali", "انزلی", 49.0), county("Anzali", "انزلی", 48.0)],
            DedupStrategy::Union,
        );
        assert_eq!(outcome.boundaries.len(), 1);
        assert_eq!(outcome.boundaries[0].name, "Bandar-e Anzali");
    }

    #[test]
    fn missing_parent_filled_from_duplicate() {
        let mut second = county("Rasht", "رشت", 48.0);
        second.set_parent("Gilan");
        let outcome = deduplicate(vec![county("Rasht", "رشت", 49.5), second], DedupStrategy::Union);
        assert_eq!(outcome.boundaries[0].parent.as_deref(), Some("Gilan"));
    }
}
