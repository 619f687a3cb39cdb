//! Hierarchical parent resolution from geometry.
//!
//! Lower tiers rarely carry an explicit parent attribute, so each boundary
//! is placed under the boundary one level up that contains a sample point
//! of its own geometry. Passes run root-first: counties are placed in
//! provinces, then bakhshs in counties, then cities in bakhshs. A pass only
//! needs the parent tier's geometry, not its parents.

use std::sync::Arc;

use boundary_map_geography::store::BoundaryStore;
use boundary_map_geography_models::{Boundary, Level};
use boundary_map_ingest_models::{PassReport, ProgressCallback, ResolveReport};
use boundary_map_spatial::{SpatialIndex, geometry};

use crate::IngestError;

/// Ring vertices tried after the centroid misses.
pub const MAX_VERTEX_SAMPLES: usize = 32;

/// Child tiers in resolution order.
const PASSES: &[Level] = &[Level::County, Level::Bakhsh, Level::City];

/// Options for [`resolve_parents`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Recompute parents that are already set.
    pub force: bool,
}

/// Finds the parent-tier boundary containing `boundary`.
///
/// Tries the approximate centroid first, then up to
/// [`MAX_VERTEX_SAMPLES`] vertices of the largest part's outer ring. The
/// vertex fallback covers concave and multi-part shapes whose vertex mean
/// lies outside every parent.
#[must_use]
pub fn find_parent<'a>(
    index: &'a SpatialIndex,
    boundary: &Boundary,
    parent_level: Level,
) -> Option<&'a Boundary> {
    let centroid = geometry::compute_centroid(&boundary.geometry);
    centroid
        .into_iter()
        .chain(geometry::sample_outer_ring(
            &boundary.geometry,
            MAX_VERTEX_SAMPLES,
        ))
        .find_map(|point| index.find_containing(parent_level, point))
}

/// Runs one pass over `level`, writing resolved parents to `store`.
fn resolve_level(
    store: &BoundaryStore,
    level: Level,
    parent_level: Level,
    options: ResolveOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<PassReport, IngestError> {
    let index = store.index()?;
    let candidates: Vec<Boundary> = store
        .boundaries_at_level(level)?
        .into_iter()
        .filter(|b| options.force || b.parent.is_none())
        .collect();

    let mut report = PassReport {
        level,
        examined: candidates.len() as u64,
        resolved: 0,
        unresolved: 0,
    };

    progress.set_total(report.examined);
    progress.set_message(format!("Resolving {level} parents"));

    // Assignments come from one index snapshot; writes invalidate the
    // store's cached index, so they're applied after the scan.
    let mut assignments: Vec<(String, Option<String>)> = Vec::with_capacity(candidates.len());
    for boundary in &candidates {
        match find_parent(&index, boundary, parent_level) {
            Some(parent) => {
                log::debug!("{level} {} -> {parent_level} {}", boundary.name, parent.name);
                assignments.push((boundary.name.clone(), Some(parent.name.clone())));
                report.resolved += 1;
            }
            None => {
                log::warn!(
                    "No {parent_level} contains {level} {}; leaving parent unset",
                    boundary.name
                );
                if boundary.parent.is_some() {
                    assignments.push((boundary.name.clone(), None));
                }
                report.unresolved += 1;
            }
        }
        progress.inc(1);
    }

    for (name, parent) in &assignments {
        store.set_parent(level, name, parent.as_deref())?;
    }

    log::info!(
        "{level} pass: {} examined, {} resolved, {} unresolved",
        report.examined,
        report.resolved,
        report.unresolved
    );

    Ok(report)
}

/// Assigns parents to every boundary below the province tier.
///
/// Unresolvable boundaries are logged and counted, never fatal. Running
/// twice yields the same assignments.
///
/// # Errors
///
/// Returns [`IngestError::Database`] if the store can't be read or written.
pub fn resolve_parents(
    store: &BoundaryStore,
    options: ResolveOptions,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<ResolveReport, IngestError> {
    let progress = progress
        .cloned()
        .unwrap_or_else(boundary_map_ingest_models::null_progress);

    let mut report = ResolveReport::default();
    for &level in PASSES {
        let Some(parent_level) = level.parent() else {
            continue;
        };
        report.passes.push(resolve_level(
            store,
            level,
            parent_level,
            options,
            &progress,
        )?);
    }
    progress.finish(format!(
        "Parent resolution done, {} unresolved",
        report.total_unresolved()
    ));

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boundary_map_geography_models::BoundaryGeometry;
    use geo::{MultiPolygon, Polygon, polygon};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0)]
    }

    fn boundary(level: Level, name: &str, geometry: BoundaryGeometry) -> Boundary {
        Boundary::new(level, name, name, geometry, serde_json::Map::new()).unwrap()
    }

    fn store_with(bakhshs: &[Boundary]) -> BoundaryStore {
        let store = BoundaryStore::open_in_memory().unwrap();
        store
            .replace_level(
                Level::Province,
                &[
                    boundary(Level::Province, "Tehran", BoundaryGeometry::Polygon(rect(50.0, 35.0, 53.0, 36.5))),
                    boundary(Level::Province, "Gilan", BoundaryGeometry::Polygon(rect(48.5, 36.5, 50.5, 38.5))),
                ],
            )
            .unwrap();
        store
            .replace_level(
                Level::County,
                &[
                    boundary(Level::County, "Rasht", BoundaryGeometry::Polygon(rect(49.3, 37.0, 49.9, 37.5))),
                    boundary(Level::County, "Rey", BoundaryGeometry::Polygon(rect(51.3, 35.0, 52.0, 35.6))),
                ],
            )
            .unwrap();
        store.replace_level(Level::Bakhsh, bakhshs).unwrap();
        store
    }

    fn parent_of(store: &BoundaryStore, level: Level, name: &str) -> Option<String> {
        store
            .find_by_name_and_level(name, level)
            .unwrap()
            .and_then(|b| b.parent)
    }

    #[test]
    fn centroid_inside_rasht_resolves_bakhsh() {
        let store = store_with(&[boundary(
            Level::Bakhsh,
            "Kuchesfahan",
            BoundaryGeometry::Polygon(rect(49.5, 37.2, 49.9, 37.5)),
        )]);

        let report = resolve_parents(&store, ResolveOptions::default(), None).unwrap();

        let bakhsh = store
            .find_by_name_and_level("Kuchesfahan", Level::Bakhsh)
            .unwrap()
            .unwrap();
        assert_eq!(bakhsh.parent.as_deref(), Some("Rasht"));
        assert_eq!(bakhsh.parent_level, Some(Level::County));
        assert_eq!(parent_of(&store, Level::County, "Rasht").as_deref(), Some("Gilan"));
        assert_eq!(parent_of(&store, Level::County, "Rey").as_deref(), Some("Tehran"));
        assert_eq!(report.total_unresolved(), 0);
        assert_eq!(report.pass(Level::Bakhsh).unwrap().resolved, 1);
    }

    #[test]
    fn vertex_fallback_places_multi_part_bakhsh() {
        // Vertex mean of both parts lands near (51.1, 37.26), outside every
        // county; the largest part's ring vertices are inside Rasht.
        let split = BoundaryGeometry::MultiPolygon(MultiPolygon(vec![
            rect(49.4, 37.1, 49.8, 37.4),
            polygon![(x: 53.0, y: 37.3), (x: 53.1, y: 37.3), (x: 53.05, y: 37.35), (x: 53.0, y: 37.3)],
        ]));
        let store = store_with(&[boundary(Level::Bakhsh, "Khomam", split.clone())]);

        let centroid = geometry::compute_centroid(&split).unwrap();
        assert!(store.find_containing(Level::County, centroid).unwrap().is_none());

        resolve_parents(&store, ResolveOptions::default(), None).unwrap();
        assert_eq!(parent_of(&store, Level::Bakhsh, "Khomam").as_deref(), Some("Rasht"));
    }

    #[test]
    fn unresolvable_boundaries_are_counted() {
        let store = store_with(&[
            boundary(Level::Bakhsh, "Kuchesfahan", BoundaryGeometry::Polygon(rect(49.5, 37.2, 49.9, 37.5))),
            boundary(Level::Bakhsh, "Offshore", BoundaryGeometry::Polygon(rect(40.0, 20.0, 40.5, 20.5))),
        ]);

        let report = resolve_parents(&store, ResolveOptions::default(), None).unwrap();
        let pass = report.pass(Level::Bakhsh).unwrap();
        assert_eq!(pass.examined, 2);
        assert_eq!(pass.resolved, 1);
        assert_eq!(pass.unresolved, 1);
        assert_eq!(parent_of(&store, Level::Bakhsh, "Offshore"), None);
        assert_eq!(report.pass(Level::City).unwrap().examined, 0);
    }

    #[test]
    fn repeated_runs_do_not_flap() {
        let store = store_with(&[
            boundary(Level::Bakhsh, "Kuchesfahan", BoundaryGeometry::Polygon(rect(49.5, 37.2, 49.9, 37.5))),
            boundary(Level::Bakhsh, "Offshore", BoundaryGeometry::Polygon(rect(40.0, 20.0, 40.5, 20.5))),
        ]);
        let snapshot = |store: &BoundaryStore| {
            Level::ALL
                .iter()
                .flat_map(|&level| store.boundaries_at_level(level).unwrap())
                .map(|b| (b.level, b.name, b.parent))
                .collect::<Vec<_>>()
        };

        resolve_parents(&store, ResolveOptions::default(), None).unwrap();
        let first = snapshot(&store);

        let second_report = resolve_parents(&store, ResolveOptions::default(), None).unwrap();
        assert_eq!(snapshot(&store), first);
        // Only the unresolved bakhsh is re-examined.
        assert_eq!(second_report.pass(Level::Bakhsh).unwrap().examined, 1);
        assert_eq!(second_report.pass(Level::County).unwrap().examined, 0);

        resolve_parents(&store, ResolveOptions { force: true }, None).unwrap();
        assert_eq!(snapshot(&store), first);
    }
}
