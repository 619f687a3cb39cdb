//! The boundary store handle.
//!
//! Wraps the boundaries `DuckDB` connection together with a lazily built
//! [`SpatialIndex`]. The index is a snapshot of the persisted rows: it is
//! built on the first containment query and dropped by every mutation
//! (`replace_level`, `set_parent`), so the next query rebuilds it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use boundary_map_database::boundaries_db;
use boundary_map_geography_models::{Boundary, BoundarySummary, Level, RegionMatch};
use boundary_map_spatial::{SpatialIndex, geometry};
use duckdb::Connection;
use geo::Point;

use crate::GeoError;

/// Handle over persisted boundaries and their spatial index.
///
/// Shareable across threads (`Arc<BoundaryStore>`). Reads that hit a
/// built index don't touch the database.
pub struct BoundaryStore {
    conn: Mutex<Connection>,
    index: RwLock<Option<Arc<SpatialIndex>>>,
}

impl BoundaryStore {
    /// Opens the boundaries DB at `path`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Database`] if the DB can't be opened.
    pub fn open(path: &Path) -> Result<Self, GeoError> {
        Ok(Self::from_connection(boundaries_db::open(path)?))
    }

    /// Opens an empty in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Database`] if the DB can't be created.
    pub fn open_in_memory() -> Result<Self, GeoError> {
        Ok(Self::from_connection(boundaries_db::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            index: RwLock::new(None),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, GeoError> {
        self.conn.lock().map_err(|_| GeoError::Poisoned)
    }

    /// Returns the current spatial index, building it from the database
    /// if it was never built or has been invalidated.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if loading boundaries fails.
    pub fn index(&self) -> Result<Arc<SpatialIndex>, GeoError> {
        if let Some(index) = self.index.read().map_err(|_| GeoError::Poisoned)?.as_ref() {
            return Ok(Arc::clone(index));
        }

        let mut slot = self.index.write().map_err(|_| GeoError::Poisoned)?;
        if let Some(index) = slot.as_ref() {
            return Ok(Arc::clone(index));
        }

        let boundaries = boundaries_db::load_all(&*self.conn()?)?;
        log::debug!("Building spatial index over {} boundaries", boundaries.len());
        let index = Arc::new(SpatialIndex::build(boundaries));
        *slot = Some(Arc::clone(&index));

        Ok(index)
    }

    /// Drops the cached index. The next query rebuilds it.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Poisoned`] if the index lock is poisoned.
    pub fn invalidate_index(&self) -> Result<(), GeoError> {
        *self.index.write().map_err(|_| GeoError::Poisoned)? = None;
        Ok(())
    }

    /// The boundary at `level` whose geometry contains `point`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the index can't be built.
    pub fn find_containing(
        &self,
        level: Level,
        point: Point<f64>,
    ) -> Result<Option<Boundary>, GeoError> {
        Ok(self.index()?.find_containing(level, point).cloned())
    }

    /// Province, county, and bakhsh containing `point`. Tiers with no
    /// containing boundary are `None`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the index can't be built.
    pub fn find_all_containing_regions(&self, point: Point<f64>) -> Result<RegionMatch, GeoError> {
        Ok(self.index()?.find_all_containing(point))
    }

    /// Looks up a boundary by canonical or localized name.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Database`] if the query fails.
    pub fn find_by_name_and_level(
        &self,
        name: &str,
        level: Level,
    ) -> Result<Option<Boundary>, GeoError> {
        Ok(boundaries_db::find_by_name(&*self.conn()?, level, name)?)
    }

    /// Boundaries whose parent is `parent_name` at `parent_level`.
    ///
    /// `parent_name` may be canonical or localized; children reference
    /// their parent by canonical name, so a localized name is resolved
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Database`] if a query fails.
    pub fn find_children(
        &self,
        parent_name: &str,
        parent_level: Level,
    ) -> Result<Vec<BoundarySummary>, GeoError> {
        let conn = self.conn()?;
        let canonical = boundaries_db::find_by_name(&conn, parent_level, parent_name)?
            .map_or_else(|| parent_name.trim().to_string(), |parent| parent.name);
        Ok(boundaries_db::find_children(&conn, &canonical, parent_level)?)
    }

    /// Every boundary at `level`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Database`] if the query fails.
    pub fn boundaries_at_level(&self, level: Level) -> Result<Vec<Boundary>, GeoError> {
        Ok(boundaries_db::load_level(&*self.conn()?, level)?)
    }

    /// Number of stored boundaries per level. Levels with none are absent.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Database`] if the query fails.
    pub fn count_by_level(&self) -> Result<BTreeMap<Level, u64>, GeoError> {
        Ok(boundaries_db::count_by_level(&*self.conn()?)?)
    }

    /// Atomically replaces every boundary at `level` with `boundaries`.
    ///
    /// All geometries must be non-empty WGS84; if any isn't, nothing is
    /// written. Readers never observe a half-replaced level: the delete and
    /// inserts share one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Geometry`] for an invalid geometry, or
    /// [`GeoError::Database`] if validation in the store or the write fails.
    pub fn replace_level(&self, level: Level, boundaries: &[Boundary]) -> Result<usize, GeoError> {
        for boundary in boundaries {
            geometry::validate_boundary_geometry(&boundary.geometry).map_err(|source| {
                GeoError::Geometry {
                    name: boundary.name.clone(),
                    source,
                }
            })?;
        }

        let inserted = {
            let mut conn = self.conn()?;
            boundaries_db::replace_level(&mut conn, level, boundaries)?
        };
        self.invalidate_index()?;

        Ok(inserted)
    }

    /// Sets (or clears) the parent of one boundary. Returns whether a row
    /// was updated.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Database`] if the update fails or `level` is
    /// the root tier.
    pub fn set_parent(
        &self,
        level: Level,
        name: &str,
        parent: Option<&str>,
    ) -> Result<bool, GeoError> {
        let updated = boundaries_db::set_parent(&*self.conn()?, level, name, parent)?;
        self.invalidate_index()?;
        Ok(updated > 0)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use boundary_map_geography_models::BoundaryGeometry;
    use geo::{Polygon, polygon};

    pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0)]
    }

    pub fn boundary(level: Level, name: &str, name_fa: &str, poly: Polygon<f64>) -> Boundary {
        Boundary::new(
            level,
            name,
            name_fa,
            BoundaryGeometry::Polygon(poly),
            serde_json::Map::new(),
        )
        .unwrap()
    }

    /// Tehran and Gilan provinces, three counties, one bakhsh.
    pub fn seeded_store() -> BoundaryStore {
        let store = BoundaryStore::open_in_memory().unwrap();
        store
            .replace_level(
                Level::Province,
                &[
                    boundary(Level::Province, "Tehran", "تهران", rect(50.0, 35.0, 53.0, 36.5)),
                    boundary(Level::Province, "Gilan", "گیلان", rect(48.5, 36.5, 50.5, 38.5)),
                ],
            )
            .unwrap();

        let mut rey = boundary(Level::County, "Rey", "ری", rect(51.3, 35.0, 52.0, 35.6));
        rey.set_parent("Tehran");
        let mut tehran = boundary(Level::County, "Tehran", "تهران", rect(51.2, 35.6, 51.6, 35.9));
        tehran.set_parent("Tehran");
        let mut rasht = boundary(Level::County, "Rasht", "رشت", rect(49.3, 37.0, 49.9, 37.5));
        rasht.set_parent("Gilan");
        store
            .replace_level(Level::County, &[rey, tehran, rasht])
            .unwrap();

        let mut kuchesfahan = boundary(
            Level::Bakhsh,
            "Kuchesfahan",
            "کوچصفهان",
            rect(49.5, 37.2, 49.9, 37.5),
        );
        kuchesfahan.set_parent("Rasht");
        store.replace_level(Level::Bakhsh, &[kuchesfahan]).unwrap();

        store
    }

    #[test]
    fn containment_queries_use_stored_boundaries() {
        let store = seeded_store();
        let hit = store
            .find_containing(Level::County, Point::new(51.5, 35.3))
            .unwrap()
            .unwrap();
        assert_eq!(hit.name, "Rey");

        let regions = store
            .find_all_containing_regions(Point::new(49.7, 37.3))
            .unwrap();
        assert_eq!(regions.province.unwrap().name_fa, "گیلان");
        assert_eq!(regions.county.unwrap().name, "Rasht");
        assert_eq!(regions.bakhsh.unwrap().name, "Kuchesfahan");

        assert!(store
            .find_containing(Level::Province, Point::new(60.0, 30.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn replace_level_invalidates_cached_index() {
        let store = seeded_store();
        let point = Point::new(51.4, 35.7);
        assert!(store.find_containing(Level::Province, point).unwrap().is_some());

        store
            .replace_level(
                Level::Province,
                &[boundary(Level::Province, "Gilan", "گیلان", rect(48.5, 36.5, 50.5, 38.5))],
            )
            .unwrap();

        assert!(store.find_containing(Level::Province, point).unwrap().is_none());
        assert_eq!(store.index().unwrap().len(Level::Province), 1);
    }

    #[test]
    fn replace_level_rejects_projected_geometry() {
        let store = seeded_store();
        let projected = boundary(
            Level::Province,
            "Tehran",
            "تهران",
            rect(600_000.0, 3_900_000.0, 600_100.0, 3_900_100.0),
        );
        let result = store.replace_level(Level::Province, &[projected]);
        assert!(matches!(result, Err(GeoError::Geometry { .. })));
        assert_eq!(store.boundaries_at_level(Level::Province).unwrap().len(), 2);
    }

    #[test]
    fn lookup_by_either_name() {
        let store = seeded_store();
        let by_latin = store.find_by_name_and_level("gilan", Level::Province).unwrap();
        let by_local = store.find_by_name_and_level("گیلان", Level::Province).unwrap();
        assert_eq!(by_latin, by_local);
        assert!(by_latin.is_some());
        assert!(store
            .find_by_name_and_level("Gilan", Level::County)
            .unwrap()
            .is_none());
    }

    #[test]
    fn children_resolve_localized_parent_names() {
        let store = seeded_store();
        let by_latin = store.find_children("Tehran", Level::Province).unwrap();
        let by_local = store.find_children("تهران", Level::Province).unwrap();
        let names: Vec<&str> = by_latin.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Rey", "Tehran"]);
        assert_eq!(by_latin, by_local);
        assert!(store.find_children("Nowhere", Level::Province).unwrap().is_empty());
    }

    #[test]
    fn set_parent_is_visible_to_later_reads() {
        let store = seeded_store();
        assert!(store
            .set_parent(Level::Bakhsh, "Kuchesfahan", None)
            .unwrap());
        let bakhsh = store
            .find_containing(Level::Bakhsh, Point::new(49.7, 37.3))
            .unwrap()
            .unwrap();
        assert_eq!(bakhsh.parent, None);
        assert!(!store.set_parent(Level::Bakhsh, "Missing", Some("Rasht")).unwrap());

        let counts = store.count_by_level().unwrap();
        assert_eq!(counts.get(&Level::County), Some(&3));
        assert_eq!(counts.get(&Level::City), None);
    }
}
