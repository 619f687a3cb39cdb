//! Boundary storage in `DuckDB`.
//!
//! One `boundaries` table holds every level. Geometry is `GeoJSON` TEXT, the
//! bbox is four DOUBLE columns, and source attributes are a JSON TEXT blob.
//! The only mutations are a whole-level replace and parent backfill.

use std::collections::BTreeMap;
use std::path::Path;

use boundary_map_geography_models::{Boundary, BoundaryGeometry, BoundarySummary, BoundingBox, Level};
use duckdb::{Connection, params};

use crate::DbError;

const BOUNDARY_COLUMNS: &str = "level, name, name_fa, parent, parent_level, geometry_geojson, \
     bbox_west, bbox_south, bbox_east, bbox_north, metadata_json";

/// Opens (or creates) the boundaries `DuckDB` and ensures schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;

    Ok(conn)
}

/// Opens the boundaries DB at the default (or env-configured) path.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_default() -> Result<Connection, DbError> {
    open(&crate::paths::boundaries_db_path())
}

/// Opens a throwaway in-memory boundaries DB.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    // (level, name) uniqueness is enforced by `replace_level` rather than a
    // key constraint, since a level is deleted and re-inserted in one
    // transaction.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS boundaries (
            level TEXT NOT NULL,
            name TEXT NOT NULL,
            name_fa TEXT NOT NULL,
            parent TEXT,
            parent_level TEXT,
            geometry_geojson TEXT NOT NULL,
            bbox_west DOUBLE NOT NULL,
            bbox_south DOUBLE NOT NULL,
            bbox_east DOUBLE NOT NULL,
            bbox_north DOUBLE NOT NULL,
            metadata_json TEXT NOT NULL
        );",
    )?;

    Ok(())
}

/// Deletes every boundary at `level` and inserts `boundaries` in a single
/// transaction.
///
/// Rejects the whole batch (writing nothing) if any record is at a
/// different level, has an inconsistent parent level, or duplicates a
/// name case-insensitively.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError`] if validation or any database operation fails.
pub fn replace_level(
    conn: &mut Connection,
    level: Level,
    boundaries: &[Boundary],
) -> Result<usize, DbError> {
    let mut seen = std::collections::BTreeSet::new();
    for boundary in boundaries {
        if boundary.level != level {
            return Err(DbError::Conversion {
                message: format!(
                    "Boundary {} is at level {} but replacing level {level}",
                    boundary.name, boundary.level
                ),
            });
        }
        if boundary.parent.is_some() && boundary.parent_level != level.parent() {
            return Err(DbError::Conversion {
                message: format!(
                    "Boundary {} has parent level {:?}, expected {:?}",
                    boundary.name,
                    boundary.parent_level,
                    level.parent()
                ),
            });
        }
        if !seen.insert(boundary.name.to_lowercase()) {
            return Err(DbError::Conversion {
                message: format!("Duplicate {level} boundary name: {}", boundary.name),
            });
        }
    }

    let tx = conn.transaction()?;

    let deleted = tx.execute(
        "DELETE FROM boundaries WHERE level = ?",
        params![level.as_ref()],
    )?;
    log::debug!("Deleted {deleted} existing {level} boundaries");

    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO boundaries ({BOUNDARY_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))?;

        for boundary in boundaries {
            let metadata_json = serde_json::to_string(&boundary.metadata)?;
            inserted += stmt.execute(params![
                level.as_ref(),
                boundary.name,
                boundary.name_fa,
                boundary.parent,
                boundary.parent_level.map(|l| l.to_string()),
                boundary.geometry.to_geojson_string(),
                boundary.bbox.west,
                boundary.bbox.south,
                boundary.bbox.east,
                boundary.bbox.north,
                metadata_json,
            ])?;
        }
    }

    tx.commit()?;

    log::info!("Replaced {level} boundaries: {deleted} removed, {inserted} inserted");

    Ok(inserted)
}

/// Sets (or clears) the parent of one boundary. Returns rows updated.
///
/// # Errors
///
/// Returns [`DbError`] if the update fails or `level` has no parent tier.
pub fn set_parent(
    conn: &Connection,
    level: Level,
    name: &str,
    parent: Option<&str>,
) -> Result<usize, DbError> {
    let Some(parent_level) = level.parent() else {
        return Err(DbError::Conversion {
            message: format!("{level} boundaries cannot have a parent"),
        });
    };

    let updated = conn.execute(
        "UPDATE boundaries SET parent = ?, parent_level = ? WHERE level = ? AND name = ?",
        params![
            parent,
            parent.map(|_| parent_level.to_string()),
            level.as_ref(),
            name
        ],
    )?;

    Ok(updated)
}

/// Loads every stored boundary.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored row is corrupt.
pub fn load_all(conn: &Connection) -> Result<Vec<Boundary>, DbError> {
    query_boundaries(
        conn,
        &format!("SELECT {BOUNDARY_COLUMNS} FROM boundaries ORDER BY level, name"),
        &[],
    )
}

/// Loads every boundary at `level`, ordered by name.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored row is corrupt.
pub fn load_level(conn: &Connection, level: Level) -> Result<Vec<Boundary>, DbError> {
    query_boundaries(
        conn,
        &format!("SELECT {BOUNDARY_COLUMNS} FROM boundaries WHERE level = ? ORDER BY name"),
        &[level.as_ref()],
    )
}

/// Finds a boundary by canonical (case-insensitive) or localized name.
///
/// A canonical-name match is preferred over a localized-name match.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the stored row is corrupt.
pub fn find_by_name(conn: &Connection, level: Level, name: &str) -> Result<Option<Boundary>, DbError> {
    let name = name.trim();
    let mut rows = query_boundaries(
        conn,
        &format!(
            "SELECT {BOUNDARY_COLUMNS} FROM boundaries
             WHERE level = ? AND (lower(name) = lower(?) OR name_fa = ?)
             ORDER BY CASE WHEN lower(name) = lower(?) THEN 0 ELSE 1 END, name
             LIMIT 1"
        ),
        &[level.as_ref(), name, name, name],
    )?;
    Ok(rows.pop())
}

/// Lists boundaries whose parent is `parent_name` at `parent_level`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored level is unknown.
pub fn find_children(
    conn: &Connection,
    parent_name: &str,
    parent_level: Level,
) -> Result<Vec<BoundarySummary>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT name, name_fa, level FROM boundaries
         WHERE parent = ? AND parent_level = ?
         ORDER BY name",
    )?;
    let rows = stmt.query_map(params![parent_name, parent_level.as_ref()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut children = Vec::new();
    for row in rows {
        let (name, name_fa, level) = row?;
        children.push(BoundarySummary {
            name,
            name_fa,
            level: parse_level(&level)?,
        });
    }
    Ok(children)
}

/// Number of stored boundaries per level.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored level is unknown.
pub fn count_by_level(conn: &Connection) -> Result<BTreeMap<Level, u64>, DbError> {
    let mut stmt = conn.prepare("SELECT level, COUNT(*) FROM boundaries GROUP BY level")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = BTreeMap::new();
    for row in rows {
        let (level, count) = row?;
        counts.insert(parse_level(&level)?, u64::try_from(count).unwrap_or(0));
    }
    Ok(counts)
}

/// Raw column values of one `boundaries` row.
struct BoundaryRow {
    level: String,
    name: String,
    name_fa: String,
    parent: Option<String>,
    parent_level: Option<String>,
    geometry_geojson: String,
    bbox: [f64; 4],
    metadata_json: String,
}

fn query_boundaries(
    conn: &Connection,
    sql: &str,
    args: &[&str],
) -> Result<Vec<Boundary>, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(duckdb::params_from_iter(args.iter()), |row| {
        Ok(BoundaryRow {
            level: row.get(0)?,
            name: row.get(1)?,
            name_fa: row.get(2)?,
            parent: row.get(3)?,
            parent_level: row.get(4)?,
            geometry_geojson: row.get(5)?,
            bbox: [row.get(6)?, row.get(7)?, row.get(8)?, row.get(9)?],
            metadata_json: row.get(10)?,
        })
    })?;

    let mut boundaries = Vec::new();
    for row in rows {
        boundaries.push(row_to_boundary(row?)?);
    }
    Ok(boundaries)
}

fn row_to_boundary(row: BoundaryRow) -> Result<Boundary, DbError> {
    let geometry =
        BoundaryGeometry::from_geojson_str(&row.geometry_geojson).map_err(|e| DbError::Conversion {
            message: format!("Stored geometry for {} is invalid: {e}", row.name),
        })?;

    Ok(Boundary {
        level: parse_level(&row.level)?,
        name: row.name,
        name_fa: row.name_fa,
        parent: row.parent,
        parent_level: row.parent_level.as_deref().map(parse_level).transpose()?,
        geometry,
        bbox: BoundingBox::from_array(row.bbox),
        metadata: serde_json::from_str(&row.metadata_json)?,
    })
}

fn parse_level(s: &str) -> Result<Level, DbError> {
    s.parse().map_err(|_| DbError::Conversion {
        message: format!("Unknown boundary level: {s}"),
    })
}
