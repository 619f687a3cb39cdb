//! Listing storage in `DuckDB`.
//!
//! Listings carry their point location and a denormalized region triple
//! (province, county, bakhsh) written at insert time. Viewport queries
//! filter on the raw coordinates and the stored region names only; they
//! never touch boundary geometry.

use std::fmt::Write as _;
use std::path::Path;

use boundary_map_database_models::{
    AdministrativeRegion, ListingRow, NewListing, Pagination, ViewportPage, ViewportQuery,
};
use chrono::{DateTime, Utc};
use duckdb::types::Value;
use duckdb::{Connection, params};

use crate::DbError;

/// Opens (or creates) the listings `DuckDB` and ensures schema exists.
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

/// Opens the listings DB at the default (or env-configured) path.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_default() -> Result<Connection, DbError> {
    open(&crate::paths::listings_db_path())
}

/// Opens a throwaway in-memory listings DB.
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
    conn.execute_batch(
        "CREATE SEQUENCE IF NOT EXISTS listings_id_seq START 1;
         CREATE TABLE IF NOT EXISTS listings (
            id BIGINT PRIMARY KEY DEFAULT nextval('listings_id_seq'),
            title TEXT NOT NULL,
            longitude DOUBLE NOT NULL,
            latitude DOUBLE NOT NULL,
            province TEXT,
            county TEXT,
            bakhsh TEXT,
            created_at_ms BIGINT NOT NULL
         );",
    )?;

    Ok(())
}

/// Inserts a listing with an already-resolved region and returns its ID.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub fn insert_listing(
    conn: &Connection,
    listing: &NewListing,
    region: &AdministrativeRegion,
) -> Result<i64, DbError> {
    let id: i64 = conn.query_row(
        "INSERT INTO listings (title, longitude, latitude, province, county, bakhsh, created_at_ms)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
        params![
            listing.title,
            listing.longitude,
            listing.latitude,
            region.province,
            region.county,
            region.bakhsh,
            listing.created_at.timestamp_millis(),
        ],
        |row| row.get(0),
    )?;

    Ok(id)
}

/// Overwrites the stored region of one listing. Returns rows updated.
///
/// # Errors
///
/// Returns [`DbError`] if the update fails.
pub fn update_region(
    conn: &Connection,
    id: i64,
    region: &AdministrativeRegion,
) -> Result<usize, DbError> {
    let updated = conn.execute(
        "UPDATE listings SET province = ?, county = ?, bakhsh = ? WHERE id = ?",
        params![region.province, region.county, region.bakhsh, id],
    )?;
    Ok(updated)
}

/// Every listing's `(id, longitude, latitude)`, ordered by ID.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn load_locations(conn: &Connection) -> Result<Vec<(i64, f64, f64)>, DbError> {
    let mut stmt = conn.prepare("SELECT id, longitude, latitude FROM listings ORDER BY id")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;

    let mut locations = Vec::new();
    for row in rows {
        locations.push(row?);
    }
    Ok(locations)
}

/// Fetches one listing by ID.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the stored timestamp is invalid.
pub fn get_listing(conn: &Connection, id: i64) -> Result<Option<ListingRow>, DbError> {
    let mut rows = query_rows(
        conn,
        "SELECT id, title, longitude, latitude, province, county, bakhsh, created_at_ms
         FROM listings WHERE id = ?",
        vec![Value::BigInt(id)],
    )?;
    Ok(rows.pop())
}

/// Queries one page of listings whose point lies inside the viewport
/// (edges inclusive) and whose stored region names equal every provided
/// filter.
///
/// Rows are ordered newest first, ties broken by descending ID. The query
/// is expected to be validated already; the page is used as given.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub fn query_viewport(conn: &Connection, query: &ViewportQuery) -> Result<ViewportPage, DbError> {
    let mut where_sql = String::from(
        " WHERE longitude BETWEEN ? AND ?
          AND latitude BETWEEN ? AND ?",
    );
    let mut args = vec![
        Value::Double(query.bbox.west),
        Value::Double(query.bbox.east),
        Value::Double(query.bbox.south),
        Value::Double(query.bbox.north),
    ];

    for (column, filter) in [
        ("province", &query.filters.province),
        ("county", &query.filters.county),
        ("bakhsh", &query.filters.bakhsh),
    ] {
        if let Some(value) = filter {
            let _ = write!(where_sql, " AND {column} = ?");
            args.push(Value::Text(value.clone()));
        }
    }

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM listings{where_sql}"),
        duckdb::params_from_iter(args.iter()),
        |row| row.get(0),
    )?;

    let mut page_args = args;
    page_args.push(Value::BigInt(i64::from(query.page_size)));
    page_args.push(Value::BigInt(
        i64::try_from(query.offset()).unwrap_or(i64::MAX),
    ));

    let entities = query_rows(
        conn,
        &format!(
            "SELECT id, title, longitude, latitude, province, county, bakhsh, created_at_ms
             FROM listings{where_sql}
             ORDER BY created_at_ms DESC, id DESC
             LIMIT ? OFFSET ?"
        ),
        page_args,
    )?;

    Ok(ViewportPage {
        entities,
        pagination: Pagination::new(
            query.page,
            query.page_size,
            u64::try_from(total).unwrap_or(0),
        ),
    })
}

/// Raw column values of one `listings` row.
struct RawListing {
    id: i64,
    title: String,
    longitude: f64,
    latitude: f64,
    region: AdministrativeRegion,
    created_at_ms: i64,
}

fn query_rows(conn: &Connection, sql: &str, args: Vec<Value>) -> Result<Vec<ListingRow>, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(duckdb::params_from_iter(args), |row| {
        Ok(RawListing {
            id: row.get(0)?,
            title: row.get(1)?,
            longitude: row.get(2)?,
            latitude: row.get(3)?,
            region: AdministrativeRegion {
                province: row.get(4)?,
                county: row.get(5)?,
                bakhsh: row.get(6)?,
            },
            created_at_ms: row.get(7)?,
        })
    })?;

    let mut listings = Vec::new();
    for row in rows {
        let raw = row?;
        let created_at: DateTime<Utc> =
            DateTime::from_timestamp_millis(raw.created_at_ms).ok_or_else(|| {
                DbError::Conversion {
                    message: format!(
                        "Listing {} has invalid created_at_ms {}",
                        raw.id, raw.created_at_ms
                    ),
                }
            })?;
        listings.push(ListingRow {
            id: raw.id,
            title: raw.title,
            longitude: raw.longitude,
            latitude: raw.latitude,
            region: raw.region,
            created_at,
        });
    }
    Ok(listings)
}
