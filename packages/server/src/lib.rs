#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the boundary map.
//!
//! Serves viewport listing queries, boundary geometry for map rendering,
//! point-to-region resolution for map clicks, and child lists for
//! cascading region selectors. Boundaries and listings live in two
//! `DuckDB` files opened once at startup.

mod handlers;

use std::path::Path;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use boundary_map_database::paths;
use boundary_map_geography::listings::ListingStore;
use boundary_map_geography::store::BoundaryStore;

/// Shared application state.
pub struct AppState {
    /// Boundary store handle; its spatial index is built on first use.
    pub boundaries: Arc<BoundaryStore>,
    /// Listings database.
    pub listings: Arc<ListingStore>,
}

impl AppState {
    /// Opens both databases.
    ///
    /// # Errors
    ///
    /// Returns an error if either database can't be opened.
    pub fn open(
        boundaries_path: &Path,
        listings_path: &Path,
    ) -> Result<Self, boundary_map_geography::GeoError> {
        Ok(Self {
            boundaries: Arc::new(BoundaryStore::open(boundaries_path)?),
            listings: Arc::new(ListingStore::open(listings_path)?),
        })
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/listings", web::get().to(handlers::listings))
            .route("/regions/resolve", web::get().to(handlers::resolve))
            .route(
                "/boundaries/{level}/{name}/children",
                web::get().to(handlers::children),
            )
            .route("/boundaries/{level}/{name}", web::get().to(handlers::boundary)),
    );
}

/// Starts the boundary map API server.
///
/// Opens the boundaries and listings databases (paths from
/// `BOUNDARY_MAP_BOUNDARIES_DB` and `BOUNDARY_MAP_LISTINGS_DB`, or the
/// defaults under `data/shared/`) and binds to `BIND_ADDR:PORT`. The
/// caller provides the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if a database can't be opened, the
/// server fails to bind, or it encounters a runtime error.
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let boundaries_path = paths::boundaries_db_path();
    let listings_path = paths::listings_db_path();
    log::info!(
        "Opening boundaries DB at {} and listings DB at {}",
        boundaries_path.display(),
        listings_path.display()
    );
    let state = AppState::open(&boundaries_path, &listings_path).map_err(std::io::Error::other)?;

    match state.boundaries.count_by_level() {
        Ok(counts) => {
            for (level, count) in &counts {
                log::info!("{count} {level} boundaries loaded");
            }
        }
        Err(e) => log::warn!("Failed to count boundaries: {e}"),
    }

    let state = web::Data::new(state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
