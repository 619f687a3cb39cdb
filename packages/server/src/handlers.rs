//! HTTP handler functions for the boundary map API.
//!
//! Store calls are synchronous `DuckDB` and R-tree work, so each runs on
//! Actix's blocking pool via [`web::block`].

use std::str::FromStr as _;
use std::sync::Arc;

use actix_web::{HttpResponse, web};
use boundary_map_database_models::{RegionFilters, ViewportQuery};
use boundary_map_geography::GeoError;
use boundary_map_geography::resolver::resolve_region_at_point;
use boundary_map_geography::viewport::query_viewport;
use boundary_map_geography_models::Level;
use boundary_map_server_models::{
    ApiBoundaryFeature, ApiError, ApiHealth, ListingsQueryParams, ResolveQueryParams, parse_bbox,
};
use serde::Serialize;

use crate::AppState;

/// Maps a store result to a JSON response. Caller mistakes are 400s;
/// everything else is logged and becomes a 500.
fn respond<T: Serialize>(result: Result<T, GeoError>, what: &str) -> HttpResponse {
    match result {
        Ok(body) => HttpResponse::Ok().json(body),
        Err(GeoError::Validation { message }) => HttpResponse::BadRequest().json(ApiError::new(message)),
        Err(e) => {
            log::error!("Failed to {what}: {e}");
            HttpResponse::InternalServerError().json(ApiError::new(format!("Failed to {what}")))
        }
    }
}

fn blocking_failed(what: &str, e: &actix_web::error::BlockingError) -> HttpResponse {
    log::error!("Failed to {what}: {e}");
    HttpResponse::InternalServerError().json(ApiError::new(format!("Failed to {what}")))
}

fn parse_level_param(level: &str) -> Result<Level, HttpResponse> {
    Level::from_str(level.trim()).map_err(|_| {
        HttpResponse::BadRequest().json(ApiError::new(format!("Unknown level: {level}")))
    })
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/listings`
///
/// Listings inside `bbox` matching optional province/county/bakhsh
/// filters, one page at a time.
pub async fn listings(
    state: web::Data<AppState>,
    params: web::Query<ListingsQueryParams>,
) -> HttpResponse {
    let params = params.into_inner();
    let Some(bbox) = parse_bbox(&params.bbox) else {
        return HttpResponse::BadRequest().json(ApiError::new(
            "bbox must be four comma-separated numbers: west,south,east,north",
        ));
    };

    let mut query = ViewportQuery::new(
        bbox,
        RegionFilters {
            province: params.province,
            county: params.county,
            bakhsh: params.bakhsh,
        },
        params.page.unwrap_or(1),
    );
    if let Some(page_size) = params.page_size {
        query.page_size = page_size;
    }

    let listings = Arc::clone(&state.listings);
    let boundaries = Arc::clone(&state.boundaries);
    match web::block(move || query_viewport(&listings, &boundaries, &query)).await {
        Ok(result) => respond(result, "query listings"),
        Err(e) => blocking_failed("query listings", &e),
    }
}

/// `GET /api/boundaries/{level}/{name}`
///
/// The named boundary as a `GeoJSON` `Feature`. A missing boundary is a
/// 404, which map clients treat as "nothing to draw".
pub async fn boundary(state: web::Data<AppState>, path: web::Path<(String, String)>) -> HttpResponse {
    let (level, name) = path.into_inner();
    let level = match parse_level_param(&level) {
        Ok(level) => level,
        Err(response) => return response,
    };

    let boundaries = Arc::clone(&state.boundaries);
    let lookup = name.clone();
    match web::block(move || boundaries.find_by_name_and_level(&lookup, level)).await {
        Ok(Ok(Some(boundary))) => HttpResponse::Ok().json(ApiBoundaryFeature::from(&boundary)),
        Ok(Ok(None)) => {
            log::debug!("No {level} named {name}");
            HttpResponse::NotFound().json(ApiError::new(format!("No {level} named {name}")))
        }
        Ok(Err(e)) => respond::<()>(Err(e), "load boundary"),
        Err(e) => blocking_failed("load boundary", &e),
    }
}

/// `GET /api/boundaries/{level}/{name}/children`
///
/// Name summaries of the boundaries one level below the named one, for
/// cascading selection lists. Empty when the parent is unknown.
pub async fn children(state: web::Data<AppState>, path: web::Path<(String, String)>) -> HttpResponse {
    let (level, name) = path.into_inner();
    let level = match parse_level_param(&level) {
        Ok(level) => level,
        Err(response) => return response,
    };

    let boundaries = Arc::clone(&state.boundaries);
    match web::block(move || boundaries.find_children(&name, level)).await {
        Ok(result) => respond(result, "list children"),
        Err(e) => blocking_failed("list children", &e),
    }
}

/// `GET /api/regions/resolve?lat=&lng=`
///
/// Province, county, and bakhsh containing a point. Tiers with no match
/// are `null`.
pub async fn resolve(
    state: web::Data<AppState>,
    params: web::Query<ResolveQueryParams>,
) -> HttpResponse {
    let ResolveQueryParams { lat, lng } = params.into_inner();
    let boundaries = Arc::clone(&state.boundaries);
    match web::block(move || resolve_region_at_point(&boundaries, lat, lng)).await {
        Ok(result) => respond(result, "resolve region"),
        Err(e) => blocking_failed("resolve region", &e),
    }
}
