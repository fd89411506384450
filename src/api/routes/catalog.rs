//! Catalog handlers: geo lookups and background refresh.

use crate::api::AppState;
use crate::catalog::{CountryOption, GeoOption};
use crate::error::Result;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

/// Query for the per-country lookups
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GeoQuery {
    /// ISO country code; lookups answer `[]` without it
    pub country: Option<String>,
}

impl GeoQuery {
    fn country(&self) -> Option<&str> {
        self.country.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

/// Request body for POST /catalog/refresh
#[derive(Debug, Clone, Default, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(default)]
pub struct CatalogRefreshRequest {
    /// Countries to refresh; empty refreshes every country already cataloged
    pub countries: Vec<CountryOption>,
}

/// Response for POST /catalog/refresh
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CatalogRefreshStarted {
    /// False when a refresh was already running
    pub started: bool,
}

/// GET /geo/countries - Countries in the catalog
#[utoipa::path(
    get,
    path = "/api/v1/geo/countries",
    tag = "catalog",
    responses(
        (status = 200, description = "Cataloged countries", body = Vec<CountryOption>)
    )
)]
pub async fn geo_countries(State(state): State<AppState>) -> Json<Vec<CountryOption>> {
    Json(state.catalog.countries().await)
}

/// GET /geo/regions - Regions of a country
#[utoipa::path(
    get,
    path = "/api/v1/geo/regions",
    tag = "catalog",
    params(GeoQuery),
    responses(
        (status = 200, description = "Regions (empty for unknown countries)", body = Vec<GeoOption>)
    )
)]
pub async fn geo_regions(
    State(state): State<AppState>,
    Query(query): Query<GeoQuery>,
) -> Json<Vec<GeoOption>> {
    match query.country() {
        Some(country) => Json(state.catalog.regions(country).await),
        None => Json(Vec::new()),
    }
}

/// GET /geo/cities - Cities of a country
#[utoipa::path(
    get,
    path = "/api/v1/geo/cities",
    tag = "catalog",
    params(GeoQuery),
    responses(
        (status = 200, description = "Cities (empty for unknown countries)", body = Vec<GeoOption>)
    )
)]
pub async fn geo_cities(
    State(state): State<AppState>,
    Query(query): Query<GeoQuery>,
) -> Json<Vec<GeoOption>> {
    match query.country() {
        Some(country) => Json(state.catalog.cities(country).await),
        None => Json(Vec::new()),
    }
}

/// GET /geo/isps - ISP names of a country
#[utoipa::path(
    get,
    path = "/api/v1/geo/isps",
    tag = "catalog",
    params(GeoQuery),
    responses(
        (status = 200, description = "ISP names (empty for unknown countries)", body = Vec<String>)
    )
)]
pub async fn geo_isps(
    State(state): State<AppState>,
    Query(query): Query<GeoQuery>,
) -> Json<Vec<String>> {
    match query.country() {
        Some(country) => Json(state.catalog.isps(country).await),
        None => Json(Vec::new()),
    }
}

/// POST /catalog/refresh - Refresh the geo catalog in the background
#[utoipa::path(
    post,
    path = "/api/v1/catalog/refresh",
    tag = "catalog",
    request_body = CatalogRefreshRequest,
    responses(
        (status = 202, description = "Refresh accepted", body = CatalogRefreshStarted),
        (status = 400, description = "API keys missing, blank country code, or nothing to refresh", body = crate::error::ApiError)
    )
)]
pub async fn refresh_catalog(
    State(state): State<AppState>,
    request: Option<Json<CatalogRefreshRequest>>,
) -> Result<(StatusCode, Json<CatalogRefreshStarted>)> {
    let countries = request.map(|Json(r)| r.countries).unwrap_or_default();
    let started = state.catalog.start_refresh(countries).await?;
    Ok((StatusCode::ACCEPTED, Json(CatalogRefreshStarted { started })))
}
