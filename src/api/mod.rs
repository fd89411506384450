//! REST API server module
//!
//! A thin OpenAPI-documented front end over [`RunOrchestrator`]: submit runs,
//! poll their progress and follow their events over SSE.

use crate::{Config, Result, RunOrchestrator};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Prefix every API route is mounted under
pub const API_PREFIX: &str = "/api/v1";

/// Create the API router with all route definitions
///
/// # Routes (under `/api/v1`)
///
/// ## Runs
/// - `POST /runs` - Start a URL check run
/// - `POST /runs/dns` - Start a DNS/whois run
/// - `POST /runs/multi-geo` - Start a multi-country run
/// - `GET /runs/:id` - Run progress
/// - `GET /runs/:id/events` - Server-sent events of one run
///
/// ## Catalog
/// - `GET /geo/countries` - Countries in the geo catalog
/// - `GET /geo/regions?country=` - Regions of a country
/// - `GET /geo/cities?country=` - Cities of a country
/// - `GET /geo/isps?country=` - ISPs of a country
/// - `POST /catalog/refresh` - Refresh the catalog in the background
///
/// ## Artifacts
/// - `GET /logs/*path` - Files under `paths.logs_dir` (reports, screenshots)
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled, at the root)
pub fn create_router(orchestrator: Arc<RunOrchestrator>, config: Arc<Config>) -> Router {
    let state = AppState::new(orchestrator, config.clone());

    let api = Router::new()
        // Runs
        .route("/runs", post(routes::create_run))
        .route("/runs/dns", post(routes::create_dns_run))
        .route("/runs/multi-geo", post(routes::create_multi_geo_run))
        .route("/runs/:id", get(routes::get_run))
        .route("/runs/:id/events", get(routes::run_events))
        // Catalog
        .route("/geo/countries", get(routes::geo_countries))
        .route("/geo/regions", get(routes::geo_regions))
        .route("/geo/cities", get(routes::geo_cities))
        .route("/geo/isps", get(routes::geo_isps))
        .route("/catalog/refresh", post(routes::refresh_catalog))
        // Artifacts
        .nest_service("/logs", ServeDir::new(&config.paths.logs_dir))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .with_state(state);

    let router = Router::new().nest(API_PREFIX, api);

    // SwaggerUi reuses the /api/v1/openapi.json document
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// An empty list or `"*"` allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Serve the API on `app.host:app.port` until `shutdown` resolves
///
/// Open SSE streams end when their runs finish; in-flight runs are not
/// awaited.
///
/// # Example
///
/// ```no_run
/// use geoprobe::{Config, RunOrchestrator};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let orchestrator = Arc::new(RunOrchestrator::new((*config).clone()).await?);
///
/// geoprobe::api::start_api_server(orchestrator, config, geoprobe::wait_for_signal()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server<F>(
    orchestrator: Arc<RunOrchestrator>,
    config: Arc<Config>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = format!("{}:{}", config.app.host, config.app.port);

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(orchestrator, config);

    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(crate::error::Error::Io)?;
    let local: Option<SocketAddr> = listener.local_addr().ok();

    tracing::info!(address = ?local, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
