//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the geoprobe REST API using utoipa
//! for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the geoprobe REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "geoprobe REST API",
        version = "0.1.0",
        description = "Submit batches of URL checks through geo-targeted proxies or DNS/whois lookups and follow their progress",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000/api/v1", description = "Local development server")
    ),
    paths(
        // Runs
        crate::api::routes::create_run,
        crate::api::routes::create_dns_run,
        crate::api::routes::create_multi_geo_run,
        crate::api::routes::get_run,
        crate::api::routes::run_events,

        // Catalog
        crate::api::routes::geo_countries,
        crate::api::routes::geo_regions,
        crate::api::routes::geo_cities,
        crate::api::routes::geo_isps,
        crate::api::routes::refresh_catalog,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::RunId,
        crate::types::RunKind,
        crate::types::Classification,
        crate::types::ProxyType,
        crate::types::DnsMode,
        crate::types::StickyPolicy,
        crate::types::Timings,
        crate::types::RedirectHop,
        crate::types::TaskRecord,
        crate::types::DnsRecord,
        crate::types::RunTotals,
        crate::types::RunProgress,
        crate::types::RunEvent,

        // API request/response types from routes
        crate::api::routes::TargetList,
        crate::api::routes::RunRequest,
        crate::api::routes::DnsRunRequest,
        crate::api::routes::MultiGeoRunRequest,
        crate::api::routes::RunCreated,
        crate::api::routes::CatalogRefreshRequest,
        crate::api::routes::CatalogRefreshStarted,

        // Geo catalog types
        crate::catalog::GeoOption,
        crate::catalog::CountryOption,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "runs", description = "Runs - Submit check batches, poll progress, stream events"),
        (name = "catalog", description = "Catalog - Regions, cities and ISPs per country"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec"),
    )
)]
pub struct ApiDoc;
