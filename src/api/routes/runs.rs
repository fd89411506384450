//! Run handlers: submission, progress and per-run event streams.

use super::{DnsRunRequest, MultiGeoRunRequest, RunCreated, RunRequest};
use crate::api::AppState;
use crate::error::{Error, Result};
use crate::types::{RunId, RunProgress};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use std::convert::Infallible;
use tokio_stream::StreamExt;

/// POST /runs - Start a URL check run
#[utoipa::path(
    post,
    path = "/api/v1/runs",
    tag = "runs",
    request_body = RunRequest,
    responses(
        (status = 202, description = "Run started", body = RunCreated),
        (status = 400, description = "No targets or no country", body = crate::error::ApiError)
    )
)]
pub async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<(StatusCode, Json<RunCreated>)> {
    let params = request.into_params(&state.config);
    let run_id = state.orchestrator.start_run(params).await?;
    Ok(accepted(run_id))
}

/// POST /runs/dns - Start a DNS/whois run
#[utoipa::path(
    post,
    path = "/api/v1/runs/dns",
    tag = "runs",
    request_body = DnsRunRequest,
    responses(
        (status = 202, description = "Run started", body = RunCreated),
        (status = 400, description = "No domains", body = crate::error::ApiError)
    )
)]
pub async fn create_dns_run(
    State(state): State<AppState>,
    Json(request): Json<DnsRunRequest>,
) -> Result<(StatusCode, Json<RunCreated>)> {
    let run_id = state.orchestrator.start_dns_run(request.into_params()).await?;
    Ok(accepted(run_id))
}

/// POST /runs/multi-geo - Start a run checking every target from every country
#[utoipa::path(
    post,
    path = "/api/v1/runs/multi-geo",
    tag = "runs",
    request_body = MultiGeoRunRequest,
    responses(
        (status = 202, description = "Run started", body = RunCreated),
        (status = 400, description = "No targets or no countries", body = crate::error::ApiError)
    )
)]
pub async fn create_multi_geo_run(
    State(state): State<AppState>,
    Json(request): Json<MultiGeoRunRequest>,
) -> Result<(StatusCode, Json<RunCreated>)> {
    let params = request.into_params(&state.config);
    let run_id = state.orchestrator.start_multi_geo_run(params).await?;
    Ok(accepted(run_id))
}

/// GET /runs/:id - Progress of a run
#[utoipa::path(
    get,
    path = "/api/v1/runs/{id}",
    tag = "runs",
    params(
        ("id" = String, Path, description = "Run ID")
    ),
    responses(
        (status = 200, description = "Progress snapshot", body = RunProgress),
        (status = 404, description = "Unknown run", body = crate::error::ApiError)
    )
)]
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunProgress>> {
    let run_id = RunId::from(id);
    state
        .orchestrator
        .run_state(&run_id)
        .map(Json)
        .ok_or_else(|| Error::RunNotFound(run_id.to_string()))
}

/// GET /runs/:id/events - Server-sent events of one run
///
/// Each SSE event is named after the event's `type`. The stream closes once
/// the run has finished and every buffered event was sent.
#[utoipa::path(
    get,
    path = "/api/v1/runs/{id}/events",
    tag = "runs",
    params(
        ("id" = String, Path, description = "Run ID")
    ),
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream"),
        (status = 404, description = "Unknown run", body = crate::error::ApiError)
    )
)]
pub async fn run_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = std::result::Result<SseEvent, Infallible>>>> {
    let run_id = RunId::from(id);
    if state.orchestrator.run_state(&run_id).is_none() {
        return Err(Error::RunNotFound(run_id.to_string()));
    }

    let subscription = state.orchestrator.subscribe(&run_id);
    tracing::debug!(run_id = %run_id, "SSE client subscribed");

    let stream = subscription.into_stream().filter_map(|event| {
        match SseEvent::default().event(event.event_type()).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                tracing::warn!(run_id = %event.run_id(), error = %e, "Failed to serialize event to JSON");
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn accepted(run_id: RunId) -> (StatusCode, Json<RunCreated>) {
    (
        StatusCode::ACCEPTED,
        Json(RunCreated {
            run_id: run_id.to_string(),
        }),
    )
}
