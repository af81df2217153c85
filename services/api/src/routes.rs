use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use progress_engine::progress::{
    progress_router, CategorySnapshot, ParticipantId, ProgressService, TriggerSource,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct BalanceRequest {
    pub(crate) balance: f64,
}

pub(crate) fn with_progress_routes(service: Arc<ProgressService>) -> axum::Router {
    progress_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/participants/:participant_id/snapshot",
            axum::routing::put(snapshot_endpoint),
        )
        .route(
            "/api/v1/participants/:participant_id/balance",
            axum::routing::put(balance_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn parse_participant(raw: &str) -> Result<ParticipantId, Response> {
    raw.parse::<ParticipantId>().map_err(|_| {
        let payload = json!({ "error": format!("'{raw}' is not a valid participant id") });
        (StatusCode::BAD_REQUEST, Json(payload)).into_response()
    })
}

/// Replace the host-side world view for a participant and schedule a recompute.
pub(crate) async fn snapshot_endpoint(
    Extension(state): Extension<AppState>,
    Path(participant_id): Path<String>,
    Json(snapshot): Json<CategorySnapshot>,
) -> Response {
    let participant = match parse_participant(&participant_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    state.host.set_snapshot(participant, snapshot);
    state
        .progress
        .request_update(participant, TriggerSource::Inventory, false);
    StatusCode::ACCEPTED.into_response()
}

pub(crate) async fn balance_endpoint(
    Extension(state): Extension<AppState>,
    Path(participant_id): Path<String>,
    Json(request): Json<BalanceRequest>,
) -> Response {
    let participant = match parse_participant(&participant_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if !request.balance.is_finite() {
        let payload = json!({ "error": "balance must be a finite number" });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
    }
    state.host.set_balance(participant, request.balance);
    state
        .progress
        .request_update(participant, TriggerSource::Other, false);
    StatusCode::ACCEPTED.into_response()
}
