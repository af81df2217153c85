use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ParticipantId, TriggerSource};
use super::service::{ProgressService, ServiceError};
use super::snapshot::ItemStack;

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 500;

/// Router builder exposing the score, admin and loss endpoints.
pub fn progress_router(service: Arc<ProgressService>) -> Router {
    Router::new()
        .route("/api/v1/participants/:participant_id", get(record_handler))
        .route(
            "/api/v1/participants/:participant_id/score",
            get(score_handler).put(set_score_handler),
        )
        .route(
            "/api/v1/participants/:participant_id/signals",
            post(signal_handler),
        )
        .route(
            "/api/v1/participants/:participant_id/recalculate",
            post(recalculate_handler),
        )
        .route(
            "/api/v1/participants/:participant_id/reset",
            post(reset_handler),
        )
        .route(
            "/api/v1/participants/:participant_id/milestones/:key",
            post(grant_handler).delete(revoke_handler),
        )
        .route(
            "/api/v1/participants/:participant_id/losses",
            get(losses_handler).post(register_loss_handler),
        )
        .route(
            "/api/v1/participants/:participant_id/history",
            get(history_handler),
        )
        .route("/api/v1/leaderboard", get(leaderboard_handler))
        .route("/api/v1/stats", get(stats_handler))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct LimitQuery {
    limit: Option<usize>,
}

impl LimitQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignalRequest {
    trigger: TriggerSource,
    #[serde(default)]
    immediate: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetScoreRequest {
    score: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LossRequest {
    value: Option<f64>,
    #[serde(default)]
    items: Vec<ItemStack>,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn parse_participant(raw: &str) -> Result<ParticipantId, Response> {
    raw.parse::<ParticipantId>().map_err(|_| {
        error_body(
            StatusCode::BAD_REQUEST,
            format!("'{raw}' is not a valid participant id"),
        )
    })
}

pub(crate) fn service_error_response(error: ServiceError) -> Response {
    let status = match &error {
        ServiceError::ModificationsDisabled => StatusCode::FORBIDDEN,
        ServiceError::InvalidScore(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Recompute(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_body(status, error.to_string())
}

pub(crate) async fn record_handler(
    State(service): State<Arc<ProgressService>>,
    Path(participant_id): Path<String>,
) -> Response {
    let participant = match parse_participant(&participant_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let record = service.get_record(participant).await;
    (StatusCode::OK, Json(record)).into_response()
}

pub(crate) async fn score_handler(
    State(service): State<Arc<ProgressService>>,
    Path(participant_id): Path<String>,
) -> Response {
    let participant = match parse_participant(&participant_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let score = service.get_score(participant).await;
    let payload = json!({
        "participant_id": participant,
        "score": score,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn set_score_handler(
    State(service): State<Arc<ProgressService>>,
    Path(participant_id): Path<String>,
    Json(request): Json<SetScoreRequest>,
) -> Response {
    let participant = match parse_participant(&participant_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match service.set_score(participant, request.score).await {
        Ok(score) => {
            let payload = json!({
                "participant_id": participant,
                "score": score,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn signal_handler(
    State(service): State<Arc<ProgressService>>,
    Path(participant_id): Path<String>,
    Json(request): Json<SignalRequest>,
) -> Response {
    let participant = match parse_participant(&participant_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    service.request_update(participant, request.trigger, request.immediate);
    let payload = json!({
        "participant_id": participant,
        "trigger": request.trigger,
        "accepted": true,
    });
    (StatusCode::ACCEPTED, Json(payload)).into_response()
}

pub(crate) async fn recalculate_handler(
    State(service): State<Arc<ProgressService>>,
    Path(participant_id): Path<String>,
) -> Response {
    let participant = match parse_participant(&participant_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match service.force_recalculate(participant).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn reset_handler(
    State(service): State<Arc<ProgressService>>,
    Path(participant_id): Path<String>,
) -> Response {
    let participant = match parse_participant(&participant_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match service.reset_participant(participant).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn grant_handler(
    State(service): State<Arc<ProgressService>>,
    Path((participant_id, key)): Path<(String, String)>,
) -> Response {
    let participant = match parse_participant(&participant_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match service.grant_milestone(participant, &key).await {
        Ok(changed) => {
            let payload = json!({ "milestone": key, "changed": changed });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn revoke_handler(
    State(service): State<Arc<ProgressService>>,
    Path((participant_id, key)): Path<(String, String)>,
) -> Response {
    let participant = match parse_participant(&participant_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match service.revoke_milestone(participant, &key).await {
        Ok(changed) => {
            let payload = json!({ "milestone": key, "changed": changed });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn register_loss_handler(
    State(service): State<Arc<ProgressService>>,
    Path(participant_id): Path<String>,
    Json(request): Json<LossRequest>,
) -> Response {
    let participant = match parse_participant(&participant_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let loss_id = match request.value {
        Some(value) => service.register_loss(participant, value),
        None => service.register_item_loss(participant, &request.items),
    };
    let payload = json!({
        "participant_id": participant,
        "loss_id": loss_id,
    });
    (StatusCode::ACCEPTED, Json(payload)).into_response()
}

pub(crate) async fn losses_handler(
    State(service): State<Arc<ProgressService>>,
    Path(participant_id): Path<String>,
) -> Response {
    let participant = match parse_participant(&participant_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let penalty = service.current_penalty(participant).await;
    let losses = service.active_losses(participant);
    let payload = json!({
        "participant_id": participant,
        "penalty": penalty,
        "losses": losses,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn history_handler(
    State(service): State<Arc<ProgressService>>,
    Path(participant_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let participant = match parse_participant(&participant_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match service.history(participant, query.limit()).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn leaderboard_handler(
    State(service): State<Arc<ProgressService>>,
    Query(query): Query<LimitQuery>,
) -> Response {
    match service.top_participants(query.limit()).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn stats_handler(State(service): State<Arc<ProgressService>>) -> Response {
    (StatusCode::OK, Json(service.stats())).into_response()
}
