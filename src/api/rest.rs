// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Read-only views under `/api/v1/`: stored scores by date, the current weight
// vector, the weight audit trail and the most recent batch result.
//
// CORS is configured permissively; the surface exposes no mutation.
// =============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::app_state::AppState;
use crate::screening::ScoreRecord;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

// =============================================================================
// Router construction
// =============================================================================

/// Build the REST router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/scores/latest", get(scores_latest))
        .route("/api/v1/scores/:date", get(scores_for_date))
        .route("/api/v1/weights", get(weights))
        .route("/api/v1/weights/audit", get(weights_audit))
        .route("/api/v1/batch/latest", get(batch_latest))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    uptime_secs: u64,
    latest_date: Option<NaiveDate>,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        uptime_secs: state.uptime_secs(),
        latest_date: state.latest_date(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Scores
// =============================================================================

#[derive(Serialize)]
struct ScoresResponse {
    eval_date: NaiveDate,
    count: usize,
    records: Vec<ScoreRecord>,
}

fn scores_response(state: &AppState, date: NaiveDate) -> Result<Json<ScoresResponse>, ApiError> {
    let records = state.ranked_records(date);
    if records.is_empty() {
        return Err(api_error(StatusCode::NOT_FOUND, format!("no scores stored for {date}")));
    }
    Ok(Json(ScoresResponse {
        eval_date: date,
        count: records.len(),
        records,
    }))
}

async fn scores_latest(State(state): State<Arc<AppState>>) -> Result<Json<ScoresResponse>, ApiError> {
    let date = state
        .latest_date()
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "no scores stored yet"))?;
    scores_response(&state, date)
}

async fn scores_for_date(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<ScoresResponse>, ApiError> {
    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
        warn!(date = %raw, "rejected malformed date");
        api_error(StatusCode::BAD_REQUEST, format!("expected YYYY-MM-DD, got {raw}"))
    })?;
    scores_response(&state, date)
}

// =============================================================================
// Weights
// =============================================================================

#[derive(Serialize)]
struct WeightsResponse {
    version: u64,
    weights: BTreeMap<String, f64>,
}

async fn weights(State(state): State<Arc<AppState>>) -> Result<Json<WeightsResponse>, ApiError> {
    let snapshot = state
        .weight_store
        .snapshot()
        .map_err(|e| api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    Ok(Json(WeightsResponse {
        version: snapshot.version,
        weights: snapshot
            .weights
            .iter()
            .map(|(name, w)| (name.to_string(), w))
            .collect(),
    }))
}

async fn weights_audit(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.weight_store.audit_trail())
}

// =============================================================================
// Last batch
// =============================================================================

async fn batch_latest(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let verbose = state.config.read().verbose;
    match state.latest_batch.read().as_ref() {
        Some(batch) => Json(batch.summary(verbose)).into_response(),
        None => api_error(StatusCode::NOT_FOUND, "no batch recorded yet").into_response(),
    }
}
