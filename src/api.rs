// src/api.rs
//! Read-mostly diagnostics routes over a shared tracker.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::error::TrackerError;
use crate::stats::TrackerStats;
use crate::tracker::SlotNotificationTracker;

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<SlotNotificationTracker>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/admin/sweep", post(sweep))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Maps tracker failures onto status codes; a down backend is a 503, not a 500.
pub struct ApiError(TrackerError);

impl From<TrackerError> for ApiError {
    fn from(e: TrackerError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TrackerError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            TrackerError::Encoding(_) | TrackerError::InvalidTtl(_) => StatusCode::BAD_REQUEST,
            TrackerError::Configuration(_) | TrackerError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Response {
    match state.tracker.ping().await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("backend down: {e}")).into_response(),
    }
}

async fn stats(State(state): State<AppState>) -> Result<Json<TrackerStats>, ApiError> {
    Ok(Json(state.tracker.stats().await?))
}

#[derive(Deserialize)]
struct SweepQuery {
    days: Option<i64>,
}

#[derive(Serialize)]
struct SweepResp {
    removed: usize,
    older_than_days: i64,
}

async fn sweep(
    State(state): State<AppState>,
    Query(q): Query<SweepQuery>,
) -> Result<Json<SweepResp>, ApiError> {
    let days = q
        .days
        .unwrap_or_else(|| state.tracker.options().default_ttl.num_days());
    let older_than =
        Duration::try_days(days).ok_or(TrackerError::InvalidTtl(days.saturating_mul(86_400)))?;
    let removed = state.tracker.sweep_expired(older_than).await?;
    Ok(Json(SweepResp {
        removed,
        older_than_days: days,
    }))
}
