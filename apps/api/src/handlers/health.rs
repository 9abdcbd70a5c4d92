//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub database: bool,
}

/// `GET /health`
///
/// - 200 OK: the database answers
/// - 503 Service Unavailable: it does not
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let database = state.db.health_check().await;
    if database {
        (StatusCode::OK, Json(HealthReport { status: "healthy", database }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthReport { status: "unhealthy", database }),
        )
    }
}
