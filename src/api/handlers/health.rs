use crate::{
    types::{ApiResponse, Result},
    AppState,
};
use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub version: String,
    /// Model answering free-text questions ("offline" when none)
    pub model: String,
    pub sessions: usize,
    /// Connected dashboard WebSocket clients
    pub dashboard_clients: usize,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = ApiResponse<HealthStatus>)
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<ApiResponse<HealthStatus>>> {
    let status = HealthStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.llm.model_name().to_string(),
        sessions: state.sessions.keys().await.len(),
        dashboard_clients: state.events.receiver_count(),
    };
    Ok(Json(ApiResponse::success(status, "ok")))
}
