use crate::api::AppState;
use crate::api::types::HealthResponse;
use axum::{Json, extract::State};

/// GET /health - Liveness plus the breaker state of every peer client.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let breakers = state
        .upstream
        .snapshots()
        .into_iter()
        .map(|(service, snapshot)| (service.name().to_string(), snapshot))
        .collect();

    Json(HealthResponse {
        status: "ok".to_string(),
        service: state.service.name().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        breakers,
    })
}
