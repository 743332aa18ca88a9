use crate::server::ClinicServer;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const HEALTH_MESSAGE: &str = "Sistema Médico FUNDAMUFA - API funcionando";

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    /// Whether the database answered `SELECT 1`
    pub database: bool,
}

/// Health check handler
///
/// Always answers 200 while the process is up; database reachability is
/// reported in the body.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(server): State<ClinicServer>) -> Json<HealthResponse> {
    let database = server.database.is_healthy().await;

    Json(HealthResponse {
        status: "OK".to_string(),
        message: HEALTH_MESSAGE.to_string(),
        database,
    })
}
