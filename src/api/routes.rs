//! API route definitions
//!
//! - /api/v1/vehicles - merged vehicle status
//! - /api/v1/processing - processing ledger
//! - /api/v1/artifacts - uploads and re-runs
//! - /api/v1/reports/fleet - fleet readiness report

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, ApiState};

pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/vehicles", get(handlers::list_vehicles))
        .route("/vehicles/:vehicle_id", get(handlers::get_vehicle))
        .route("/processing", get(handlers::list_processing))
        .route("/processing/:artifact_id", get(handlers::get_processing))
        .route("/artifacts", post(handlers::upload_artifact))
        .route(
            "/artifacts/:artifact_id/reprocess",
            post(handlers::reprocess_artifact),
        )
        .route("/reports/fleet", get(handlers::get_fleet_report))
        .with_state(state)
}

pub fn health_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state)
}
