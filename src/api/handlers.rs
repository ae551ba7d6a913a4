//! API handlers
//!
//! All handlers return `Response` via [`ApiResponse`] or [`ApiErrorResponse`].

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::error;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::config::defaults::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::ledger::{LedgerError, ProcessingLedger};
use crate::merge::MergeEngine;
use crate::pipeline::{Intake, IntakeError, Pipeline, UploadRequest};
use crate::reporting::{self, ReportKind};
use crate::types::{ArtifactId, ProcessingRecord, ProcessingState, VehicleId};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub ledger: ProcessingLedger,
    pub merge: MergeEngine,
    pub intake: Intake,
    pub backend: &'static str,
    pub started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        Self {
            ledger: pipeline.ledger.clone(),
            merge: pipeline.merge.clone(),
            intake: pipeline.intake.clone(),
            backend: pipeline.store.backend_name(),
            started_at: Utc::now(),
        }
    }
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
    pub uptime_secs: i64,
    pub artifacts_by_state: HashMap<ProcessingState, usize>,
}

/// GET /health
pub async fn get_health(State(state): State<ApiState>) -> Response {
    match state.ledger.state_counts() {
        Ok(counts) => ApiResponse::ok(HealthResponse {
            status: "ok",
            backend: state.backend,
            uptime_secs: (Utc::now() - state.started_at).num_seconds(),
            artifacts_by_state: counts,
        }),
        Err(e) => {
            error!(error = %e, "Health check could not read ledger");
            ApiErrorResponse::internal(e.to_string())
        }
    }
}

// ============================================================================
// Vehicles
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// GET /api/v1/vehicles
pub async fn list_vehicles(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Response {
    match state.merge.aggregates(clamp_limit(query.limit)) {
        Ok(aggregates) => ApiResponse::ok(aggregates),
        Err(e) => ApiErrorResponse::internal(e.to_string()),
    }
}

/// GET /api/v1/vehicles/:vehicle_id
pub async fn get_vehicle(State(state): State<ApiState>, Path(vehicle_id): Path<String>) -> Response {
    let vehicle = VehicleId::from(vehicle_id);
    match state.merge.aggregate(&vehicle) {
        Ok(Some(aggregate)) => ApiResponse::ok(aggregate),
        Ok(None) => ApiErrorResponse::not_found(format!("no status recorded for vehicle {vehicle}")),
        Err(e) => ApiErrorResponse::internal(e.to_string()),
    }
}

// ============================================================================
// Processing records
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ProcessingQuery {
    pub vehicle_id: Option<String>,
    pub state: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/v1/processing
pub async fn list_processing(
    State(state): State<ApiState>,
    Query(query): Query<ProcessingQuery>,
) -> Response {
    let limit = clamp_limit(query.limit);
    let result = match (query.vehicle_id, query.state) {
        (vehicle, Some(raw)) => match ProcessingState::parse(&raw) {
            Some(s) => state.ledger.in_state(s).map(|mut records| {
                if let Some(vehicle) = vehicle {
                    records.retain(|r| r.vehicle_id.as_str() == vehicle);
                }
                records.truncate(limit);
                records
            }),
            None => return ApiErrorResponse::bad_request(format!("unknown state '{raw}'")),
        },
        (Some(vehicle), None) => state.ledger.for_vehicle(&VehicleId::from(vehicle), limit),
        (None, None) => state.ledger.recent(limit),
    };
    match result {
        Ok(records) => ApiResponse::ok(records),
        Err(e) => ApiErrorResponse::internal(e.to_string()),
    }
}

#[derive(Debug, Serialize)]
pub struct ArtifactProcessing {
    pub latest: ProcessingRecord,
    pub history: Vec<ProcessingRecord>,
}

/// GET /api/v1/processing/:artifact_id
pub async fn get_processing(
    State(state): State<ApiState>,
    Path(artifact_id): Path<String>,
) -> Response {
    let id = ArtifactId::from(artifact_id);
    let history = match state.ledger.history(&id) {
        Ok(history) => history,
        Err(e) => return ApiErrorResponse::internal(e.to_string()),
    };
    match history.last().cloned() {
        Some(latest) => ApiResponse::ok(ArtifactProcessing { latest, history }),
        None => ApiErrorResponse::not_found(format!("no processing record for artifact {id}")),
    }
}

// ============================================================================
// Uploads and re-runs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub vehicle_id: String,
    pub category: String,
    pub file_name: String,
    pub content_type: Option<String>,
}

/// POST /api/v1/artifacts
pub async fn upload_artifact(
    State(state): State<ApiState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = query.content_type.or_else(|| {
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|ct| *ct != "application/octet-stream")
            .map(str::to_string)
    });

    let request = UploadRequest {
        vehicle_id: query.vehicle_id,
        category: query.category,
        file_name: query.file_name,
        content_type,
        bytes: body.to_vec(),
    };

    match state.intake.upload(request).await {
        Ok(artifact) => ApiResponse::accepted(artifact),
        Err(IntakeError::Validation(msg)) => ApiErrorResponse::bad_request(msg),
        Err(e) => {
            error!(error = %e, "Upload failed");
            ApiErrorResponse::internal(e.to_string())
        }
    }
}

/// POST /api/v1/artifacts/:artifact_id/reprocess
pub async fn reprocess_artifact(
    State(state): State<ApiState>,
    Path(artifact_id): Path<String>,
) -> Response {
    let id = ArtifactId::from(artifact_id);
    match state.intake.reprocess(&id).await {
        Ok(record) => ApiResponse::accepted(record),
        Err(IntakeError::Ledger(LedgerError::NotFound(_))) => {
            ApiErrorResponse::not_found(format!("no processing record for artifact {id}"))
        }
        Err(IntakeError::Ledger(e @ LedgerError::IllegalTransition { .. })) => {
            ApiErrorResponse::conflict(e.to_string())
        }
        Err(e) => ApiErrorResponse::internal(e.to_string()),
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub kind: Option<String>,
}

/// GET /api/v1/reports/fleet
pub async fn get_fleet_report(
    State(state): State<ApiState>,
    Query(query): Query<ReportQuery>,
) -> Response {
    let kind = match query.kind.as_deref() {
        None => ReportKind::Daily,
        Some(raw) => match ReportKind::parse(raw) {
            Some(kind) => kind,
            None => return ApiErrorResponse::bad_request(format!("unknown report kind '{raw}'")),
        },
    };
    match reporting::generate(kind, &state.merge, &state.ledger) {
        Ok(report) => ApiResponse::ok(report),
        Err(e) => ApiErrorResponse::internal(e.to_string()),
    }
}
