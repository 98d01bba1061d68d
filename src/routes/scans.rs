//! /api/scans — scan record CRUD and summary statistics.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::db::queries::{self, ListFilter};
use crate::models::scan::{ScanHistoryItem, SummaryStats};
use crate::routes::ApiError;

#[derive(Debug, Serialize)]
pub struct SaveScanResponse {
    pub message: String,
    pub data: ScanHistoryItem,
}

#[derive(Debug, Serialize)]
pub struct ListScansResponse {
    pub count: usize,
    pub data: Vec<ScanHistoryItem>,
}

#[derive(Debug, Serialize)]
pub struct DeleteScanResponse {
    pub message: String,
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub brand: Option<String>,
    pub limit: Option<i64>,
}

/// POST /api/scans — persist a completed scan.
///
/// The body is deserialized by hand so an incomplete payload yields the
/// contract's 400, not the extractor's default 422.
pub async fn create_scan(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<SaveScanResponse>), ApiError> {
    let item: ScanHistoryItem = serde_json::from_value(body).map_err(|e| {
        ApiError::BadRequest(format!("Missing or invalid fields: {e}"))
    })?;
    item.validate()
        .map_err(|report| ApiError::BadRequest(format!("Invalid scan payload: {report}")))?;

    tracing::info!(
        id = %item.id,
        brand = %item.result.brand,
        status = %item.result.status,
        "saving scan"
    );

    let saved = queries::create_scan(&state.db, &item).await?;
    metrics::counter!("scans_saved_total").increment(1);

    Ok((
        StatusCode::CREATED,
        Json(SaveScanResponse {
            message: "Scan saved successfully".to_string(),
            data: saved,
        }),
    ))
}

/// GET /api/scans — list with optional status/brand/limit filters.
pub async fn list_scans(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListScansResponse>, ApiError> {
    // Empty query strings mean "no filter".
    let filter = ListFilter {
        status: params
            .status
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_uppercase()),
        brand: params.brand.filter(|b| !b.trim().is_empty()),
        limit: params.limit,
    };

    let data = queries::list_scans(&state.db, &filter).await?;
    tracing::debug!(count = data.len(), "fetched scans");

    Ok(Json(ListScansResponse {
        count: data.len(),
        data,
    }))
}

/// GET /api/scans/{id}
pub async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScanHistoryItem>, ApiError> {
    let item = queries::get_scan(&state.db, &id).await?;
    Ok(Json(item))
}

/// DELETE /api/scans/{id} — permanent, no tombstone.
pub async fn delete_scan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteScanResponse>, ApiError> {
    let deleted = queries::delete_scan(&state.db, &id).await?;
    metrics::counter!("scans_deleted_total").increment(1);
    tracing::info!(id = %deleted.id, "scan deleted");

    Ok(Json(DeleteScanResponse {
        message: "Scan deleted successfully".to_string(),
        id: deleted.id,
    }))
}

/// GET /api/scans/stats/summary
pub async fn stats_summary(
    State(state): State<AppState>,
) -> Result<Json<SummaryStats>, ApiError> {
    let stats = queries::summary_stats(&state.db).await?;
    Ok(Json(stats))
}
