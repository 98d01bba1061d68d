//! /api/ml — analysis adapter endpoints.

use axum::extract::{Multipart, State};
use axum::Json;
use std::time::Instant;

use crate::app_state::AppState;
use crate::models::scan::{MlStatus, ScanResult};
use crate::routes::ApiError;

/// POST /api/ml/analyze — multipart upload (field `image`), returns the
/// canonical ScanResult shape from whichever adapter is configured.
pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ScanResult>, ApiError> {
    let mut image_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart payload".to_string()))?
    {
        if field.name() == Some("image") {
            let data = field
                .bytes()
                .await
                .map_err(|_| ApiError::BadRequest("Failed to read image field".to_string()))?;
            image_data = Some(data.to_vec());
        }
    }

    let image = image_data
        .ok_or_else(|| ApiError::BadRequest("No image file uploaded".to_string()))?;

    tracing::info!(bytes = image.len(), "running image analysis");
    metrics::counter!("ml_analyses_total").increment(1);
    let start = Instant::now();

    let result = match state.analyzer.analyze(&image).await {
        Ok(result) => result,
        Err(e) => {
            metrics::counter!("ml_analyses_failed_total").increment(1);
            return Err(e.into());
        }
    };

    metrics::histogram!("ml_analysis_seconds").record(start.elapsed().as_secs_f64());
    tracing::info!(
        status = %result.status,
        confidence = result.confidence_score,
        "analysis complete"
    );

    Ok(Json(result))
}

/// GET /api/ml/ml-status — adapter readiness probe.
pub async fn ml_status(State(state): State<AppState>) -> Json<MlStatus> {
    Json(state.analyzer.status())
}
