use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::db::queries::StoreError;
use crate::services::analyzer::AnalyzerError;

pub mod health;
pub mod metrics;
pub mod ml;
pub mod scans;

/// Error body shape shared by every endpoint: a machine-readable `error`
/// plus an optional human `details` string. Store-internal messages are
/// surfaced only where safe; stack traces never are.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal { error: String, details: Option<String> },
}

impl ApiError {
    pub fn internal(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Internal {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(error) => (
                StatusCode::BAD_REQUEST,
                ErrorBody { error, details: None },
            ),
            Self::NotFound(error) => (
                StatusCode::NOT_FOUND,
                ErrorBody { error, details: None },
            ),
            Self::Conflict(error) => (
                StatusCode::CONFLICT,
                ErrorBody { error, details: None },
            ),
            Self::Internal { error, details } => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody { error, details })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => {
                Self::Conflict("Scan with this ID already exists".to_string())
            }
            StoreError::NotFound(_) => Self::NotFound("Scan not found".to_string()),
            StoreError::Database(e) => {
                tracing::error!(error = %e, "store operation failed");
                Self::internal("Database operation failed", e.to_string())
            }
        }
    }
}

impl From<AnalyzerError> for ApiError {
    fn from(err: AnalyzerError) -> Self {
        match err {
            AnalyzerError::InvalidImage(msg) => Self::BadRequest(msg),
            other => {
                tracing::error!(error = %other, "analysis failed");
                Self::internal("ML analysis failed", other.to_string())
            }
        }
    }
}

/// GET / — endpoint directory.
pub async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "message": "SatyaScan Backend API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/api/health",
            "scans": "/api/scans",
            "stats": "/api/scans/stats/summary",
            "analyze": "/api/ml/analyze",
            "mlStatus": "/api/ml/ml-status"
        }
    }))
}

/// Fallback for unknown paths.
pub async fn not_found() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "Route not found".to_string(),
            details: None,
        }),
    )
}
