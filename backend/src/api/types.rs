//! REST API types.
//!
//! The analysis is returned as-is, flattened next to a job id and a status.

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{PipelineError, ServerError};
use crate::transform::pipeline::AnalysisResult;

/// Response sent after a CSV upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    /// Unique job identifier
    pub job_id: String,

    /// "ready", or "warning" when date columns were dropped
    pub status: String,

    #[serde(flatten)]
    pub analysis: AnalysisResult,
}

impl From<AnalysisResult> for AnalysisResponse {
    fn from(analysis: AnalysisResult) -> Self {
        let status = if analysis.warnings.is_empty() { "ready" } else { "warning" };
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            analysis,
        }
    }
}

/// Create an error response body
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}

impl ServerError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Pipeline(e) => match e {
                PipelineError::Validation(_) | PipelineError::Json(_) => StatusCode::BAD_REQUEST,
                PipelineError::Csv(_) | PipelineError::EmptyInput => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::Fetch(_) => StatusCode::BAD_GATEWAY,
                PipelineError::Io(_) | PipelineError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        (status, axum::Json(error_response(&self.to_string()))).into_response()
    }
}
