// HTTP route handlers for the Polyglot API

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use polyglot_common::types::{EvaluationRequest, RunRequest};
use polyglot_engine::EngineError;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::AppState;

/// Engine contract failures rendered as `{"error": ...}`
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            warn!(error = %self.0, "Request rejected");
        }
        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

/// POST /run - Execute code once against the given input
pub async fn run_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        language = %payload.language,
        code_size = payload.code.len(),
        input_size = payload.input.len(),
        "Run requested"
    );
    let response = state.executor.run_wire(payload).await?;
    Ok((StatusCode::OK, Json(response)))
}

/// POST /evaluate - Run test cases and produce a verdict
pub async fn evaluate_submission(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EvaluationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        language = %payload.language,
        code_size = payload.code.len(),
        test_cases = payload.test_cases.len(),
        examples = payload.examples.len(),
        "Evaluation requested"
    );
    let verdict = state.executor.evaluate(&payload).await?;
    info!(
        correctness = verdict.correctness,
        score = verdict.score,
        passed = verdict.test_cases_passed,
        total = verdict.total_test_cases,
        "Evaluation complete"
    );
    Ok((StatusCode::OK, Json(verdict)))
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /toolchains - Local toolchain availability per language
pub async fn list_toolchains(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.executor.toolchains()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_errors_are_bad_requests() {
        assert_eq!(
            ApiError::from(EngineError::EmptySource).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(EngineError::UnsupportedLanguage("cobol".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_host_errors_are_server_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(
            ApiError::from(EngineError::Workspace(io)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
