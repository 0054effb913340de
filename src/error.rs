use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde_json::json;
use thiserror::Error;

/// Message shown when the analysis step fails and the whole run is abandoned.
pub const ANALYSIS_FAILED_MESSAGE: &str = "Could not analyze the image. Please try again.";

/// Failures reported by a styling capability provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("Parse error: {0}")] Parse(String),
    #[error("Other: {0}")] Other(String),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Could not analyze the image. Please try again.")]
    AnalysisFailed(#[source] ProviderError),
    #[error("Cannot regenerate this look: the original item image is missing")]
    MissingSourceImage,
    #[error("Cannot edit this look: it has no generated image yet")]
    MissingGeneratedImage,
    #[error("Failed to edit the image. Please try again.")]
    EditFailed(#[source] ProviderError),
    #[error("The edit did not return an image")]
    EditReturnedNoImage,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Single generic storage failure; the cause is kept for logging only.
#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StoreError(pub String);

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError(format!("serialization: {err}"))
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Styling run {0} not found")]
    RunNotFound(uuid::Uuid),
    #[error("Outfit {0} not found")]
    OutfitNotFound(String),
    #[error("Saved look {0} not found")]
    SavedNotFound(String),
    #[error("An edit is already in progress for outfit {0}")]
    EditInProgress(String),
    #[error("Outfit {0} is still generating")]
    StillGenerating(String),
    #[error("Outfit {0} changed while the edit was running; the edit was discarded")]
    EditSuperseded(String),
    #[error("Only completed looks can be saved")]
    NotComplete,
}

/// HTTP-facing error; renders `{ "error", "code" }` JSON bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Session(SessionError::Workflow(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Session(session) => match session {
                SessionError::Workflow(wf) => match wf {
                    WorkflowError::AnalysisFailed(cause) => {
                        tracing::error!(error = %cause, "Analysis failed");
                        (StatusCode::BAD_GATEWAY, "ANALYSIS_FAILED", wf.to_string())
                    }
                    WorkflowError::EditFailed(cause) => {
                        tracing::warn!(error = %cause, "Edit failed");
                        (StatusCode::BAD_GATEWAY, "EDIT_FAILED", wf.to_string())
                    }
                    WorkflowError::EditReturnedNoImage => (StatusCode::BAD_GATEWAY, "EDIT_NO_IMAGE", wf.to_string()),
                    WorkflowError::MissingSourceImage => (StatusCode::UNPROCESSABLE_ENTITY, "MISSING_SOURCE_IMAGE", wf.to_string()),
                    WorkflowError::MissingGeneratedImage => (StatusCode::UNPROCESSABLE_ENTITY, "MISSING_GENERATED_IMAGE", wf.to_string()),
                    WorkflowError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
                },
                SessionError::Store(err) => {
                    tracing::error!(error = %err, "Storage error");
                    (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", "Local storage is unavailable".to_string())
                }
                SessionError::RunNotFound(_) | SessionError::OutfitNotFound(_) | SessionError::SavedNotFound(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", session.to_string())
                }
                SessionError::EditInProgress(_) | SessionError::EditSuperseded(_) => {
                    (StatusCode::CONFLICT, "CONFLICT", session.to_string())
                }
                SessionError::StillGenerating(_) => (StatusCode::CONFLICT, "STILL_GENERATING", session.to_string()),
                SessionError::NotComplete => (StatusCode::CONFLICT, "NOT_COMPLETE", session.to_string()),
            },
        };

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}
