use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, delete},
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult, SessionError};
use crate::image::is_base64_image;
use crate::models::{EditRequest, OutfitRecord, RunSnapshot, StartStylingRequest};
use crate::session::StylingSessions;

#[derive(Clone)]
pub struct AppState {
    pub sessions: StylingSessions,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/styling", post(start_styling))
        .route("/api/styling/:run_id", get(get_run).delete(discard_run))
        .route("/api/styling/:run_id/outfits/:outfit_id/edit", post(edit_outfit))
        .route("/api/styling/:run_id/outfits/:outfit_id/regenerate", post(regenerate_outfit))
        .route("/api/styling/:run_id/outfits/:outfit_id/save", post(save_outfit))
        .route("/api/saved", get(list_saved))
        .route("/api/saved/:id", delete(delete_saved))
        .route("/api/saved/:id/regenerate", post(regenerate_saved))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "demo_mode": state.sessions.stylist().provider().is_demo(),
    }))
}

#[axum::debug_handler]
pub async fn start_styling(
    State(state): State<AppState>,
    Json(body): Json<StartStylingRequest>,
) -> ApiResult<(StatusCode, Json<RunSnapshot>)> {
    if !is_base64_image(&body.source_image) {
        return Err(ApiError::BadRequest("source_image must be a base64 image or data URL".into()));
    }
    tracing::info!(occasion = ?body.custom_occasion, "🎯 New styling request");
    let snapshot = state.sessions.start_run(&body.source_image, body.custom_occasion.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn get_run(Path(run_id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<Json<RunSnapshot>> {
    state.sessions.run(run_id).map(Json).ok_or(ApiError::Session(SessionError::RunNotFound(run_id)))
}

pub async fn discard_run(Path(run_id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<StatusCode> {
    if state.sessions.discard_run(run_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(SessionError::RunNotFound(run_id).into())
    }
}

pub async fn edit_outfit(
    Path((run_id, outfit_id)): Path<(Uuid, String)>,
    State(state): State<AppState>,
    Json(body): Json<EditRequest>,
) -> ApiResult<Json<OutfitRecord>> {
    let edited = state.sessions.edit_outfit(run_id, &outfit_id, &body.instruction).await?;
    Ok(Json(edited))
}

pub async fn regenerate_outfit(
    Path((run_id, outfit_id)): Path<(Uuid, String)>,
    State(state): State<AppState>,
) -> ApiResult<Json<OutfitRecord>> {
    let record = state.sessions.regenerate_outfit(run_id, &outfit_id).await?;
    Ok(Json(record))
}

pub async fn save_outfit(
    Path((run_id, outfit_id)): Path<(Uuid, String)>,
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<OutfitRecord>)> {
    let saved = state.sessions.save_outfit(run_id, &outfit_id).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn list_saved(State(state): State<AppState>) -> Json<Vec<OutfitRecord>> {
    Json(state.sessions.list_saved().await)
}

pub async fn delete_saved(Path(id): Path<String>, State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.sessions.delete_saved(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn regenerate_saved(Path(id): Path<String>, State(state): State<AppState>) -> ApiResult<Json<OutfitRecord>> {
    let record = state.sessions.regenerate_saved(&id).await?;
    Ok(Json(record))
}
