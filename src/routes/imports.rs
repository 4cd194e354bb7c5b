use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::auth::AuthLearner;
use crate::constants::MAX_IMPORT_PHRASES;
use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::routes::unix_now;
use crate::state::AppState;
use crate::store::operations::phrases::PhraseDraft;
use crate::validation::validate_import_batch;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(pending_import).post(queue_import).delete(clear_import))
        .route("/apply", post(apply_import))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportRequest {
    phrases: Vec<PhraseDraft>,
}

async fn pending_import(
    auth: AuthLearner,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let pending = state.store().pending_import(auth.learner)?.unwrap_or_default();
    Ok(ok(serde_json::json!({ "phrases": pending })))
}

async fn queue_import(
    auth: AuthLearner,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ImportRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.phrases.len() > MAX_IMPORT_PHRASES {
        return Err(AppError::payload_too_large("Too many phrases in one import"));
    }
    let drafts: Vec<PhraseDraft> = req
        .phrases
        .into_iter()
        .map(|d| PhraseDraft::new(d.text.trim(), d.explanation.trim()))
        .collect();
    validate_import_batch(&drafts).map_err(|msg| AppError::bad_request("IMPORT_INVALID", msg))?;

    let pending = state.store().queue_import(auth.learner, drafts)?;
    Ok(ok(serde_json::json!({ "pending": pending })))
}

async fn apply_import(
    auth: AuthLearner,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let imported = state.store().apply_import(auth.learner, unix_now())?;
    Ok(ok(serde_json::json!({ "imported": imported })))
}

async fn clear_import(
    auth: AuthLearner,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let cleared = state.store().clear_import(auth.learner)?;
    Ok(ok(serde_json::json!({ "cleared": cleared })))
}
