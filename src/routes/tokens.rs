//! Token issuance. The chat adapter (or an operator) holds `ADMIN_TOKEN` and
//! hands learners the link token; learners can rotate their own.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::{AdminAuth, AuthLearner};
use crate::extractors::PathParam;
use crate::response::{ok, AppError};
use crate::routes::unix_now;
use crate::state::AppState;
use crate::store::LearnerId;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rotate", post(rotate_own_token))
        .route(
            "/learners/:learner",
            get(learner_token).post(rotate_learner_token),
        )
}

fn token_body(learner: LearnerId, token: String) -> serde_json::Value {
    serde_json::json!({ "learner": learner, "token": token })
}

async fn rotate_own_token(
    auth: AuthLearner,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let token = state.store().generate_token(auth.learner, unix_now())?;
    Ok(ok(token_body(auth.learner, token)))
}

/// The learner's live token, minted on first request.
async fn learner_token(
    _admin: AdminAuth,
    State(state): State<AppState>,
    PathParam(learner): PathParam<LearnerId>,
) -> Result<impl IntoResponse, AppError> {
    let token = state.store().token_for_learner(learner, unix_now())?;
    Ok(ok(token_body(learner, token)))
}

async fn rotate_learner_token(
    _admin: AdminAuth,
    State(state): State<AppState>,
    PathParam(learner): PathParam<LearnerId>,
) -> Result<impl IntoResponse, AppError> {
    let token = state.store().generate_token(learner, unix_now())?;
    tracing::info!(learner, "Token rotated by admin");
    Ok(ok(token_body(learner, token)))
}
