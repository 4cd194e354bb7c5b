use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::auth::AuthLearner;
use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::routes::unix_now;
use crate::state::AppState;
use crate::store::operations::study::{ScoreSubmission, Submitted};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_study))
        .route("/score", post(score_study))
}

async fn get_study(
    auth: AuthLearner,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let now = unix_now();
    state.store().record_engagement(auth.learner, now)?;
    Ok(ok(state.store().get_study(auth.learner, now)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreRequest {
    delta: i64,
    /// The phrase being answered, as returned by `GET /api/study`.
    sequence: Option<u64>,
    /// Client-side id; a redelivered request with the same id is rejected.
    message_id: Option<String>,
}

async fn score_study(
    auth: AuthLearner,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ScoreRequest>,
) -> Result<impl IntoResponse, AppError> {
    let submission = ScoreSubmission {
        delta: req.delta,
        sequence: req.sequence,
        message_id: req.message_id.as_deref(),
    };

    match state.store().submit_score(auth.learner, &submission, unix_now())? {
        Submitted::Scored(outcome) => Ok(ok(outcome)),
        Submitted::DuplicateMessage => Err(AppError::conflict(
            "DUPLICATE_MESSAGE",
            "Message already processed",
        )),
        Submitted::DuplicatePayload => Err(AppError::conflict(
            "DUPLICATE_SUBMISSION",
            "Score submitted twice",
        )),
        Submitted::StudyChanged { .. } => Err(AppError::conflict(
            "STUDY_CHANGED",
            "This phrase was already scored",
        )),
    }
}
