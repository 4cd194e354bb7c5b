use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::Router;
use serde::Deserialize;

use crate::auth::AuthLearner;
use crate::extractors::{JsonBody, PathParam};
use crate::response::{created, ok, AppError};
use crate::routes::unix_now;
use crate::state::AppState;
use crate::validation::validate_phrase;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_phrases).post(add_phrase))
        .route("/:sequence", put(update_phrase).delete(delete_phrase))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhraseRequest {
    text: String,
    explanation: String,
    /// Add even if the same text already exists.
    #[serde(default)]
    allow_duplicate: bool,
}

impl PhraseRequest {
    fn validated(&self) -> Result<(&str, &str), AppError> {
        let text = self.text.trim();
        let explanation = self.explanation.trim();
        validate_phrase(text, explanation)
            .map_err(|msg| AppError::bad_request("PHRASE_INVALID", msg))?;
        Ok((text, explanation))
    }
}

async fn list_phrases(
    auth: AuthLearner,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.store().list_phrases(auth.learner)?))
}

async fn add_phrase(
    auth: AuthLearner,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PhraseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (text, explanation) = req.validated()?;
    let store = state.store();

    if !req.allow_duplicate {
        if let Some(existing) = store.find_phrase(auth.learner, text)? {
            tracing::debug!(
                learner = auth.learner,
                sequence = existing.sequence,
                "Duplicate phrase rejected"
            );
            return Err(AppError::conflict("PHRASE_EXISTS", "Phrase already exists"));
        }
    }

    let now = unix_now();
    store.record_engagement(auth.learner, now)?;
    let phrase = store.add_phrase(auth.learner, text, explanation, now)?;
    Ok(created(phrase))
}

async fn update_phrase(
    auth: AuthLearner,
    State(state): State<AppState>,
    PathParam(sequence): PathParam<u64>,
    JsonBody(req): JsonBody<PhraseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (text, explanation) = req.validated()?;
    let phrase = state
        .store()
        .update_phrase(auth.learner, sequence, text, explanation)?;
    Ok(ok(phrase))
}

async fn delete_phrase(
    auth: AuthLearner,
    State(state): State<AppState>,
    PathParam(sequence): PathParam<u64>,
) -> Result<impl IntoResponse, AppError> {
    let phrase = state.store().delete_phrase(auth.learner, sequence)?;
    Ok(ok(phrase))
}
