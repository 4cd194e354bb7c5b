use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::AuthLearner;
use crate::response::{ok, AppError};
use crate::routes::unix_now;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(subscription_status)
                .post(subscribe)
                .delete(unsubscribe),
        )
        .route("/read", post(mark_read))
}

async fn subscription_status(
    auth: AuthLearner,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store();
    Ok(ok(serde_json::json!({
        "subscribed": store.is_subscribed(auth.learner)?,
        "notifyCount": store.notify_count(auth.learner)?,
    })))
}

async fn subscribe(
    auth: AuthLearner,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store();
    store.subscribe(auth.learner)?;
    store.record_engagement(auth.learner, unix_now())?;
    tracing::info!(learner = auth.learner, "Learner subscribed to reminders");
    Ok(ok(serde_json::json!({ "subscribed": true })))
}

async fn unsubscribe(
    auth: AuthLearner,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    state.store().unsubscribe(auth.learner)?;
    tracing::info!(learner = auth.learner, "Learner unsubscribed from reminders");
    Ok(ok(serde_json::json!({ "subscribed": false })))
}

/// Read receipt: everything sent up to now has been seen.
async fn mark_read(
    auth: AuthLearner,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let now = unix_now();
    state.store().record_read(auth.learner, now)?;
    Ok(ok(serde_json::json!({ "readAt": now })))
}
