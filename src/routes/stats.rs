use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::auth::AuthLearner;
use crate::response::{ok, AppError};
use crate::routes::unix_now;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_stats))
}

#[derive(Debug, Default, Deserialize)]
struct StatsQuery {
    /// Skip the weekly throttle and leave the stats timestamp alone.
    #[serde(default)]
    peek: bool,
}

async fn get_stats(
    auth: AuthLearner,
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let now = unix_now();
    let stats = if query.peek {
        state.store().peek_stats(auth.learner, now)?
    } else {
        state.store().get_stats(auth.learner, now)?
    };
    Ok(ok(stats))
}
