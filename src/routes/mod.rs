pub mod health;
pub mod imports;
pub mod phrases;
pub mod stats;
pub mod study;
pub mod subscription;
pub mod tokens;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};

use crate::response::ErrorBody;
use crate::state::AppState;

/// Maximum request body size: 4 MiB (large import batches).
const MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .nest("/phrases", phrases::router())
        .nest("/study", study::router())
        .nest("/stats", stats::router())
        .nest("/import", imports::router())
        .nest("/subscription", subscription::router())
        .nest("/tokens", tokens::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE));

    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health::router())
        .fallback(fallback_404)
        .with_state(state)
}

/// Unix seconds; every store operation takes time explicitly.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

async fn fallback_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            success: false,
            code: "NOT_FOUND".to_string(),
            message: "Not found".to_string(),
            ready_at: None,
        }),
    )
}
