use axum::extract::{FromRef, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};
use sha2::{Digest, Sha256};

use crate::constants::AUTH_TOKEN_LENGTH;
use crate::response::AppError;
use crate::state::AppState;
use crate::store::LearnerId;

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth_header| auth_header.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

fn extract_cookie_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookie| {
            cookie.split(';').find_map(|part| {
                part.trim()
                    .strip_prefix(&format!("{cookie_name}="))
                    .map(str::to_string)
            })
        })
}

/// Bearer header first, then the `token` cookie.
pub fn extract_token_from_headers(headers: &HeaderMap) -> Result<String, AppError> {
    extract_bearer_token(headers)
        .or_else(|| extract_cookie_token(headers, "token"))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing bearer token"))
}

/// The learner owning the request's token.
#[derive(Debug, Clone, Copy)]
pub struct AuthLearner {
    pub learner: LearnerId,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthLearner
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let token = extract_token_from_headers(&parts.headers)?;
        if token.len() != AUTH_TOKEN_LENGTH {
            return Err(AppError::unauthorized("Invalid token"));
        }

        match app_state.store().lookup_token(&token) {
            Ok(learner) => Ok(AuthLearner { learner }),
            Err(e) if e.is_not_found() => Err(AppError::unauthorized("Invalid token")),
            Err(e) => Err(e.into()),
        }
    }
}

/// Caller holding `ADMIN_TOKEN`. Only the token-issuing endpoints use it.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

/// Compares digests, so timing does not depend on the length of a matching prefix.
fn admin_token_matches(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminAuth
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let Some(expected) = app_state.config().admin_token.as_deref() else {
            return Err(AppError::forbidden("Admin API disabled"));
        };
        let token = extract_bearer_token(&parts.headers)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?;

        if !admin_token_matches(&token, expected) {
            tracing::warn!("Rejected admin token");
            return Err(AppError::unauthorized("Invalid admin token"));
        }
        Ok(AdminAuth)
    }
}
