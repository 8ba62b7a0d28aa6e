use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use crate::{
    app_state::AppState,
    error::{AppError, AppResult, ChatError},
};

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Resolves the bearer token into an `Identity` request extension.
///
/// The token may come from the `Authorization` header or, for WebSocket
/// upgrades from browsers, the `token` query parameter.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    let token = header_token(req.headers())
        .or_else(|| {
            Query::<TokenQuery>::try_from_uri(req.uri())
                .ok()
                .and_then(|Query(q)| q.token)
        })
        .ok_or(ChatError::Unauthorized)?;

    let identity = state.jwt.verify(strip_bearer(&token))?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Admin-group identities only. Runs after `auth_middleware`.
pub async fn admin_middleware(req: Request, next: Next) -> AppResult<Response> {
    let is_admin = req
        .extensions()
        .get::<crate::models::identity::Identity>()
        .is_some_and(|identity| identity.is_admin());
    if !is_admin {
        return Err(AppError::from(ChatError::Forbidden));
    }
    Ok(next.run(req).await)
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn strip_bearer(raw: &str) -> &str {
    let raw = raw.trim();
    raw.strip_prefix("Bearer ").unwrap_or(raw).trim()
}
