use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use super::{
    claims::{Claims, UserSnapshot},
    jwt::TokenError,
};
use crate::{error::AppError, state::AppState};

/// Result of inspecting a request for a session token.
#[derive(Debug)]
pub enum Session {
    Anonymous,
    Authenticated(Claims),
}

/// Cookie first, then `Authorization: Bearer` for non-browser clients.
pub(crate) fn token_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(c) = jar.get(cookie_name).filter(|c| !c.value().is_empty()) {
        return Some(c.value().to_string());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Resolves the token to claims, consulting the logout revocation set.
pub(crate) async fn resolve_token(state: &AppState, token: &str) -> Result<Claims, TokenError> {
    let claims = state.keys.resolve(token)?;
    if state.revoked.is_revoked(&claims.jti).await {
        return Err(TokenError::Revoked);
    }
    Ok(claims)
}

/// A present but unresolvable token is an error, never an anonymous session.
pub async fn resolve_session(state: &AppState, headers: &HeaderMap) -> Result<Session, TokenError> {
    match token_from_headers(headers, &state.config.cookie.name) {
        None => Ok(Session::Anonymous),
        Some(token) => resolve_token(state, &token).await.map(Session::Authenticated),
    }
}

async fn require_session(parts: &Parts, state: &AppState) -> Result<Claims, AppError> {
    match resolve_session(state, &parts.headers).await {
        Ok(Session::Authenticated(claims)) => Ok(claims),
        Ok(Session::Anonymous) => Err(AppError::Unauthorized("login required".into())),
        Err(e) => {
            warn!(error = %e, "session rejected");
            Err(AppError::Unauthorized(format!("{e}")))
        }
    }
}

/// Requires a valid session and yields the profile snapshot from the token.
pub struct AuthUser(pub UserSnapshot);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_session(parts, state).await.map(|c| AuthUser(c.user))
    }
}

/// Like [`AuthUser`] but keeps the whole claim set, for handlers that
/// replace or revoke the presented token.
pub struct AuthSession(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_session(parts, state).await.map(AuthSession)
    }
}
