use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        claims::UserSnapshot,
        cookie::{removal_cookie, session_cookie},
        dto::{
            non_blank, LoginRequest, MessageResponse, ProfileUpdateRequest, ProfileUpdateResponse,
            PublicUser, SignupRequest, TokenResponse,
        },
        extractors::{resolve_token, token_from_headers, AuthSession, AuthUser},
        password::{hash_password_blocking, verify_password_blocking},
        repo::CreateUser,
        repo_types::{ContactRow, NewUser},
    },
    error::AppError,
    ratelimit::rate_limit,
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes(state: &AppState) -> Router<AppState> {
    let limited = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/allusers/contact", get(list_contacts))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(limited)
        .route("/token/:token", get(introspect))
        .route("/logout", get(logout))
        .route("/profileUpdate", put(profile_update))
        .route("/username", get(username))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let email = payload.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password is required".into()));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Validation("Email already registered".into()));
    }

    let password_hash = hash_password_blocking(payload.password).await?;
    let new_user = NewUser {
        name,
        email,
        password_hash,
        gender: non_blank(payload.gender),
        phone: non_blank(payload.phone),
        address: non_blank(payload.address),
        city: non_blank(payload.city),
        state: non_blank(payload.state),
        pincode: non_blank(payload.pincode),
    };

    match state.users.create(new_user).await? {
        CreateUser::Created(user) => {
            info!(user_id = %user.id, email = %user.email, "user registered");
            Ok((StatusCode::CREATED, Json(PublicUser::from(user))))
        }
        CreateUser::EmailTaken => Err(AppError::Validation("Email already registered".into())),
    }
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    let email = payload.email.trim().to_lowercase();

    let user = match state.users.find_by_email(&email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login unknown email");
            return Err(AppError::NotFound("User not found".into()));
        }
    };

    if !verify_password_blocking(payload.password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredential);
    }

    let token = state.keys.issue(&user)?;
    info!(user_id = %user.id, "user logged in");
    let jar = jar.add(session_cookie(&state.config.cookie, token.clone()));
    Ok((jar, Json(TokenResponse { token })))
}

/// Resolves a token passed in the path; `null` when it does not verify.
#[instrument(skip_all)]
pub async fn introspect(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Json<Option<UserSnapshot>> {
    match resolve_token(&state, &token).await {
        Ok(claims) => Json(Some(claims.user)),
        Err(e) => {
            warn!(error = %e, "token introspection failed");
            Json(None)
        }
    }
}

/// Always succeeds; revokes the presented token (cookie or Bearer) when it
/// still verifies.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    if let Some(token) = token_from_headers(&headers, &state.config.cookie.name) {
        if let Ok(claims) = state.keys.resolve(&token) {
            state.revoked.revoke(&claims).await;
            info!(user_id = %claims.sub, "session revoked");
        }
    }
    let jar = jar.add(removal_cookie(&state.config.cookie));
    (
        jar,
        Json(MessageResponse {
            message: "Logged out successfully".into(),
        }),
    )
}

#[instrument(skip_all)]
pub async fn profile_update(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    jar: CookieJar,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<(CookieJar, Json<ProfileUpdateResponse>), AppError> {
    if matches!(payload.name.as_deref(), Some(n) if n.trim().is_empty()) {
        return Err(AppError::Validation("Name must not be empty".into()));
    }

    let user_id = session.sub;
    let updated = match state.users.update_profile(user_id, payload.into()).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(user_id = %user_id, "profile update for missing user");
            return Err(AppError::NotFound("User not found".into()));
        }
        Err(e) => {
            error!(error = %e, "update_profile failed");
            return Err(e.into());
        }
    };

    // The token carries a profile snapshot, so it is re-issued on every change
    // and the superseded one stops resolving.
    let token = state.keys.issue(&updated)?;
    state.revoked.revoke(&session).await;
    let jar = jar.add(session_cookie(&state.config.cookie, token));

    info!(user_id = %updated.id, "profile updated");
    Ok((
        jar,
        Json(ProfileUpdateResponse {
            message: "Profile updated successfully".into(),
            user: PublicUser::from(updated),
        }),
    ))
}

#[instrument(skip_all)]
pub async fn username(AuthUser(user): AuthUser) -> Json<UserSnapshot> {
    Json(user)
}

#[instrument(skip_all)]
pub async fn list_contacts(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<ContactRow>>, AppError> {
    let rows = state.users.list_contacts().await?;
    info!(caller = %caller.id, count = rows.len(), "contacts listed");
    Ok(Json(rows))
}
