//! Auth handlers

use crate::core::auth::session::SESSION_COOKIE;
use crate::core::auth::{Session, User};
use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::Result;
use crate::core::extract::JsonBody;
use axum::{extract::State, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Public user info (no sensitive data)
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub email: String,
    pub is_premium: bool,
    pub premium_until: Option<DateTime<Utc>>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            is_premium: user.is_premium,
            premium_until: user.premium_until,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn session_cookie(credential: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, credential))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn establish(
    state: &AppState,
    jar: CookieJar,
    message: &'static str,
    user: &User,
    session: &Session,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let credential = state.auth.credential(session)?;
    let jar = jar.add(session_cookie(credential.clone()));
    Ok((
        jar,
        Json(AuthResponse {
            message,
            token: credential,
            user: user.into(),
        }),
    ))
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(req): JsonBody<CredentialsRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    info!("POST /register");

    let (user, session) = state.auth.register(&req.email, &req.password).await?;

    establish(&state, jar, "Registration successful", &user, &session)
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(req): JsonBody<CredentialsRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    info!("POST /login");

    let (user, session) = state.auth.login(&req.email, &req.password).await?;

    establish(&state, jar, "Login successful", &user, &session)
}

/// POST /logout
pub async fn logout(
    State(state): State<AppState>,
    ctx: Ctx,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>)> {
    info!("POST /logout - user {}", ctx.user_id());

    state.auth.logout(ctx.session_token()).await?;

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((
        jar,
        Json(MessageResponse {
            message: "Logged out successfully",
        }),
    ))
}
