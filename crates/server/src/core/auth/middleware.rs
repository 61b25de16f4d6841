use crate::core::auth::session::SESSION_COOKIE;
use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::{Error, Result};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::debug;

pub async fn mw_require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    debug!("MIDDLEWARE: require_auth");

    let credential = bearer_credential(req.headers())
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
        .ok_or(Error::Unauthenticated)?;

    let session = state.auth.validate_session(&credential).await?;

    req.extensions_mut()
        .insert(Ctx::new(session.user_id, session.token));

    Ok(next.run(req).await)
}

/// Format: "Bearer <credential>"
fn bearer_credential(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let credential = value.strip_prefix("Bearer ")?.trim();
    (!credential.is_empty()).then(|| credential.to_string())
}
