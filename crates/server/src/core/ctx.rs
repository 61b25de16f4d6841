use crate::core::error::{Error, Result};
use axum::{extract::FromRequestParts, http::request::Parts};

/// Authenticated caller, inserted by `mw_require_auth`.
#[derive(Clone, Debug)]
pub struct Ctx {
    user_id: i64,
    session_token: String,
}

impl Ctx {
    pub fn new(user_id: i64, session_token: String) -> Self {
        Self {
            user_id,
            session_token,
        }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn session_token(&self) -> &str {
        &self.session_token
    }
}

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<Ctx>()
            .cloned()
            .ok_or(Error::Unauthenticated)
    }
}
