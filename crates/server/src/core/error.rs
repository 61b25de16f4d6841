use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::usage::Tier;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Input
    #[error("{0}")]
    Validation(String),
    #[error("Email already registered")]
    EmailTaken,

    // Auth
    #[error("Authentication required")]
    Unauthenticated,

    // Ownership / lookup
    #[error("{0} not found")]
    NotFound(&'static str),

    // Concurrent write
    #[error("{0}")]
    Conflict(&'static str),

    // Quota
    #[error("Daily limit reached. {tier} users get {limit} requests per day.")]
    QuotaExceeded { limit: i64, tier: Tier },

    // Upstream (LLM / payment provider)
    #[error("{0}")]
    Service(String),

    // Webhook integrity
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::EmailTaken => StatusCode::BAD_REQUEST,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Service(_) => StatusCode::BAD_GATEWAY,
            Error::InvalidSignature | Error::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            Error::QuotaExceeded { limit, tier } => json!({
                "error": self.to_string(),
                "limit": limit,
                "tier": tier,
            }),
            Error::Internal(detail) => {
                error!("Internal error: {}", detail);
                json!({ "error": "Internal server error" })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Internal(format!("database: {}", err))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("serialization: {}", err))
    }
}
