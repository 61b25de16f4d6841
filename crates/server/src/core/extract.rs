//! Request body extraction that answers with the crate's error shape

use axum::extract::{FromRequest, Request};

use crate::core::error::{Error, Result};

/// JSON request body.
///
/// Same as `axum::Json`, except that a missing content type, malformed JSON
/// or a field of the wrong type becomes a 400 [`Error::Validation`] with the
/// usual `{"error": ..}` body.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    axum::Json<T>: FromRequest<S, Rejection = axum::extract::rejection::JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(Error::Validation(rejection.body_text())),
        }
    }
}
