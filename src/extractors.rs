use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ApiError, AppError};
use crate::request_id::XRequestId;

/// JSON body that rejects with a structured `BAD_REQUEST`.
///
/// The content type is not checked: whatever arrives is parsed as JSON.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let rid = XRequestId::from_headers(req.headers());
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| rid.reject(invalid_body(e.body_text())))?;

        match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => Ok(JsonBody(value)),
            Err(e) => {
                debug!(error = %e, request_id = %rid.0, "rejecting request body");
                Err(rid.reject(invalid_body(e.to_string())))
            }
        }
    }
}

/// Query string that rejects with a structured `BAD_REQUEST`.
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let rid = XRequestId::from_headers(&parts.headers);
        match Query::<T>::try_from_uri(&parts.uri) {
            Ok(Query(value)) => Ok(QueryParams(value)),
            Err(e) => {
                debug!(error = %e, request_id = %rid.0, "rejecting query string");
                Err(rid.reject(AppError::BadRequest {
                    message: "Invalid query string".into(),
                    details: Some(serde_json::json!({ "reason": e.body_text() })),
                }))
            }
        }
    }
}

fn invalid_body(reason: String) -> AppError {
    AppError::BadRequest {
        message: "Invalid request body".into(),
        details: Some(serde_json::json!({ "reason": reason })),
    }
}
