use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, HeaderName},
};
use std::convert::Infallible;

use crate::error::{ApiError, AppError};

pub fn header() -> HeaderName {
    HeaderName::from_static("x-request-id")
}

/// Request id set by `SetRequestIdLayer`, or "n/a" when the layer is absent.
#[derive(Clone, Debug)]
pub struct XRequestId(pub String);

impl XRequestId {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let rid = headers
            .get(header())
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .unwrap_or_else(|| "n/a".to_string());
        Self(rid)
    }

    pub fn reject(&self, error: AppError) -> ApiError {
        ApiError::new(error, self.0.clone())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for XRequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
