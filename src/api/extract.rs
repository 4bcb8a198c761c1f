use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Query},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::{
    api::{AppState, error::ApiError},
    core::error::RequestError,
};

/// Verified email of the caller.
///
/// Taken from the header set by the authenticating proxy, or the configured dummy email.
/// Every extraction is recorded as an API call.
#[derive(Clone, Debug)]
pub struct Caller(pub String);

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let email = parts
            .headers
            .get(&state.identity.email_header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(ToOwned::to_owned)
            .or_else(|| state.identity.dummy_email.clone())
            .ok_or(RequestError::Unauthenticated)?;
        state.store.record_api_call(parts.uri.path(), &email).await?;
        Ok(Self(email))
    }
}

/// [`Query`] which rejects with [`RequestError::InvalidArgument`].
pub struct ValidQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| RequestError::InvalidArgument(rejection.body_text()))?;
        Ok(Self(query))
    }
}

/// [`Path`] which rejects with [`RequestError::InvalidArgument`].
pub struct ValidPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(path) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| RequestError::InvalidArgument(rejection.body_text()))?;
        Ok(Self(path))
    }
}
