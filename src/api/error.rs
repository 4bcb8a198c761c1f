use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{core::error::RequestError, prelude::*};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Internal(Error),
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        match error.downcast::<RequestError>() {
            Ok(error) => Self::Request(error),
            Err(error) => Self::Internal(error),
        }
    }
}

impl ApiError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Request(RequestError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            Self::Request(RequestError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            Self::Request(RequestError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            Self::Request(
                RequestError::UserNotFound { .. }
                | RequestError::SiteNotFound(_)
                | RequestError::RegionNotFound(_),
            ) => StatusCode::NOT_FOUND,
            Self::Request(RequestError::CapacityExceeded { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let detail = match &self {
            Self::Request(error) => error.to_string(),
            Self::Internal(error) => {
                error!("request failed: {error:#}");
                "internal server error".to_owned()
            }
        };
        (status_code, Json(json!({ "detail": detail }))).into_response()
    }
}
