use crate::error::{Error, ErrorKind};
use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable machine-readable code, e.g. `not_found`.
    pub error: String,
    pub message: String,
}

#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Locked => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);

        let message = match kind {
            ErrorKind::Internal => {
                error!("Request failed: {self:#}");
                "internal server error".to_string()
            }
            ErrorKind::Unavailable => {
                error!("Store unavailable: {self}");
                "service unavailable".to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorBody {
            error: kind.as_str().to_string(),
            message,
        };
        let mut response = (status, Json(body)).into_response();

        if let Self::Locked {
            retry_after_seconds,
        } = self
        {
            match HeaderValue::from_str(&retry_after_seconds.to_string()) {
                Ok(value) => {
                    response.headers_mut().insert(RETRY_AFTER, value);
                }
                Err(err) => warn!("Failed to build Retry-After header: {err}"),
            }
        }

        response
    }
}
