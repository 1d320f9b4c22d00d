use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use customers_core::{ErrorKind, InterfaceError, ServiceError};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Transport-side failure: one taxonomy kind plus a correlation id for log lookup.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    correlation_id: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self(InterfaceError::new(kind, message).with_correlation_id(Uuid::new_v4().to_string()))
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadInput, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.0.kind
    }

    pub fn status(&self) -> StatusCode {
        match self.0.kind {
            ErrorKind::BadInput => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::UnsupportedMedia => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        Self(value.into_interface(Uuid::new_v4().to_string()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        match value {
            JsonRejection::MissingJsonContentType(_) => {
                Self::new(ErrorKind::UnsupportedMedia, value.body_text())
            }
            other => Self::bad_input(other.body_text()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(value: PathRejection) -> Self {
        Self::bad_input(value.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        Self::bad_input(value.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let interface = self.0;

        match interface.kind {
            ErrorKind::Internal => error!(
                event_name = "api.error.internal",
                correlation_id = %interface.correlation_id,
                status = status.as_u16(),
                error = %interface.message,
                "request failed unexpectedly"
            ),
            ErrorKind::Unauthorized => warn!(
                event_name = "api.error.unauthorized",
                correlation_id = %interface.correlation_id,
                status = status.as_u16(),
                error = %interface.message,
                "request denied"
            ),
            kind => info!(
                event_name = "api.error.client",
                correlation_id = %interface.correlation_id,
                status = status.as_u16(),
                kind = kind.as_str(),
                error = %interface.message,
                "request rejected"
            ),
        }

        let body = ErrorBody {
            error: interface.kind.as_str(),
            message: interface.user_message(),
            correlation_id: interface.correlation_id,
        };
        (status, Json(body)).into_response()
    }
}
