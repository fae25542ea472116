//! # HTTP Errors
//!
//! Maps [`EupravaError`] onto status codes. Every error body is
//! `{"message": ...}`; a document rejection adds a machine-readable
//! `rejection` object.
//!
//! | error                                              | status |
//! |----------------------------------------------------|--------|
//! | `InvalidRequest`                                   | 400    |
//! | `NotFound`, `ChannelNotFound`                      | 404    |
//! | `AlreadyFiled`, `Conflict`, `AlreadySettled`       | 403    |
//! | `DocumentRejected`                                 | 403    |
//! | `UpstreamRejected`                                 | 502    |
//! | `Unavailable`                                      | 503    |
//! | `Cancelled`                                        | 504    |
//! | `Storage`, `Serialization`, `Config`               | 500    |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use euprava_core::{DocumentRejection, EupravaError};
use serde::{Deserialize, Serialize};

/// Error returned by handlers and middleware.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    rejection: Option<DocumentRejection>,
}

/// JSON body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<DocumentRejection>,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            rejection: None,
        }
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<EupravaError> for ApiError {
    fn from(e: EupravaError) -> Self {
        let status = match &e {
            EupravaError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            EupravaError::NotFound { .. } | EupravaError::ChannelNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            EupravaError::AlreadyFiled(_)
            | EupravaError::Conflict(_)
            | EupravaError::AlreadySettled(_)
            | EupravaError::DocumentRejected(_) => StatusCode::FORBIDDEN,
            EupravaError::UpstreamRejected(_) => StatusCode::BAD_GATEWAY,
            EupravaError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EupravaError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
            EupravaError::Storage(_) | EupravaError::Serialization(_) | EupravaError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let rejection = match &e {
            EupravaError::DocumentRejected(rejection) => Some(*rejection),
            _ => None,
        };
        Self {
            status,
            message: e.to_string(),
            rejection,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = self.status.as_u16(), "{}", self.message);
        }
        let body = ErrorBody {
            message: self.message,
            rejection: self.rejection,
        };
        (self.status, Json(body)).into_response()
    }
}

// =============================================================================
// TESTS
// =============================================================================
