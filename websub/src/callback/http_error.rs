//! Callback endpoint errors
use axum::{http::StatusCode, response::IntoResponse};

use crate::errors::{Error, NotificationError, StoreError, VerificationError};

pub(crate) type HttpResult<T, E = HttpError> = core::result::Result<T, E>;

/// An error answered to a hub. Internal details never leave the process.
#[derive(Debug, Clone)]
pub(crate) struct HttpError {
    status: StatusCode,
    detail: Option<String>,
}

impl Default for HttpError {
    fn default() -> Self {
        Self::internal_server()
    }
}

impl HttpError {
    pub fn new(status_code: StatusCode, message: Option<impl ToString>) -> HttpError {
        Self {
            status: status_code,
            detail: message.map(|m| m.to_string()),
        }
    }

    pub fn not_found() -> HttpError {
        Self::new(StatusCode::NOT_FOUND, Some("Not Found"))
    }

    pub fn internal_server() -> HttpError {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, Some("Internal server error"))
    }

    pub fn bad_request(message: impl ToString) -> HttpError {
        Self::new(StatusCode::BAD_REQUEST, Some(message))
    }

    pub fn forbidden() -> HttpError {
        Self::new(StatusCode::FORBIDDEN, Some("Forbidden"))
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        match self.detail {
            Some(detail) => (self.status, detail).into_response(),
            _ => (self.status,).into_response(),
        }
    }
}

impl From<VerificationError> for HttpError {
    fn from(error: VerificationError) -> Self {
        match error {
            VerificationError::NotFound => Self::not_found(),
            VerificationError::NoChallenge
            | VerificationError::InvalidLease(_)
            | VerificationError::UnknownMode(_)
            | VerificationError::MissingTopic => Self::bad_request(error),
            VerificationError::Denied { .. } => {
                tracing::error!(?error, "denial reached the error path");
                Self::internal_server()
            }
        }
    }
}

impl From<NotificationError> for HttpError {
    fn from(error: NotificationError) -> Self {
        match error {
            NotificationError::NotFound => Self::not_found(),
            NotificationError::MissingSignature | NotificationError::InvalidSignature => {
                Self::forbidden()
            }
            NotificationError::Store(error) => error.into(),
        }
    }
}

impl From<StoreError> for HttpError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::not_found(),
            error => {
                tracing::error!(?error);
                Self::internal_server()
            }
        }
    }
}

// === INTERNAL_SERVER_ERROR ===
// Anything else is a failure on our side.

impl From<Error> for HttpError {
    fn from(error: Error) -> Self {
        match error {
            Error::Verification(error) => error.into(),
            Error::Store(error) => error.into(),
            error => {
                tracing::error!(?error);
                Self::internal_server()
            }
        }
    }
}
