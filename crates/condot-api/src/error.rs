//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use condot_core::{AuthError, AuthErrorCode, Error};
use condot_session::ConversationError;

/// Error returned by every handler, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Internal(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    /// The generation backend failed or answered outside its schema.
    BadGateway(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::Forbidden(msg) | Error::PermissionDenied(msg) => ApiError::Forbidden(msg),
            Error::Inference(msg) | Error::SchemaViolation(msg) | Error::Request(msg) => {
                ApiError::BadGateway(msg)
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err.code {
            AuthErrorCode::MissingField | AuthErrorCode::WeakPassword => {
                ApiError::BadRequest(message)
            }
            AuthErrorCode::InvalidCredential | AuthErrorCode::UserNotFound => {
                ApiError::Unauthorized(message)
            }
            AuthErrorCode::EmailAlreadyInUse => ApiError::Conflict(message),
            AuthErrorCode::OperationNotAllowed | AuthErrorCode::UnauthorizedDomain => {
                ApiError::Forbidden(message)
            }
            AuthErrorCode::Network => ApiError::BadGateway(message),
            AuthErrorCode::Other => ApiError::Internal(message),
        }
    }
}

impl From<ConversationError> for ApiError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::EmptyUtterance => ApiError::BadRequest(err.to_string()),
            ConversationError::Busy
            | ConversationError::ManualEditingActive
            | ConversationError::NoActiveDraft
            | ConversationError::NotEditing => ApiError::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(msg) => {
                tracing::warn!(
                    subsystem = "api",
                    error = %msg,
                    "Request failed with internal error"
                );
                msg
            }
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::BadGateway(msg) => msg,
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_statuses() {
        assert_eq!(
            ApiError::from(Error::InvalidInput("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(Error::PermissionDenied("x".into())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(Error::SchemaViolation("x".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(Error::Store("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_error_statuses() {
        let missing = AuthError::new(AuthErrorCode::MissingField, "email is required");
        assert_eq!(ApiError::from(missing).status(), StatusCode::BAD_REQUEST);
        let taken = AuthError::new(AuthErrorCode::EmailAlreadyInUse, "taken");
        assert_eq!(ApiError::from(taken).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_conversation_error_statuses() {
        assert_eq!(
            ApiError::from(ConversationError::EmptyUtterance).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ConversationError::ManualEditingActive).status(),
            StatusCode::CONFLICT
        );
    }
}
