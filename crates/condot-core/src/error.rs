//! Error types for CONDOT.

use thiserror::Error;

/// Result type alias using CONDOT's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// SQLSTATE raised by PostgreSQL when row-level security or grants reject access.
const PG_INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Core error type for CONDOT operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Store rejected the read or write for the current principal
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Document store failure other than a permission rejection
    #[error("Store error: {0}")]
    Store(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model output did not match the declared schema
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// No signed-in principal
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not authorized)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for store rejections that should switch a session to offline mode.
    ///
    /// Covers the explicit variant and PostgreSQL `insufficient_privilege`.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Error::PermissionDenied(_) => true,
            Error::Database(sqlx::Error::Database(db)) => {
                db.code().as_deref() == Some(PG_INSUFFICIENT_PRIVILEGE)
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

// =============================================================================
// IDENTITY PROVIDER ERRORS
// =============================================================================

/// Failure codes reported by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorCode {
    /// The sign-in method is disabled for this deployment.
    OperationNotAllowed,
    /// The OAuth redirect domain is not on the provider's allow list.
    UnauthorizedDomain,
    /// Wrong email/password combination.
    InvalidCredential,
    /// Sign-up with an email that already has an account.
    EmailAlreadyInUse,
    /// Password rejected by the provider's policy.
    WeakPassword,
    /// No account for the given email.
    UserNotFound,
    /// A required field was empty; rejected before any provider call.
    MissingField,
    /// Provider unreachable.
    Network,
    /// Anything else.
    Other,
}

impl AuthErrorCode {
    /// Provider-style code string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OperationNotAllowed => "auth/operation-not-allowed",
            Self::UnauthorizedDomain => "auth/unauthorized-domain",
            Self::InvalidCredential => "auth/invalid-credential",
            Self::EmailAlreadyInUse => "auth/email-already-in-use",
            Self::WeakPassword => "auth/weak-password",
            Self::UserNotFound => "auth/user-not-found",
            Self::MissingField => "auth/missing-field",
            Self::Network => "auth/network-request-failed",
            Self::Other => "auth/internal-error",
        }
    }

    /// Codes that mean "this sign-in method is unavailable here" rather than
    /// "the user got something wrong". These switch to a local demo identity.
    pub fn allows_demo_fallback(&self) -> bool {
        matches!(self, Self::OperationNotAllowed | Self::UnauthorizedDomain)
    }
}

/// Error returned by an [`IdentityProvider`](crate::IdentityProvider) call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({})", code.as_str())]
pub struct AuthError {
    pub code: AuthErrorCode,
    pub message: String,
}

impl AuthError {
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("card mock-1".to_string());
        assert_eq!(err.to_string(), "Not found: card mock-1");
    }

    #[test]
    fn test_error_display_permission_denied() {
        let err = Error::PermissionDenied("artifacts/app/users/u1/experiences".to_string());
        assert_eq!(
            err.to_string(),
            "Permission denied: artifacts/app/users/u1/experiences"
        );
    }

    #[test]
    fn test_error_display_schema_violation() {
        let err = Error::SchemaViolation("unknown variant `운동`".to_string());
        assert_eq!(err.to_string(), "Schema violation: unknown variant `운동`");
    }

    #[test]
    fn test_error_display_forbidden() {
        let err = Error::Forbidden("admin only".to_string());
        assert_eq!(err.to_string(), "Forbidden: admin only");
    }

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(ref msg) if !msg.is_empty()));
    }

    #[test]
    fn test_permission_denied_detection() {
        assert!(Error::PermissionDenied("x".into()).is_permission_denied());
        assert!(!Error::Store("timeout".into()).is_permission_denied());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_permission_denied());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
        assert_send::<AuthError>();
    }

    #[test]
    fn test_auth_error_display_includes_code() {
        let err = AuthError::new(AuthErrorCode::InvalidCredential, "wrong password");
        assert_eq!(
            err.to_string(),
            "wrong password (auth/invalid-credential)"
        );
    }

    #[test]
    fn test_demo_fallback_codes() {
        assert!(AuthErrorCode::OperationNotAllowed.allows_demo_fallback());
        assert!(AuthErrorCode::UnauthorizedDomain.allows_demo_fallback());
        assert!(!AuthErrorCode::InvalidCredential.allows_demo_fallback());
        assert!(!AuthErrorCode::Network.allows_demo_fallback());
    }
}
