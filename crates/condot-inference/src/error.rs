//! Typed classifier failures.

use condot_core::Error;

/// Why a classifier call produced no usable card.
///
/// The conversation branches on this; none of these leave a partial card behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    /// Network or backend error before any output was produced.
    #[error("backend call failed: {0}")]
    Backend(String),

    /// The model answered with nothing.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// The answer was not JSON.
    #[error("model response is not valid JSON: {0}")]
    MalformedJson(String),

    /// The answer was JSON but did not match the output schema.
    #[error("model response violates the output schema: {0}")]
    SchemaViolation(String),
}

impl From<Error> for ClassifyError {
    fn from(e: Error) -> Self {
        match e {
            Error::SchemaViolation(msg) => ClassifyError::SchemaViolation(msg),
            other => ClassifyError::Backend(other.to_string()),
        }
    }
}

impl From<ClassifyError> for Error {
    fn from(e: ClassifyError) -> Self {
        match e {
            ClassifyError::SchemaViolation(msg) => Error::SchemaViolation(msg),
            other => Error::Inference(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_maps_to_backend() {
        let err: ClassifyError = Error::Request("connection refused".into()).into();
        assert!(matches!(err, ClassifyError::Backend(ref m) if m.contains("connection refused")));
    }

    #[test]
    fn test_schema_violation_roundtrip() {
        let core: Error = ClassifyError::SchemaViolation("category".into()).into();
        assert!(matches!(core, Error::SchemaViolation(_)));
        let back: ClassifyError = core.into();
        assert_eq!(back, ClassifyError::SchemaViolation("category".into()));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ClassifyError::EmptyResponse.to_string(),
            "model returned an empty response"
        );
    }
}
