//! Error types for the hosted-backend client.

use mizan_core::ServiceError;
use thiserror::Error;

/// Result type alias for backend client operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Retry policy class for API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Errors that can occur talking to the hosted backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error response from the backend
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid request (missing required data, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication error (missing or invalid token)
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl BackendError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> ApiRetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                401 | 403 => ApiRetryClass::ReauthRequired,
                408 | 429 => ApiRetryClass::Retryable,
                500..=599 => ApiRetryClass::Retryable,
                _ => ApiRetryClass::Permanent,
            },
            Self::Http(_) => ApiRetryClass::Retryable,
            Self::Json(_) => ApiRetryClass::Permanent,
            Self::InvalidRequest(_) => ApiRetryClass::Permanent,
            Self::Auth(_) => ApiRetryClass::ReauthRequired,
        }
    }
}

fn is_constraint_message(message: &str) -> bool {
    // Postgres unique/foreign-key violation codes surface in the REST body.
    message.contains("23505")
        || message.contains("23503")
        || message.contains("duplicate key")
}

/// Normalize into the core taxonomy consumed by stores and controllers.
impl From<BackendError> for ServiceError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Http(inner) => ServiceError::Network(inner.to_string()),
            BackendError::Auth(message) => ServiceError::PermissionDenied(message),
            BackendError::Api { status, message } => match status {
                401 | 403 => ServiceError::PermissionDenied(message),
                409 => ServiceError::Constraint(message),
                _ if is_constraint_message(&message) => ServiceError::Constraint(message),
                _ => ServiceError::Unknown(message),
            },
            BackendError::Json(inner) => ServiceError::Unknown(inner.to_string()),
            BackendError::InvalidRequest(message) => ServiceError::Unknown(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_class_for_auth_error_is_reauth() {
        let err = BackendError::api(401, "unauthorized");
        assert_eq!(err.retry_class(), ApiRetryClass::ReauthRequired);
    }

    #[test]
    fn retry_class_for_server_errors_is_retryable() {
        assert_eq!(
            BackendError::api(503, "unavailable").retry_class(),
            ApiRetryClass::Retryable
        );
        assert_eq!(
            BackendError::api(400, "bad request").retry_class(),
            ApiRetryClass::Permanent
        );
    }

    #[test]
    fn normalization_maps_into_core_taxonomy() {
        assert_eq!(
            ServiceError::from(BackendError::api(403, "row-level security")),
            ServiceError::PermissionDenied("row-level security".into())
        );
        assert_eq!(
            ServiceError::from(BackendError::api(409, "conflict")),
            ServiceError::Constraint("conflict".into())
        );
        assert_eq!(
            ServiceError::from(BackendError::api(
                400,
                "23505: duplicate key value violates unique constraint"
            )),
            ServiceError::Constraint(
                "23505: duplicate key value violates unique constraint".into()
            )
        );
        assert!(matches!(
            ServiceError::from(BackendError::invalid_request("empty representation")),
            ServiceError::Unknown(_)
        ));
    }
}
