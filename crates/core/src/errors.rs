//! Normalized error taxonomy for backend-facing services.
//!
//! Backend SDK failures are caught at the call site, mapped into one of the
//! variants here, and logged. Stores and controllers do not re-throw them to
//! their callers; a caller that wants retries chains [`crate::retry`]
//! explicitly.

use thiserror::Error;

/// Result type alias for core service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced by repositories and services after normalization.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Transport-level failure (timeout, DNS, connection reset).
    #[error("network error: {0}")]
    Network(String),

    /// The authenticated principal is not allowed to perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A uniqueness or foreign-key constraint rejected the write.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Anything the taxonomy does not distinguish further.
    #[error("{0}")]
    Unknown(String),
}

impl ServiceError {
    /// Stable machine-readable code for logging and toast bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Constraint(_) => "constraint_violation",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Whether retrying the same operation can reasonably succeed.
    ///
    /// Permission and constraint failures are deterministic; only transport
    /// failures qualify for the backoff helper.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_recoverable() {
        assert!(ServiceError::Network("timed out".into()).is_recoverable());
        assert!(!ServiceError::PermissionDenied("rls".into()).is_recoverable());
        assert!(!ServiceError::Constraint("duplicate key".into()).is_recoverable());
        assert!(!ServiceError::Unknown("?".into()).is_recoverable());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ServiceError::Network(String::new()).code(), "network");
        assert_eq!(
            ServiceError::Constraint(String::new()).code(),
            "constraint_violation"
        );
    }
}
