//! Error types for aura-core.

use thiserror::Error;

use crate::auth::Action;

/// Result type alias using aura-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Aura operations
#[derive(Error, Debug)]
pub enum Error {
    // Authorization
    #[error("Access denied: user {user_id} may not {action} project {project_id}")]
    AccessDenied {
        project_id: String,
        user_id: String,
        action: Action,
    },

    // Model / embedding backend errors
    #[error("Backend error{}: {message}", status_suffix(.status))]
    Backend { status: Option<u16>, message: String },

    #[error("Backend returned an empty response")]
    EmptyResponse,

    // Structured output
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Operation failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    // Database errors
    #[cfg(feature = "db")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: String, id: String },

    // Configuration
    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

impl Error {
    /// Create an access denied error
    pub fn access_denied(project_id: impl Into<String>, user_id: impl Into<String>, action: Action) -> Self {
        Self::AccessDenied {
            project_id: project_id.into(),
            user_id: user_id.into(),
            action,
        }
    }

    /// Create a backend error carrying an HTTP-like status code
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a network-level backend error (no status code)
    pub fn network(message: impl Into<String>) -> Self {
        Self::Backend {
            status: None,
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create an already exists error naming the existing entity
    pub fn already_exists(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// HTTP-like status code, if the error carries one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Backend { status, .. } => *status,
            _ => None,
        }
    }

    /// Default retry classification.
    ///
    /// Status 429, 408 and 5xx are transient; any other status fails fast.
    /// Errors without a status (network failures, empty payloads, malformed
    /// output, store hiccups) are retried. Authorization, lookup, duplicate and
    /// configuration errors are never retried, and neither is an already
    /// exhausted retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AccessDenied { .. }
            | Self::NotFound { .. }
            | Self::AlreadyExists { .. }
            | Self::Config(_)
            | Self::RetryExhausted { .. } => false,
            _ => match self.status_code() {
                Some(status) => status == 429 || status == 408 || (500..600).contains(&status),
                None => true,
            },
        }
    }

    /// Check if this error is an authorization failure
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    /// Check if this error rejects a duplicate
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Check if this error is (or was caused by exhausting retries on) a validation failure
    pub fn is_validation_failure(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::RetryExhausted { source, .. } => source.is_validation_failure(),
            _ => false,
        }
    }

    /// Check if this error is a terminal retry exhaustion
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }

    /// Number of attempts made, for a retry exhaustion
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::RetryExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classifier() {
        assert!(Error::backend(429, "rate limited").is_retryable());
        assert!(Error::backend(408, "timeout").is_retryable());
        assert!(Error::backend(500, "boom").is_retryable());
        assert!(Error::backend(503, "unavailable").is_retryable());
        assert!(!Error::backend(400, "bad request").is_retryable());
        assert!(!Error::backend(401, "unauthorized").is_retryable());
        assert!(!Error::backend(403, "forbidden").is_retryable());
        assert!(Error::network("connection reset").is_retryable());
        assert!(Error::EmptyResponse.is_retryable());
        assert!(Error::validation("missing field").is_retryable());
        assert!(!Error::access_denied("p1", "u1", Action::Read).is_retryable());
        assert!(!Error::already_exists("Knowledge source", "k1").is_retryable());
    }

    #[test]
    fn test_exhausted_is_terminal() {
        let err = Error::RetryExhausted {
            attempts: 5,
            source: Box::new(Error::backend(503, "unavailable")),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.attempts(), Some(5));
        assert!(err.to_string().contains("5 attempts"));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_validation_failure_through_exhaustion() {
        let err = Error::RetryExhausted {
            attempts: 3,
            source: Box::new(Error::validation("expected array")),
        };
        assert!(err.is_validation_failure());
        assert!(err.to_string().contains("Validation error"));

        let err = Error::RetryExhausted {
            attempts: 3,
            source: Box::new(Error::network("reset")),
        };
        assert!(!err.is_validation_failure());
    }

    #[test]
    fn test_access_denied_message() {
        let err = Error::access_denied("proj-1", "user-9", Action::Write);
        assert!(err.is_access_denied());
        assert!(err.to_string().contains("proj-1"));
        assert!(err.to_string().contains("write"));
    }
}
