//! Error types for remote API calls.
//!
//! Responses are classified into a small set of kinds so callers can tell a
//! missing object from a rejected payload or a lost race, without parsing
//! messages themselves.

use std::collections::BTreeMap;
use std::fmt;

/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Message fragment the server uses when a digest no longer matches.
pub const MODIFIED_CONFIGURATION: &str = "detected modified configuration";

/// Categories of API errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credentials missing or rejected.
    Auth,
    /// The addressed object does not exist.
    NotFound,
    /// The object changed since it was read.
    Conflict,
    /// The server rejected one or more parameters.
    Validation,
    /// Any other client error status; repeating the request will not help.
    Rejected,
    /// Transport failure, server error or throttling (transient, retryable).
    Network,
    /// The response could not be understood.
    Format,
    /// The caller cancelled the operation.
    Cancelled,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    ///
    /// Conflicts are not: retrying blindly would overwrite another writer.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Auth => "Authentication failed",
            Self::NotFound => "Object not found",
            Self::Conflict => "Concurrent modification",
            Self::Validation => "Rejected parameters",
            Self::Rejected => "Request rejected by the server",
            Self::Network => "Network connectivity issue",
            Self::Format => "Invalid API response",
            Self::Cancelled => "Operation cancelled",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Auth => "Check the API token and its privileges",
            Self::NotFound => "Refresh state; the object may have been removed outside this tool",
            Self::Conflict => "Read the object again and re-apply the change",
            Self::Validation => "Check the rejected fields against the server version",
            Self::Rejected => "Fix the request or the server-side state it collides with",
            Self::Network => "Check connectivity to the server and try again",
            Self::Format => "The server may be running an unsupported version",
            Self::Cancelled => "Run the operation again",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors returned by [`crate::Api`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Credentials missing or rejected.
    #[error("authentication failed (HTTP {status}): {message}")]
    Auth {
        /// HTTP status code.
        status: u16,
        /// Server message.
        message: String,
    },

    /// The addressed object does not exist.
    #[error("{path} not found: {message}")]
    NotFound {
        /// Request path.
        path: String,
        /// Server message.
        message: String,
    },

    /// The version token no longer matches the server's.
    #[error("conflict: {message}")]
    Conflict {
        /// Server message.
        message: String,
    },

    /// Parameter verification failed.
    #[error("validation failed: {message}")]
    Validation {
        /// Server message.
        message: String,
        /// Wire field name -> reason.
        fields: BTreeMap<String, String>,
    },

    /// Any other HTTP or transport failure.
    #[error("HTTP request failed: {message}")]
    Http {
        /// HTTP status code if available.
        status: Option<u16>,
        /// Error message.
        message: String,
    },

    /// The response body could not be parsed.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// A request URL could not be built.
    #[error("invalid request path: {0}")]
    InvalidPath(String),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
}

impl ApiError {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Create a conflict error with the server's usual wording.
    pub fn conflict() -> Self {
        Self::Conflict {
            message: format!("{MODIFIED_CONFIGURATION} - file changed by other user? Try again."),
        }
    }

    /// Classify a non-success response.
    ///
    /// The body is the server's JSON error document when available,
    /// otherwise plain text.
    pub fn from_response(status: u16, path: &str, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|v| v.get("message"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or(body)
            .trim()
            .to_string();
        let fields = parsed
            .as_ref()
            .and_then(|v| v.get("errors"))
            .map(error_fields)
            .unwrap_or_default();
        let lower = message.to_lowercase();

        if status == 409 || lower.contains(MODIFIED_CONFIGURATION) {
            Self::Conflict { message }
        } else if status == 401 || status == 403 {
            Self::Auth { status, message }
        } else if status == 404 || lower.contains("does not exist") || lower.contains("no such") {
            Self::NotFound {
                path: path.to_string(),
                message,
            }
        } else if status == 400 && !fields.is_empty() {
            Self::Validation { message, fields }
        } else {
            Self::Http {
                status: Some(status),
                message: format!("HTTP {status}: {message}"),
            }
        }
    }

    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Auth { .. } => ErrorCategory::Auth,
            ApiError::NotFound { .. } => ErrorCategory::NotFound,
            ApiError::Conflict { .. } => ErrorCategory::Conflict,
            ApiError::Validation { .. } => ErrorCategory::Validation,
            ApiError::Http { status, .. } => match status {
                Some(code) if is_transient_status(*code) => ErrorCategory::Network,
                Some(_) => ErrorCategory::Rejected,
                None => ErrorCategory::Network,
            },
            ApiError::InvalidResponse(_) | ApiError::InvalidPath(_) => ErrorCategory::Format,
            ApiError::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether the addressed object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }
}

/// Server errors and throttling; other statuses are final.
fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

/// Flatten the server's `errors` member into field -> reason.
pub(crate) fn error_fields(errors: &serde_json::Value) -> BTreeMap<String, String> {
    match errors {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let reason = v.as_str().map_or_else(|| v.to_string(), str::to_string);
                (k.clone(), reason.trim().to_string())
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(!ErrorCategory::Conflict.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Validation.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::Cancelled.is_retryable());
    }

    #[test]
    fn test_error_category_advice() {
        assert!(!ErrorCategory::Conflict.advice().is_empty());
        assert!(!ErrorCategory::Validation.advice().is_empty());
        assert!(format!("{}", ErrorCategory::Network).contains("Network"));
    }

    #[test]
    fn test_classify_digest_mismatch() {
        let body = r#"{"data":null,"message":"detected modified configuration - file changed by other user? Try again.\n"}"#;
        let err = ApiError::from_response(400, "/config/remote/r1", body);
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert!(!err.is_retryable());

        let err = ApiError::from_response(409, "/config/remote/r1", "");
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_classify_not_found() {
        let err = ApiError::from_response(404, "/config/remote/r1", "");
        assert!(err.is_not_found());

        let body = r#"{"data":null,"message":"remote 'r1' does not exist.\n"}"#;
        let err = ApiError::from_response(500, "/config/remote/r1", body);
        assert!(err.is_not_found());
        assert!(err.to_string().contains("/config/remote/r1"));
    }

    #[test]
    fn test_classify_validation() {
        let body = r#"{"data":null,"message":"parameter verification errors\n","errors":{"verify-tls":"schema does not allow additional properties."}}"#;
        match ApiError::from_response(400, "/config/metrics/influxdb-http/m", body) {
            ApiError::Validation { fields, .. } => {
                assert_eq!(
                    fields.get("verify-tls").map(String::as_str),
                    Some("schema does not allow additional properties.")
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_auth_and_other() {
        assert_eq!(
            ApiError::from_response(401, "/", "no ticket").category(),
            ErrorCategory::Auth
        );
        let err = ApiError::from_response(500, "/", "boom");
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        let body = r#"{"data":null,"message":"'dup' already exists\n"}"#;
        let err = ApiError::from_response(400, "/config/remote", body);
        assert_eq!(err.category(), ErrorCategory::Rejected);
        assert!(!err.is_retryable());

        assert!(!ApiError::http("gone", Some(410)).is_retryable());
        assert!(ApiError::http("slow down", Some(429)).is_retryable());
        assert!(ApiError::http("unavailable", Some(503)).is_retryable());
        assert!(ApiError::http("connection reset", None).is_retryable());
    }

    #[test]
    fn test_conflict_message() {
        assert!(ApiError::conflict().to_string().contains(MODIFIED_CONFIGURATION));
    }

    #[test]
    fn test_from_serde_error() {
        let err: ApiError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.category(), ErrorCategory::Format);
    }
}
