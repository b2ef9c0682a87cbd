//! Error types for reconciliation operations.
//!
//! Every error names the resource kind, the natural key and the operation
//! that failed, so a failure in a batch of hundreds can be traced to one
//! object.

use pbskit::ApiError;
use reconcile::ResourceKind;
use std::collections::BTreeMap;
use std::fmt;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The operation that was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Import,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Import => "import",
            Self::List => "list",
        })
    }
}

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The declaration is incomplete or malformed; nothing was sent.
    Declaration,
    /// The change needs delete + create.
    Replacement,
    /// Another writer changed the object since it was read.
    Conflict,
    /// The object does not exist.
    NotFound,
    /// The server rejected the request.
    Remote,
    /// Transport failure.
    Network,
    /// The caller cancelled the operation.
    Cancelled,
    /// The schema table is inconsistent.
    Schema,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Declaration => "Invalid declared configuration",
            Self::Replacement => "Change requires replacing the resource",
            Self::Conflict => "Concurrent modification detected",
            Self::NotFound => "Resource not found",
            Self::Remote => "Request rejected by the server",
            Self::Network => "Network connectivity issue",
            Self::Cancelled => "Operation cancelled",
            Self::Schema => "Inconsistent schema metadata",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        use pbskit::ErrorCategory as Api;
        use reconcile::ErrorCategory as Core;
        match self {
            Self::Declaration => Core::Declaration.advice(),
            Self::Replacement => Core::Replacement.advice(),
            Self::Schema => Core::Schema.advice(),
            Self::Conflict => Api::Conflict.advice(),
            Self::NotFound => Api::NotFound.advice(),
            Self::Remote => Api::Rejected.advice(),
            Self::Network => Api::Network.advice(),
            Self::Cancelled => Api::Cancelled.advice(),
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// What went wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// A field needed to build the payload is absent.
    #[error("missing required field '{field}'")]
    MissingRequiredField { field: String },

    /// The discriminator names an unknown variant.
    #[error("unsupported variant '{variant}'")]
    UnsupportedVariant { variant: String },

    /// The discriminator is not declared.
    #[error("the '{field}' discriminator is required")]
    MissingDiscriminator { field: String },

    /// The change cannot be applied in place.
    #[error("changing '{field}' requires replacement ({from} -> {to})")]
    RequiresReplacement {
        field: String,
        from: String,
        to: String,
    },

    /// The schema table produced a field that is both set and cleared.
    #[error("field '{field}' is both set and cleared")]
    ContradictoryDelta { field: String },

    /// A declared value does not fit its field.
    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// An import identifier could not be parsed.
    #[error("invalid resource identifier '{0}'")]
    InvalidKey(String),

    /// The version token no longer matches.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// The server rejected a field this schema version sends.
    #[error("server rejected field '{field}': {message}")]
    SchemaIncompatible { field: String, message: String },

    /// The object does not exist.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// The server rejected parameters not taken from the declaration.
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },

    /// The caller cancelled the operation.
    #[error("cancelled")]
    Cancelled,

    /// Any other failure talking to the server.
    #[error(transparent)]
    Transport(ApiError),
}

impl ErrorKind {
    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingRequiredField { .. }
            | Self::UnsupportedVariant { .. }
            | Self::MissingDiscriminator { .. }
            | Self::InvalidValue { .. }
            | Self::InvalidKey(_) => ErrorCategory::Declaration,
            Self::RequiresReplacement { .. } => ErrorCategory::Replacement,
            Self::ContradictoryDelta { .. } => ErrorCategory::Schema,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::SchemaIncompatible { .. } | Self::Validation { .. } => ErrorCategory::Remote,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Transport(e) if e.is_retryable() => ErrorCategory::Network,
            Self::Transport(_) => ErrorCategory::Remote,
        }
    }

    /// Classify a remote failure.
    ///
    /// `sent` holds the wire fields of the request, so a validation error
    /// naming one of them can be reported as a schema mismatch.
    pub fn from_api(err: ApiError, sent: &[&str]) -> Self {
        match err {
            ApiError::Conflict { message } => Self::Conflict { message },
            ApiError::NotFound { message, .. } => Self::NotFound { message },
            ApiError::Cancelled => Self::Cancelled,
            ApiError::Validation { message, fields } => {
                match fields.iter().find(|(field, _)| sent.contains(&field.as_str())) {
                    Some((field, reason)) => Self::SchemaIncompatible {
                        field: field.clone(),
                        message: reason.clone(),
                    },
                    None => Self::Validation { message, fields },
                }
            }
            other => Self::Transport(other),
        }
    }
}

impl From<reconcile::Error> for ErrorKind {
    fn from(err: reconcile::Error) -> Self {
        use reconcile::Error as E;
        match err {
            E::MissingRequiredField { field } => Self::MissingRequiredField { field },
            E::UnsupportedVariant { variant, .. } => Self::UnsupportedVariant { variant },
            E::MissingDiscriminator { field, .. } => Self::MissingDiscriminator { field },
            E::RequiresReplacement { field, from, to } => {
                Self::RequiresReplacement { field, from, to }
            }
            E::ContradictoryDelta { field } => Self::ContradictoryDelta { field },
            E::InvalidValue { field, message } => Self::InvalidValue { field, message },
            E::InvalidKey(key) => Self::InvalidKey(key),
        }
    }
}

impl From<ApiError> for ErrorKind {
    fn from(err: ApiError) -> Self {
        Self::from_api(err, &[])
    }
}

/// A failed operation on one resource instance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} {resource} '{key}': {kind}")]
pub struct Error {
    /// Resource family.
    pub resource: ResourceKind,
    /// Natural key, with variant prefix where applicable.
    pub key: String,
    /// Attempted operation.
    pub operation: Operation,
    /// What went wrong.
    pub kind: ErrorKind,
}

impl Error {
    pub fn new(
        resource: ResourceKind,
        key: impl Into<String>,
        operation: Operation,
        kind: impl Into<ErrorKind>,
    ) -> Self {
        Self {
            resource,
            key: key.into(),
            operation,
            kind: kind.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.category() == ErrorCategory::Conflict
    }

    #[must_use]
    pub fn requires_replacement(&self) -> bool {
        self.category() == ErrorCategory::Replacement
    }
}
