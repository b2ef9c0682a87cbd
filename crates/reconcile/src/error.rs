//! Error types for the reconciliation core.
//!
//! Every error here is raised before any remote call is made, so none of
//! them is worth retrying: the declaration or the schema table has to change.

use std::fmt;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The declaration is incomplete or malformed.
    Declaration,
    /// The change cannot be applied in place.
    Replacement,
    /// The schema metadata is inconsistent (a programming error).
    Schema,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Declaration => "Invalid declared configuration",
            Self::Replacement => "Change requires replacing the resource",
            Self::Schema => "Inconsistent schema metadata",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Declaration => "Check the resource configuration for missing or mistyped fields",
            Self::Replacement => "Delete the resource and create it again with the new settings",
            Self::Schema => "Report this issue; the field table for this resource is inconsistent",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors raised by the field codec, delta computer and dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A field needed to build the wire payload is absent.
    #[error("missing required field '{field}'")]
    MissingRequiredField {
        /// Logical name of the canonical field.
        field: String,
    },

    /// The discriminator names a variant this family does not know.
    #[error("unsupported {kind} variant '{variant}'")]
    UnsupportedVariant {
        /// Resource family.
        kind: String,
        /// Offending discriminator value.
        variant: String,
    },

    /// The discriminator field is absent from the declaration.
    #[error("{kind} requires the '{field}' discriminator")]
    MissingDiscriminator {
        /// Resource family.
        kind: String,
        /// Logical name of the discriminator.
        field: String,
    },

    /// The change cannot be applied as an in-place update.
    #[error("changing '{field}' requires replacement ({from} -> {to})")]
    RequiresReplacement {
        /// Logical field whose change forces replacement.
        field: String,
        /// Previous value.
        from: String,
        /// Requested value.
        to: String,
    },

    /// A wire field ended up both set and cleared in one pass.
    #[error("field '{field}' is both set and cleared in one update")]
    ContradictoryDelta {
        /// Wire name of the field.
        field: String,
    },

    /// A value does not fit the field's type.
    #[error("invalid value for '{field}': {message}")]
    InvalidValue {
        /// Logical field name.
        field: String,
        /// What was wrong.
        message: String,
    },

    /// A resource key could not be parsed.
    #[error("invalid resource key '{0}'")]
    InvalidKey(String),
}

impl Error {
    /// Create an invalid-value error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a missing-field error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MissingRequiredField { .. }
            | Error::UnsupportedVariant { .. }
            | Error::MissingDiscriminator { .. }
            | Error::InvalidValue { .. }
            | Error::InvalidKey(_) => ErrorCategory::Declaration,
            Error::RequiresReplacement { .. } => ErrorCategory::Replacement,
            Error::ContradictoryDelta { .. } => ErrorCategory::Schema,
        }
    }

    /// Whether this error means the resource must be deleted and recreated.
    #[must_use]
    pub fn requires_replacement(&self) -> bool {
        self.category() == ErrorCategory::Replacement
    }
}
