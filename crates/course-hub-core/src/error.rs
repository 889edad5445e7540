//! Error types for the course hub domain.

use crate::ids::IdError;

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

/// Errors raised while validating or transforming domain values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// A field failed validation.
    #[error("{field}: {message}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable reason.
        message: String,
    },

    /// The course has no price, so it cannot be sold.
    #[error("course has no price set")]
    PriceNotSet,

    /// A monetary amount does not fit the provider's minor-unit range.
    #[error("amount out of range: {0}")]
    AmountOutOfRange(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl DomainError {
    /// Shorthand for a field validation failure.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}
