//! Error types for name and identity parsing.

use thiserror::Error;

/// Errors that can occur when parsing or validating names and identities.
///
/// Every variant is a malformed-identity error: the input came from a user
/// and no remote call is attempted with it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("identity cannot be empty")]
    Empty,

    /// The composite identity has no `/` separator.
    #[error("identity missing '/' separator: expected '<mesh>/<name>', got '{0}'")]
    MissingSeparator(String),

    /// One side of the separator is empty.
    #[error("identity has an empty {segment} segment: '{input}'")]
    EmptySegment {
        segment: &'static str,
        input: String,
    },

    /// The composite identity has more than one separator.
    #[error("identity has too many segments: expected '<mesh>/<name>', got '{0}'")]
    TooManySegments(String),

    /// A name segment violates the naming rules.
    #[error("invalid {kind} '{value}': {reason}")]
    InvalidName {
        kind: &'static str,
        value: String,
        reason: String,
    },

    /// The ARN format is invalid.
    #[error("invalid ARN '{value}': {reason}")]
    InvalidArn { value: String, reason: String },
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty)
    }

    /// Returns true if this error concerns the `<mesh>/<name>` layout
    /// rather than the content of a single name.
    pub fn is_layout_error(&self) -> bool {
        matches!(
            self,
            IdError::MissingSeparator(_)
                | IdError::EmptySegment { .. }
                | IdError::TooManySegments(_)
        )
    }
}
