//! Reconciliation errors.

use meshform_id::{IdError, ObjectIdentity};
use meshform_model::{Phase, ValidationError};
use thiserror::Error;

use crate::{ChangeSet, Operation, RemoteError};

/// Reconciliation errors. Every variant names the object it concerns.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The desired spec is invalid; nothing was sent to the remote system.
    #[error("{identity}: {source}")]
    Validation {
        identity: ObjectIdentity,
        source: ValidationError,
    },

    /// An import identity could not be parsed.
    #[error("malformed identity '{input}': {source}")]
    MalformedIdentity { input: String, source: IdError },

    /// The remote object does not exist.
    #[error("{identity}: not found")]
    NotFound { identity: ObjectIdentity },

    /// A remote call failed; the object stays in `phase`.
    #[error("{identity}: {operation} failed while {phase}: {source}")]
    Remote {
        identity: ObjectIdentity,
        phase: Phase,
        operation: Operation,
        source: RemoteError,
    },

    /// The old object was deleted but its replacement could not be created.
    /// The object is back in `NotExists`; a retry creates `target`.
    #[error("{target}: replacement incomplete, {deleted} was deleted but create failed: {source}")]
    PartialReplacement {
        deleted: ObjectIdentity,
        target: ObjectIdentity,
        source: RemoteError,
    },

    /// Cancelled before the next remote call; `pending` was not applied.
    #[error("{identity}: cancelled while {phase} with {} change(s) pending", .pending.len())]
    Cancelled {
        identity: ObjectIdentity,
        phase: Phase,
        pending: ChangeSet,
    },
}

impl ReconcileError {
    /// The object this error concerns, when it could be identified.
    pub fn identity(&self) -> Option<&ObjectIdentity> {
        match self {
            ReconcileError::Validation { identity, .. }
            | ReconcileError::NotFound { identity }
            | ReconcileError::Remote { identity, .. }
            | ReconcileError::Cancelled { identity, .. } => Some(identity),
            ReconcileError::PartialReplacement { target, .. } => Some(target),
            ReconcileError::MalformedIdentity { .. } => None,
        }
    }

    /// Returns true if a later pass may succeed without user changes.
    ///
    /// Local validation and malformed identities are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Validation { .. } | ReconcileError::MalformedIdentity { .. } => false,
            ReconcileError::Remote { source, .. }
            | ReconcileError::PartialReplacement { source, .. } => {
                !matches!(source, RemoteError::Validation(_))
            }
            ReconcileError::NotFound { .. } => false,
            ReconcileError::Cancelled { .. } => true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReconcileError::Cancelled { .. })
    }
}
