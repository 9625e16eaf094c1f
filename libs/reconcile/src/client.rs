//! Remote client contract.
//!
//! The reconciler talks to the managed service only through [`MeshClient`].
//! Retries for throttling and other transient failures belong to the client;
//! each call either succeeds or returns a terminal [`RemoteError`].

use std::sync::Arc;

use async_trait::async_trait;
use meshform_id::ObjectIdentity;
use meshform_model::{ObservedState, Spec};
use thiserror::Error;

/// Remote operation, for logging and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Describe,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Describe => "describe",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the remote system.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The object already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The remote system rejected the spec.
    #[error("rejected by remote validation: {0}")]
    Validation(String),

    /// Network or throttling failure that outlived the client's retries.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::Conflict(_))
    }

    /// Returns true if a later pass may succeed without changing the spec.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }
}

/// Describe/create/update/delete against the managed service.
///
/// `update` replaces the whole spec; there is no field-level patch.
#[async_trait]
pub trait MeshClient: Send + Sync {
    async fn describe(&self, identity: &ObjectIdentity) -> Result<ObservedState, RemoteError>;

    async fn create(
        &self,
        identity: &ObjectIdentity,
        spec: &Spec,
    ) -> Result<ObservedState, RemoteError>;

    async fn update(
        &self,
        identity: &ObjectIdentity,
        spec: &Spec,
    ) -> Result<ObservedState, RemoteError>;

    async fn delete(&self, identity: &ObjectIdentity) -> Result<(), RemoteError>;
}

#[async_trait]
impl<T: MeshClient + ?Sized> MeshClient for Arc<T> {
    async fn describe(&self, identity: &ObjectIdentity) -> Result<ObservedState, RemoteError> {
        (**self).describe(identity).await
    }

    async fn create(
        &self,
        identity: &ObjectIdentity,
        spec: &Spec,
    ) -> Result<ObservedState, RemoteError> {
        (**self).create(identity, spec).await
    }

    async fn update(
        &self,
        identity: &ObjectIdentity,
        spec: &Spec,
    ) -> Result<ObservedState, RemoteError> {
        (**self).update(identity, spec).await
    }

    async fn delete(&self, identity: &ObjectIdentity) -> Result<(), RemoteError> {
        (**self).delete(identity).await
    }
}
