//! Reconciliation core for managed virtual nodes.
//!
//! This library converges a remote virtual node to its desired spec. Key
//! concepts:
//!
//! - **Desired state**: the spec a user declares (`ManagedObject::desired`).
//! - **Observed state**: what the remote system last reported.
//! - **ChangeSet**: the ordered operations separating the two, produced by
//!   the differ.
//! - **Reconciliation pass**: one diff-then-apply for a single object.
//!
//! # Invariants
//!
//! - All passes are idempotent: a converged object issues no remote calls
//! - Diffs are deterministic and independent of set ordering
//! - Invalid specs never reach the remote system
//! - Every failed remote operation is surfaced with the object identity

mod client;
mod diff;
mod error;
mod hash;
mod memory;
mod reconciler;

pub use client::{MeshClient, Operation, RemoteError};
pub use diff::{diff_objects, diff_specs, Change, ChangeKind, ChangeSet};
pub use error::ReconcileError;
pub use hash::SpecHash;
pub use memory::{
    InMemoryMeshClient, RemoteCall, DEFAULT_ACCOUNT_ID, DEFAULT_PARTITION, DEFAULT_REGION,
};
pub use reconciler::{Plan, ReconcileOutcome, Reconciler};
