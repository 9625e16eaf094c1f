//! Reconciler: drives a managed object toward its desired spec.
//!
//! ```text
//! NotExists -> Creating -> Active -> Updating -> Active ... -> Deleting -> NotExists
//! ```
//!
//! The reconciler holds no per-object state; everything lives in the
//! `ManagedObject` passed to each call. Callers serialize passes per
//! identity; distinct objects may be reconciled concurrently through one
//! shared reconciler.

use std::future::Future;
use std::pin::Pin;

use meshform_id::{ObjectIdentity, ResourceArn};
use meshform_model::{ManagedObject, ObservedState, Phase, Spec};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::{
    diff_objects, diff_specs, ChangeSet, MeshClient, Operation, ReconcileError, RemoteError,
    SpecHash,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a reconciliation pass would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Nothing exists remotely; create with the full spec.
    Create(ChangeSet),

    /// Replace the remote spec in one update call.
    Update(ChangeSet),

    /// Delete the remote object, then create it under the new identity.
    Replace(ChangeSet),

    /// Converged.
    Unchanged,
}

impl Plan {
    pub fn changes(&self) -> Option<&ChangeSet> {
        match self {
            Plan::Create(c) | Plan::Update(c) | Plan::Replace(c) => Some(c),
            Plan::Unchanged => None,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Plan::Create(_) => "create",
            Plan::Update(_) => "update",
            Plan::Replace(_) => "replace",
            Plan::Unchanged => "none",
        }
    }
}

/// Result of a successful operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created { arn: ResourceArn },

    /// Create hit an existing object, which was read back and adopted
    /// (and updated when it differed).
    Adopted { arn: ResourceArn, updated: bool },

    Updated { changes: ChangeSet },
    Unchanged,
    Replaced {
        previous: ObjectIdentity,
        arn: ResourceArn,
    },
    Deleted,

    /// Delete found nothing to delete.
    AlreadyAbsent,

    /// Re-read the remote; `drift` is how it moved since the last read.
    Refreshed { drift: ChangeSet },

    /// The remote object disappeared out of band.
    Vanished,
}

/// Converges managed objects through a [`MeshClient`].
pub struct Reconciler<C> {
    client: C,
    cancel: Option<watch::Receiver<bool>>,
}

impl<C: MeshClient> Reconciler<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            cancel: None,
        }
    }

    /// Abort before the next remote call once `cancel` reads `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Called before every remote call.
    fn checkpoint(
        &self,
        object: &ManagedObject,
        pending: &ChangeSet,
    ) -> Result<(), ReconcileError> {
        if !self.is_cancelled() {
            return Ok(());
        }
        warn!(
            identity = %object.identity(),
            phase = %object.phase(),
            pending = pending.len(),
            "Reconciliation cancelled"
        );
        Err(ReconcileError::Cancelled {
            identity: object.identity().clone(),
            phase: object.phase(),
            pending: pending.clone(),
        })
    }

    /// Compute what `reconcile` would do, without remote calls.
    pub fn plan(&self, object: &ManagedObject) -> Result<Plan, ReconcileError> {
        validate(object)?;

        let Some(observed) = object.observed() else {
            return Ok(Plan::Create(diff_specs(object.desired(), &Spec::default())));
        };

        let changes = diff_objects(object.identity(), object.desired(), observed);
        Ok(if changes.is_empty() {
            Plan::Unchanged
        } else if changes.requires_replacement() {
            Plan::Replace(changes)
        } else {
            Plan::Update(changes)
        })
    }

    /// Run one reconciliation pass.
    #[instrument(
        skip(self, object),
        fields(identity = %object.identity(), phase = %object.phase())
    )]
    pub async fn reconcile(
        &self,
        object: &mut ManagedObject,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match self.plan(object)? {
            Plan::Unchanged => {
                debug!("Object converged, no remote call");
                object.transition(Phase::Active);
                Ok(ReconcileOutcome::Unchanged)
            }
            Plan::Create(pending) => self.create(object, &pending).await,
            Plan::Update(changes) => self.update(object, changes).await,
            Plan::Replace(changes) => self.replace(object, changes).await,
        }
    }

    async fn create(
        &self,
        object: &mut ManagedObject,
        pending: &ChangeSet,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match self.send_create(object, pending).await? {
            Ok(arn) => Ok(ReconcileOutcome::Created { arn }),
            Err(RemoteError::Conflict(message)) => {
                warn!(
                    identity = %object.identity(),
                    message = %message,
                    "Virtual node already exists, adopting"
                );
                self.adopt(object, pending).await
            }
            Err(source) => Err(create_failed(object, source)),
        }
    }

    /// `create` reached from `update`. create -> adopt -> update recurses,
    /// so this future is boxed behind a named type.
    fn recreate<'a>(
        &'a self,
        object: &'a mut ManagedObject,
        pending: &'a ChangeSet,
    ) -> BoxFuture<'a, Result<ReconcileOutcome, ReconcileError>> {
        Box::pin(self.create(object, pending))
    }

    /// Issue the create call. Remote failures are handed back unmapped so
    /// callers decide how to recover.
    async fn send_create(
        &self,
        object: &mut ManagedObject,
        pending: &ChangeSet,
    ) -> Result<Result<ResourceArn, RemoteError>, ReconcileError> {
        self.checkpoint(object, pending)?;

        let identity = object.identity().clone();
        let spec_hash = SpecHash::of(object.desired());
        object.transition(Phase::Creating);

        match self.client.create(&identity, object.desired()).await {
            Ok(observed) => {
                let arn = observed.metadata.arn.clone();
                object.record_observed(observed);
                info!(
                    identity = %identity,
                    arn = %arn,
                    spec_hash = %spec_hash,
                    "Created virtual node"
                );
                Ok(Ok(arn))
            }
            Err(source) => {
                object.transition(Phase::NotExists);
                Ok(Err(source))
            }
        }
    }

    /// Recover from a create conflict by reading the existing object.
    async fn adopt(
        &self,
        object: &mut ManagedObject,
        pending: &ChangeSet,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.checkpoint(object, pending)?;

        let identity = object.identity().clone();
        let observed = self
            .client
            .describe(&identity)
            .await
            .map_err(|source| ReconcileError::Remote {
                identity: identity.clone(),
                phase: Phase::NotExists,
                operation: Operation::Describe,
                source,
            })?;

        let arn = observed.metadata.arn.clone();
        let changes = diff_objects(&identity, object.desired(), &observed);
        object.record_observed(observed);

        if changes.is_empty() {
            return Ok(ReconcileOutcome::Adopted {
                arn,
                updated: false,
            });
        }

        self.update(object, changes).await?;
        Ok(ReconcileOutcome::Adopted { arn, updated: true })
    }

    async fn update(
        &self,
        object: &mut ManagedObject,
        changes: ChangeSet,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.checkpoint(object, &changes)?;

        let identity = object.identity().clone();
        let spec_hash = SpecHash::of(object.desired());
        object.transition(Phase::Updating);

        match self.client.update(&identity, object.desired()).await {
            Ok(observed) => {
                object.record_observed(observed);
                info!(
                    identity = %identity,
                    spec_hash = %spec_hash,
                    changes = changes.len(),
                    summary = %changes.summary(),
                    "Updated virtual node"
                );
                Ok(ReconcileOutcome::Updated { changes })
            }
            Err(RemoteError::NotFound(_)) => {
                warn!(identity = %identity, "Virtual node vanished before update, re-creating");
                object.mark_absent();
                let pending = diff_specs(object.desired(), &Spec::default());
                self.recreate(object, &pending).await
            }
            Err(source) => {
                object.transition(Phase::Active);
                Err(ReconcileError::Remote {
                    identity,
                    phase: Phase::Active,
                    operation: Operation::Update,
                    source,
                })
            }
        }
    }

    /// Delete the old object, then create the new one. Not atomic.
    async fn replace(
        &self,
        object: &mut ManagedObject,
        changes: ChangeSet,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.checkpoint(object, &changes)?;

        let target = object.identity().clone();
        let previous = match object.observed() {
            Some(observed) => observed.identity.clone(),
            None => target.clone(),
        };
        info!(previous = %previous, target = %target, "Replacing virtual node");

        object.transition(Phase::Deleting);
        match self.client.delete(&previous).await {
            Ok(()) => {}
            Err(RemoteError::NotFound(_)) => {
                debug!(previous = %previous, "Old virtual node already gone");
            }
            Err(source) => {
                object.transition(Phase::Active);
                return Err(ReconcileError::Remote {
                    identity: previous,
                    phase: Phase::Active,
                    operation: Operation::Delete,
                    source,
                });
            }
        }
        object.mark_absent();

        // Only a failed create leaves the replacement half done. Once the
        // target is adopted, its errors are ordinary errors on an active object.
        let pending = diff_specs(object.desired(), &Spec::default());
        let arn = match self.send_create(object, &pending).await? {
            Ok(arn) => arn,
            Err(RemoteError::Conflict(message)) => {
                warn!(
                    target = %target,
                    message = %message,
                    "Replacement target already exists, adopting"
                );
                match self.adopt(object, &pending).await? {
                    ReconcileOutcome::Adopted { arn, .. } => arn,
                    other => return Ok(other),
                }
            }
            Err(source) => {
                warn!(
                    previous = %previous,
                    target = %target,
                    error = %source,
                    "Replacement incomplete"
                );
                return Err(ReconcileError::PartialReplacement {
                    deleted: previous,
                    target,
                    source,
                });
            }
        };
        Ok(ReconcileOutcome::Replaced { previous, arn })
    }

    /// Delete the remote object. Deleting a missing object succeeds.
    #[instrument(
        skip(self, object),
        fields(identity = %object.identity(), phase = %object.phase())
    )]
    pub async fn delete(
        &self,
        object: &mut ManagedObject,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.checkpoint(object, &ChangeSet::default())?;

        let previous_phase = object.phase();
        let target = match object.observed() {
            Some(observed) => observed.identity.clone(),
            None => object.identity().clone(),
        };
        object.transition(Phase::Deleting);

        match self.client.delete(&target).await {
            Ok(()) => {
                object.mark_destroyed();
                info!(identity = %target, "Deleted virtual node");
                Ok(ReconcileOutcome::Deleted)
            }
            Err(RemoteError::NotFound(_)) => {
                object.mark_destroyed();
                debug!(identity = %target, "Virtual node already absent");
                Ok(ReconcileOutcome::AlreadyAbsent)
            }
            Err(source) => {
                object.transition(previous_phase);
                Err(ReconcileError::Remote {
                    identity: target,
                    phase: previous_phase,
                    operation: Operation::Delete,
                    source,
                })
            }
        }
    }

    /// Import an existing object from its `<mesh>/<name>` identity.
    ///
    /// The result is `Active` with desired equal to observed.
    #[instrument(skip(self))]
    pub async fn import(&self, id: &str) -> Result<ManagedObject, ReconcileError> {
        let identity =
            ObjectIdentity::parse(id).map_err(|source| ReconcileError::MalformedIdentity {
                input: id.to_string(),
                source,
            })?;

        if self.is_cancelled() {
            return Err(ReconcileError::Cancelled {
                identity,
                phase: Phase::NotExists,
                pending: ChangeSet::default(),
            });
        }

        match self.client.describe(&identity).await {
            Ok(observed) => {
                info!(identity = %identity, arn = %observed.metadata.arn, "Imported virtual node");
                Ok(ManagedObject::from_observed(observed))
            }
            Err(RemoteError::NotFound(_)) => Err(ReconcileError::NotFound { identity }),
            Err(source) => Err(ReconcileError::Remote {
                identity,
                phase: Phase::NotExists,
                operation: Operation::Describe,
                source,
            }),
        }
    }

    /// Re-read the remote object into the observed snapshot.
    ///
    /// An object that disappeared out of band goes back to `NotExists`, so
    /// the next pass re-creates it.
    #[instrument(
        skip(self, object),
        fields(identity = %object.identity(), phase = %object.phase())
    )]
    pub async fn refresh(
        &self,
        object: &mut ManagedObject,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.checkpoint(object, &ChangeSet::default())?;

        let target = match object.observed() {
            Some(observed) => observed.identity.clone(),
            None => object.identity().clone(),
        };

        match self.client.describe(&target).await {
            Ok(fresh) => {
                let drift = drift(object.observed(), &fresh);
                if !drift.is_empty() {
                    warn!(identity = %target, summary = %drift.summary(), "Remote drift detected");
                }
                object.record_observed(fresh);
                Ok(ReconcileOutcome::Refreshed { drift })
            }
            Err(RemoteError::NotFound(_)) => {
                let existed = object.observed().is_some();
                object.mark_absent();
                if existed {
                    warn!(identity = %target, "Virtual node vanished out of band");
                }
                Ok(ReconcileOutcome::Vanished)
            }
            Err(source) => Err(ReconcileError::Remote {
                identity: target,
                phase: object.phase(),
                operation: Operation::Describe,
                source,
            }),
        }
    }
}

fn validate(object: &ManagedObject) -> Result<(), ReconcileError> {
    object
        .desired()
        .validate()
        .map_err(|source| ReconcileError::Validation {
            identity: object.identity().clone(),
            source,
        })
}

fn create_failed(object: &ManagedObject, source: RemoteError) -> ReconcileError {
    ReconcileError::Remote {
        identity: object.identity().clone(),
        phase: Phase::NotExists,
        operation: Operation::Create,
        source,
    }
}

fn drift(previous: Option<&ObservedState>, fresh: &ObservedState) -> ChangeSet {
    match previous {
        Some(previous) => diff_specs(&fresh.spec, &previous.spec),
        None => ChangeSet::default(),
    }
}
