//! Managed objects: desired spec plus last-observed remote snapshot.

use chrono::{DateTime, Utc};
use meshform_id::{ObjectIdentity, ResourceArn};
use serde::{Deserialize, Serialize};

use crate::{Spec, ValidationError};

/// Remote metadata recorded on every successful read or write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub arn: ResourceArn,

    /// Remote-assigned unique id; changes when the object is re-created.
    pub uid: String,

    /// Remote version, incremented by every update.
    pub version: i64,

    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

/// What the remote system reported for an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedState {
    pub identity: ObjectIdentity,
    pub spec: Spec,
    pub metadata: ObjectMetadata,
}

/// Reconciliation phase of a managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotExists,
    Creating,
    Active,
    Updating,
    Deleting,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::NotExists => "not_exists",
            Phase::Creating => "creating",
            Phase::Active => "active",
            Phase::Updating => "updating",
            Phase::Deleting => "deleting",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse lifecycle status exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// Declared but not (yet) present remotely.
    Pending,
    Active,
    Deleting,
    /// Destroyed by an explicit deletion.
    Gone,
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleStatus::Pending => "pending",
            LifecycleStatus::Active => "active",
            LifecycleStatus::Deleting => "deleting",
            LifecycleStatus::Gone => "gone",
        };
        f.write_str(s)
    }
}

/// A virtual node under management.
///
/// Mutated only by reconciliation passes. The desired identity may be
/// changed with [`ManagedObject::set_identity`]; the remote object keeps its
/// own identity (in `observed`) until a replacement re-creates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedObject {
    identity: ObjectIdentity,
    desired: Spec,
    observed: Option<ObservedState>,
    phase: Phase,
    status: LifecycleStatus,
}

impl ManagedObject {
    /// Declares a new object. The spec is validated before it is accepted.
    pub fn new(identity: ObjectIdentity, desired: Spec) -> Result<Self, ValidationError> {
        desired.validate()?;
        Ok(Self {
            identity,
            desired,
            observed: None,
            phase: Phase::NotExists,
            status: LifecycleStatus::Pending,
        })
    }

    /// Adopts an object read from the remote system; desired equals observed.
    pub fn from_observed(observed: ObservedState) -> Self {
        Self {
            identity: observed.identity.clone(),
            desired: observed.spec.clone(),
            observed: Some(observed),
            phase: Phase::Active,
            status: LifecycleStatus::Active,
        }
    }

    /// Desired identity.
    pub fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    pub fn desired(&self) -> &Spec {
        &self.desired
    }

    pub fn observed(&self) -> Option<&ObservedState> {
        self.observed.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> LifecycleStatus {
        self.status
    }

    /// Validates and accepts a new desired spec.
    ///
    /// On failure the previous desired spec is kept and every violated
    /// constraint is reported.
    pub fn merge(&mut self, desired: Spec) -> Result<&Spec, ValidationError> {
        desired.validate()?;
        self.desired = desired;
        Ok(&self.desired)
    }

    /// Changes the desired identity. Takes effect remotely on the next
    /// reconciliation pass, as a replacement.
    pub fn set_identity(&mut self, identity: ObjectIdentity) {
        self.identity = identity;
    }

    /// Read-only copy of the last observed state, for diffing.
    pub fn snapshot(&self) -> Option<ObservedState> {
        self.observed.clone()
    }

    /// Moves to `phase`, deriving the lifecycle status.
    pub fn transition(&mut self, phase: Phase) {
        self.phase = phase;
        self.status = match phase {
            Phase::NotExists if self.status == LifecycleStatus::Gone => LifecycleStatus::Gone,
            Phase::NotExists | Phase::Creating => LifecycleStatus::Pending,
            Phase::Active | Phase::Updating => LifecycleStatus::Active,
            Phase::Deleting => LifecycleStatus::Deleting,
        };
    }

    /// Records a fresh remote read or write result and becomes active.
    pub fn record_observed(&mut self, observed: ObservedState) {
        self.observed = Some(observed);
        self.transition(Phase::Active);
    }

    /// The remote object is absent (not created yet, or removed out of band).
    pub fn mark_absent(&mut self) {
        self.observed = None;
        self.transition(Phase::NotExists);
    }

    /// The remote object was destroyed by an explicit deletion.
    pub fn mark_destroyed(&mut self) {
        self.observed = None;
        self.phase = Phase::NotExists;
        self.status = LifecycleStatus::Gone;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Listener, Protocol};

    fn identity() -> ObjectIdentity {
        ObjectIdentity::parse("mesh1/node1").unwrap()
    }

    fn observed(spec: Spec) -> ObservedState {
        let now = Utc::now();
        ObservedState {
            identity: identity(),
            spec,
            metadata: ObjectMetadata {
                arn: ResourceArn::new("aws", "us-west-2", "123456789012", identity()).unwrap(),
                uid: "uid-1".to_string(),
                version: 1,
                created_at: now,
                last_updated_at: now,
            },
        }
    }

    #[test]
    fn test_new_object_is_pending() {
        let object = ManagedObject::new(identity(), Spec::default()).unwrap();
        assert_eq!(object.phase(), Phase::NotExists);
        assert_eq!(object.status(), LifecycleStatus::Pending);
        assert!(object.snapshot().is_none());
    }

    #[test]
    fn test_new_object_rejects_invalid_spec() {
        let spec = Spec {
            listeners: vec![Listener::new(0, Protocol::Tcp)],
            ..Spec::default()
        };
        assert!(ManagedObject::new(identity(), spec).is_err());
    }

    #[test]
    fn test_merge_keeps_previous_on_failure() {
        let valid = Spec {
            listeners: vec![Listener::new(8080, Protocol::Http)],
            ..Spec::default()
        };
        let mut object = ManagedObject::new(identity(), valid.clone()).unwrap();

        let invalid = Spec {
            listeners: vec![Listener::new(0, Protocol::Http)],
            ..Spec::default()
        };
        assert!(object.merge(invalid).is_err());
        assert_eq!(object.desired(), &valid);
    }

    #[test]
    fn test_from_observed_is_active_with_desired_equal_observed() {
        let spec = Spec {
            listeners: vec![Listener::new(8080, Protocol::Http)],
            ..Spec::default()
        };
        let object = ManagedObject::from_observed(observed(spec.clone()));
        assert_eq!(object.phase(), Phase::Active);
        assert_eq!(object.status(), LifecycleStatus::Active);
        assert_eq!(object.desired(), &spec);
        assert_eq!(object.snapshot().unwrap().spec, spec);
    }

    #[test]
    fn test_destroyed_stays_gone() {
        let mut object = ManagedObject::from_observed(observed(Spec::default()));
        object.transition(Phase::Deleting);
        assert_eq!(object.status(), LifecycleStatus::Deleting);
        object.mark_destroyed();
        assert_eq!(object.status(), LifecycleStatus::Gone);
        object.transition(Phase::NotExists);
        assert_eq!(object.status(), LifecycleStatus::Gone);
        object.transition(Phase::Creating);
        assert_eq!(object.status(), LifecycleStatus::Pending);
    }
}
