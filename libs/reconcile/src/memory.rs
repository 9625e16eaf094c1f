//! In-memory remote for tests and local sandboxes.
//!
//! Behaves like the managed service: whole-object replace on update,
//! not-found and conflict signals, remote-side validation, ARNs, uids,
//! versions, and timestamps. Every call is recorded, and faults can be
//! injected one call at a time.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use meshform_id::{IdError, ObjectIdentity, ResourceArn};
use meshform_model::{ObjectMetadata, ObservedState, Spec};
use tokio::sync::watch;
use tracing::debug;

use crate::{MeshClient, Operation, RemoteError};

/// Default location used for generated ARNs.
pub const DEFAULT_PARTITION: &str = "aws";
pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_ACCOUNT_ID: &str = "123456789012";

/// A call received by the in-memory remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub operation: Operation,
    pub identity: ObjectIdentity,

    /// Full spec carried by create and update calls.
    pub spec: Option<Spec>,
}

#[derive(Debug, Clone)]
struct Location {
    partition: String,
    region: String,
    account_id: String,
}

/// In-memory implementation of [`MeshClient`].
pub struct InMemoryMeshClient {
    location: Location,
    objects: Mutex<BTreeMap<ObjectIdentity, ObservedState>>,
    calls: Mutex<Vec<RemoteCall>>,
    faults: Mutex<Vec<(Operation, RemoteError)>>,
    trip: Mutex<Option<(Operation, watch::Sender<bool>)>>,
}

impl fmt::Debug for InMemoryMeshClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryMeshClient")
            .field("location", &self.location)
            .field("objects", &lock(&self.objects).len())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryMeshClient {
    /// Create an empty remote in the default partition, region, and account.
    pub fn new() -> Self {
        Self {
            location: Location {
                partition: DEFAULT_PARTITION.to_string(),
                region: DEFAULT_REGION.to_string(),
                account_id: DEFAULT_ACCOUNT_ID.to_string(),
            },
            objects: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(Vec::new()),
            trip: Mutex::new(None),
        }
    }

    /// Create an empty remote generating ARNs for the given location.
    pub fn with_location(
        partition: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Result<Self, IdError> {
        let location = Location {
            partition: partition.into(),
            region: region.into(),
            account_id: account_id.into(),
        };

        // Reject a bad location up front rather than on the first create.
        let sample = ObjectIdentity::from_parts("mesh", "node")?;
        ResourceArn::new(
            &location.partition,
            &location.region,
            &location.account_id,
            sample,
        )?;

        Ok(Self {
            location,
            ..Self::new()
        })
    }

    /// Seed with existing objects (e.g. a persisted sandbox).
    pub fn with_objects(self, objects: impl IntoIterator<Item = ObservedState>) -> Self {
        {
            let mut map = lock(&self.objects);
            for object in objects {
                map.insert(object.identity.clone(), object);
            }
        }
        self
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: RemoteError) {
        lock(&self.faults).push((operation, error));
    }

    /// Send `true` on `cancel` right after the next successful `operation`.
    pub fn cancel_after(&self, operation: Operation, cancel: watch::Sender<bool>) {
        *lock(&self.trip) = Some((operation, cancel));
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls of `operation` received so far.
    pub fn call_count(&self, operation: Operation) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Mutating calls (create, update, delete) received so far.
    pub fn write_calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.operation != Operation::Describe)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Current remote object, bypassing the call log.
    pub fn get(&self, identity: &ObjectIdentity) -> Option<ObservedState> {
        lock(&self.objects).get(identity).cloned()
    }

    /// All remote objects, ordered by identity.
    pub fn objects(&self) -> Vec<ObservedState> {
        lock(&self.objects).values().cloned().collect()
    }

    /// Insert or overwrite an object out of band.
    pub fn put(&self, object: ObservedState) {
        lock(&self.objects).insert(object.identity.clone(), object);
    }

    /// Remove an object out of band.
    pub fn remove(&self, identity: &ObjectIdentity) -> Option<ObservedState> {
        lock(&self.objects).remove(identity)
    }

    fn record(&self, operation: Operation, identity: &ObjectIdentity, spec: Option<&Spec>) {
        debug!(operation = %operation, identity = %identity, "[IN-MEMORY] remote call");
        lock(&self.calls).push(RemoteCall {
            operation,
            identity: identity.clone(),
            spec: spec.cloned(),
        });
    }

    fn take_fault(&self, operation: Operation) -> Option<RemoteError> {
        let mut faults = lock(&self.faults);
        let index = faults.iter().position(|(op, _)| *op == operation)?;
        Some(faults.remove(index).1)
    }

    fn trip(&self, operation: Operation) {
        let mut trip = lock(&self.trip);
        if trip.as_ref().is_some_and(|(op, _)| *op == operation) {
            if let Some((_, cancel)) = trip.take() {
                let _ = cancel.send(true);
            }
        }
    }

    fn begin(
        &self,
        operation: Operation,
        identity: &ObjectIdentity,
        spec: Option<&Spec>,
    ) -> Result<(), RemoteError> {
        self.record(operation, identity, spec);
        match self.take_fault(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn arn(&self, identity: &ObjectIdentity) -> Result<ResourceArn, RemoteError> {
        ResourceArn::new(
            &self.location.partition,
            &self.location.region,
            &self.location.account_id,
            identity.clone(),
        )
        .map_err(|e| RemoteError::Validation(e.to_string()))
    }
}

impl Default for InMemoryMeshClient {
    fn default() -> Self {
        Self::new()
    }
}

fn remote_validate(spec: &Spec) -> Result<(), RemoteError> {
    spec.validate()
        .map_err(|e| RemoteError::Validation(e.to_string()))
}

#[async_trait]
impl MeshClient for InMemoryMeshClient {
    async fn describe(&self, identity: &ObjectIdentity) -> Result<ObservedState, RemoteError> {
        self.begin(Operation::Describe, identity, None)?;
        let observed = lock(&self.objects)
            .get(identity)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(identity.to_string()))?;
        self.trip(Operation::Describe);
        Ok(observed)
    }

    async fn create(
        &self,
        identity: &ObjectIdentity,
        spec: &Spec,
    ) -> Result<ObservedState, RemoteError> {
        self.begin(Operation::Create, identity, Some(spec))?;
        remote_validate(spec)?;

        let observed = {
            let mut objects = lock(&self.objects);
            if objects.contains_key(identity) {
                return Err(RemoteError::Conflict(format!(
                    "virtual node {identity} already exists"
                )));
            }

            let now = Utc::now();
            let observed = ObservedState {
                identity: identity.clone(),
                spec: spec.clone(),
                metadata: ObjectMetadata {
                    arn: self.arn(identity)?,
                    uid: uuid::Uuid::new_v4().to_string(),
                    version: 1,
                    created_at: now,
                    last_updated_at: now,
                },
            };
            objects.insert(identity.clone(), observed.clone());
            observed
        };

        self.trip(Operation::Create);
        Ok(observed)
    }

    async fn update(
        &self,
        identity: &ObjectIdentity,
        spec: &Spec,
    ) -> Result<ObservedState, RemoteError> {
        self.begin(Operation::Update, identity, Some(spec))?;

        let observed = {
            let mut objects = lock(&self.objects);
            let existing = objects
                .get_mut(identity)
                .ok_or_else(|| RemoteError::NotFound(identity.to_string()))?;
            remote_validate(spec)?;

            existing.spec = spec.clone();
            existing.metadata.version += 1;
            existing.metadata.last_updated_at = Utc::now();
            existing.clone()
        };

        self.trip(Operation::Update);
        Ok(observed)
    }

    async fn delete(&self, identity: &ObjectIdentity) -> Result<(), RemoteError> {
        self.begin(Operation::Delete, identity, None)?;
        lock(&self.objects)
            .remove(identity)
            .ok_or_else(|| RemoteError::NotFound(identity.to_string()))?;
        self.trip(Operation::Delete);
        Ok(())
    }
}
