//! Integration tests for reconciliation passes against the in-memory remote.
//!
//! Covers the lifecycle a virtual node goes through:
//! 1. Create from an empty or populated spec
//! 2. Update every part of the spec in one call
//! 3. Replace when the identity changes
//! 4. Delete, import, refresh, and recovery from remote failures

use std::sync::Arc;

use meshform_model::{
    Backend, LifecycleStatus, Listener, Logging, ManagedObject, Phase, Protocol, Spec,
};
use meshform_reconcile::{
    ChangeKind, InMemoryMeshClient, MeshClient, Operation, Plan, ReconcileError,
    ReconcileOutcome, Reconciler, RemoteError,
};
use meshform_testing as fixtures;
use proptest::prelude::*;
use tokio::sync::watch;

fn setup() -> (Arc<InMemoryMeshClient>, Reconciler<Arc<InMemoryMeshClient>>) {
    let client = Arc::new(InMemoryMeshClient::new());
    let reconciler = Reconciler::new(client.clone());
    (client, reconciler)
}

fn operations(client: &InMemoryMeshClient) -> Vec<Operation> {
    client.calls().into_iter().map(|c| c.operation).collect()
}

/// Creates `spec` remotely and returns the converged managed object.
async fn converged(
    reconciler: &Reconciler<Arc<InMemoryMeshClient>>,
    spec: Spec,
) -> ManagedObject {
    let mut object = fixtures::managed(fixtures::unique_identity(), spec);
    reconciler.reconcile(&mut object).await.unwrap();
    reconciler.client().clear_calls();
    object
}

#[tokio::test]
async fn test_create_basic() {
    let (client, reconciler) = setup();
    let id = fixtures::identity("simpleapp", "servicebv1");
    let mut object = fixtures::managed(id.clone(), fixtures::basic());

    let outcome = reconciler.reconcile(&mut object).await.unwrap();

    let ReconcileOutcome::Created { arn } = outcome else {
        panic!("expected Created, got {outcome:?}");
    };
    assert_eq!(arn.identity(), &id);
    assert_eq!(
        arn.to_string(),
        "arn:aws:appmesh:us-west-2:123456789012:mesh/simpleapp/virtualNode/servicebv1"
    );
    assert_eq!(operations(&client), vec![Operation::Create]);
    assert_eq!(object.phase(), Phase::Active);
    assert_eq!(object.status(), LifecycleStatus::Active);

    let observed = object.observed().unwrap();
    assert!(observed.spec.is_empty());
    assert_eq!(observed.metadata.version, 1);
    assert!(!observed.metadata.uid.is_empty());
}

#[tokio::test]
async fn test_create_listener_health_checks() {
    let (client, reconciler) = setup();
    let mut object = fixtures::managed(
        fixtures::identity("simpleapp", "servicebv1"),
        fixtures::listener_health_checks(),
    );

    reconciler.reconcile(&mut object).await.unwrap();

    assert_eq!(operations(&client), vec![Operation::Create]);
    assert_eq!(object.phase(), Phase::Active);

    let observed = &object.observed().unwrap().spec;
    assert_eq!(observed, &fixtures::listener_health_checks());
    let listener = &observed.listeners[0];
    assert_eq!(listener.key().to_string(), "8080/http");
    let hc = listener.health_check.as_ref().unwrap();
    assert_eq!(hc.path.as_deref(), Some("/ping"));
    assert_eq!(
        (hc.healthy_threshold, hc.unhealthy_threshold, hc.timeout_millis, hc.interval_millis),
        (3, 5, 2000, 5000)
    );
    assert_eq!(observed.backends[0].virtual_service_name, "servicea.simpleapp.local");
    assert_eq!(
        Spec::from_attributes(&observed.to_attributes()).unwrap(),
        fixtures::listener_health_checks()
    );
}

#[tokio::test]
async fn test_second_pass_is_noop() {
    let (client, reconciler) = setup();
    let mut object =
        fixtures::managed(fixtures::unique_identity(), fixtures::listener_health_checks());

    reconciler.reconcile(&mut object).await.unwrap();
    client.clear_calls();

    let outcome = reconciler.reconcile(&mut object).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_update_all_parts_in_one_call() {
    let (client, reconciler) = setup();
    let mut object = converged(&reconciler, fixtures::listener_health_checks()).await;
    let uid = object.observed().unwrap().metadata.uid.clone();

    object.merge(fixtures::listener_health_checks_updated()).unwrap();
    assert!(matches!(reconciler.plan(&object).unwrap(), Plan::Update(_)));

    let outcome = reconciler.reconcile(&mut object).await.unwrap();
    let ReconcileOutcome::Updated { changes } = outcome else {
        panic!("expected Updated, got {outcome:?}");
    };
    assert!(!changes.requires_replacement());
    assert_eq!(changes.count(ChangeKind::ReplacementRequired), 0);

    let writes = client.write_calls();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].operation, Operation::Update);
    assert_eq!(
        writes[0].spec.as_ref(),
        Some(&fixtures::listener_health_checks_updated())
    );

    let observed = object.observed().unwrap();
    assert_eq!(observed.spec, fixtures::listener_health_checks_updated());
    assert_eq!(observed.metadata.uid, uid);
    assert_eq!(observed.metadata.version, 2);
}

#[tokio::test]
async fn test_update_changes_are_ordered_and_keyed() {
    let (_client, reconciler) = setup();
    let mut object = converged(&reconciler, fixtures::listener_health_checks()).await;
    object.merge(fixtures::listener_health_checks_updated()).unwrap();

    let Plan::Update(changes) = reconciler.plan(&object).unwrap() else {
        panic!("expected an update plan");
    };
    let rendered: Vec<String> = changes
        .iter()
        .map(|c| format!("{} {}", c.kind.symbol(), c.path))
        .collect();

    assert_eq!(
        rendered,
        vec![
            "+ spec.backend[servicec.simpleapp.local]",
            "+ spec.backend[serviced.simpleapp.local]",
            "- spec.backend[servicea.simpleapp.local]",
            "+ spec.listener[8081/http]",
            "- spec.listener[8080/http]",
            "~ spec.service_discovery.dns.hostname",
        ]
    );
}

#[tokio::test]
async fn test_single_leaf_change_is_single_update() {
    let (client, reconciler) = setup();
    let mut object = converged(&reconciler, fixtures::logging("/dev/stdout")).await;

    object.merge(fixtures::logging("/tmp/access.log")).unwrap();
    let outcome = reconciler.reconcile(&mut object).await.unwrap();

    let ReconcileOutcome::Updated { changes } = outcome else {
        panic!("expected Updated, got {outcome:?}");
    };
    assert_eq!(changes.len(), 1);
    let change = &changes.changes()[0];
    assert_eq!(change.kind, ChangeKind::Update);
    assert_eq!(change.path.to_string(), "spec.logging.access_log.file.path");
    assert_eq!(operations(&client), vec![Operation::Update]);
}

#[tokio::test]
async fn test_reordered_sets_are_unchanged() {
    let (client, reconciler) = setup();
    let mut object = converged(&reconciler, fixtures::listener_health_checks_updated()).await;

    let mut reordered = fixtures::listener_health_checks_updated();
    reordered.backends.reverse();
    object.merge(reordered).unwrap();

    assert_eq!(reconciler.plan(&object).unwrap(), Plan::Unchanged);
    assert_eq!(
        reconciler.reconcile(&mut object).await.unwrap(),
        ReconcileOutcome::Unchanged
    );
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_identity_change_replaces() {
    let (client, reconciler) = setup();
    let old = fixtures::identity("simpleapp", "servicebv1");
    let new = fixtures::identity("simpleapp", "servicebv2");
    let mut object = fixtures::managed(old.clone(), fixtures::listener_health_checks());
    reconciler.reconcile(&mut object).await.unwrap();
    client.clear_calls();

    object.set_identity(new.clone());
    let Plan::Replace(changes) = reconciler.plan(&object).unwrap() else {
        panic!("expected a replace plan");
    };
    assert_eq!(changes.changes()[0].kind, ChangeKind::ReplacementRequired);
    assert_eq!(changes.changes()[0].path.to_string(), "name");

    let outcome = reconciler.reconcile(&mut object).await.unwrap();
    let ReconcileOutcome::Replaced { previous, arn } = outcome else {
        panic!("expected Replaced, got {outcome:?}");
    };
    assert_eq!(previous, old);
    assert_eq!(arn.identity(), &new);
    assert_eq!(operations(&client), vec![Operation::Delete, Operation::Create]);
    assert!(client.get(&old).is_none());
    assert!(client.get(&new).is_some());
    assert_eq!(object.observed().unwrap().identity, new);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (client, reconciler) = setup();
    let mut object = converged(&reconciler, fixtures::basic()).await;
    let id = object.identity().clone();

    assert_eq!(
        reconciler.delete(&mut object).await.unwrap(),
        ReconcileOutcome::Deleted
    );
    assert!(client.get(&id).is_none());
    assert_eq!(object.phase(), Phase::NotExists);
    assert_eq!(object.status(), LifecycleStatus::Gone);
    assert!(object.observed().is_none());

    assert_eq!(
        reconciler.delete(&mut object).await.unwrap(),
        ReconcileOutcome::AlreadyAbsent
    );
    assert_eq!(object.status(), LifecycleStatus::Gone);
}

#[tokio::test]
async fn test_delete_failure_keeps_phase() {
    let (client, reconciler) = setup();
    let mut object = converged(&reconciler, fixtures::basic()).await;
    client.fail_next(
        Operation::Delete,
        RemoteError::Transient("throttled".to_string()),
    );

    let err = reconciler.delete(&mut object).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Remote {
            operation: Operation::Delete,
            phase: Phase::Active,
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(object.phase(), Phase::Active);
    assert!(client.get(object.identity()).is_some());
}

#[tokio::test]
async fn test_import_existing() {
    let (client, reconciler) = setup();
    let id = fixtures::identity("mesh1", "node1");
    client.create(&id, &fixtures::logging("/dev/stdout")).await.unwrap();
    client.clear_calls();

    let mut object = reconciler.import("mesh1/node1").await.unwrap();
    assert_eq!(object.identity(), &id);
    assert_eq!(object.phase(), Phase::Active);
    assert_eq!(object.desired(), &fixtures::logging("/dev/stdout"));
    assert_eq!(object.observed().unwrap().spec, *object.desired());

    client.clear_calls();
    assert_eq!(
        reconciler.reconcile(&mut object).await.unwrap(),
        ReconcileOutcome::Unchanged
    );
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_import_malformed_identity() {
    let (client, reconciler) = setup();

    for input in ["mesh1", "mesh1/", "/node1", "a/b/c", ""] {
        let err = reconciler.import(input).await.unwrap_err();
        assert!(
            matches!(err, ReconcileError::MalformedIdentity { .. }),
            "{input:?} gave {err:?}"
        );
        assert!(!err.is_retryable());
    }
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_import_missing() {
    let (_client, reconciler) = setup();

    let err = reconciler.import("mesh1/node1").await.unwrap_err();
    assert!(matches!(err, ReconcileError::NotFound { .. }));
    assert_eq!(err.identity(), Some(&fixtures::identity("mesh1", "node1")));
}

#[tokio::test]
async fn test_invalid_spec_never_reaches_remote() {
    let (client, reconciler) = setup();
    let object = fixtures::managed(fixtures::unique_identity(), fixtures::basic());

    // Bypass local validation by editing the serialized form.
    let mut json = serde_json::to_value(&object).unwrap();
    json["desired"]["listener"] = serde_json::json!([
        { "port_mapping": { "port": 0, "protocol": "http" } }
    ]);
    let mut object: ManagedObject = serde_json::from_value(json).unwrap();

    let err = reconciler.reconcile(&mut object).await.unwrap_err();
    let ReconcileError::Validation { source, .. } = &err else {
        panic!("expected Validation, got {err:?}");
    };
    assert!(source.has_violation_at("spec.listener[0/http].port_mapping.port"));
    assert!(!err.is_retryable());
    assert!(client.calls().is_empty());
    assert_eq!(object.phase(), Phase::NotExists);
}

#[tokio::test]
async fn test_merge_rejects_invalid_and_keeps_previous() {
    let (_client, reconciler) = setup();
    let mut object = converged(&reconciler, fixtures::basic()).await;

    let mut invalid = fixtures::basic();
    invalid.listeners.push(Listener::new(70000, Protocol::Tcp));
    invalid.backends.push(Backend::new(""));

    let err = object.merge(invalid).unwrap_err();
    assert_eq!(err.violations.len(), 2);
    assert_eq!(object.desired(), &fixtures::basic());
    assert_eq!(reconciler.plan(&object).unwrap(), Plan::Unchanged);
}

#[tokio::test]
async fn test_create_conflict_adopts_and_updates() {
    let (client, reconciler) = setup();
    let id = fixtures::unique_identity();
    client.create(&id, &fixtures::basic()).await.unwrap();
    client.clear_calls();

    let mut object = fixtures::managed(id.clone(), fixtures::listener_health_checks());
    let outcome = reconciler.reconcile(&mut object).await.unwrap();

    assert!(matches!(
        outcome,
        ReconcileOutcome::Adopted { updated: true, .. }
    ));
    assert_eq!(
        operations(&client),
        vec![Operation::Create, Operation::Describe, Operation::Update]
    );
    assert_eq!(client.get(&id).unwrap().spec, fixtures::listener_health_checks());
    assert_eq!(object.phase(), Phase::Active);
}

#[tokio::test]
async fn test_create_conflict_adopts_identical() {
    let (client, reconciler) = setup();
    let id = fixtures::unique_identity();
    client.create(&id, &fixtures::basic()).await.unwrap();
    client.clear_calls();

    let mut object = fixtures::managed(id, fixtures::basic());
    let outcome = reconciler.reconcile(&mut object).await.unwrap();

    assert!(matches!(
        outcome,
        ReconcileOutcome::Adopted { updated: false, .. }
    ));
    assert!(client.write_calls().iter().all(|c| c.operation == Operation::Create));
}

#[tokio::test]
async fn test_create_failure_stays_not_exists() {
    let (client, reconciler) = setup();
    client.fail_next(
        Operation::Create,
        RemoteError::Transient("service unavailable".to_string()),
    );
    let mut object = fixtures::managed(fixtures::unique_identity(), fixtures::basic());

    let err = reconciler.reconcile(&mut object).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Remote {
            operation: Operation::Create,
            phase: Phase::NotExists,
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(object.phase(), Phase::NotExists);
    assert_eq!(err.identity(), Some(object.identity()));

    // Retry converges.
    let outcome = reconciler.reconcile(&mut object).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Created { .. }));
}

#[tokio::test]
async fn test_remote_validation_is_not_retryable() {
    let (client, reconciler) = setup();
    let mut object = converged(&reconciler, fixtures::basic()).await;
    object.merge(fixtures::logging("/dev/stdout")).unwrap();
    client.fail_next(
        Operation::Update,
        RemoteError::Validation("unsupported path".to_string()),
    );

    let err = reconciler.reconcile(&mut object).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Remote {
            operation: Operation::Update,
            ..
        }
    ));
    assert!(!err.is_retryable());
    assert_eq!(object.phase(), Phase::Active);
    assert!(object.observed().unwrap().spec.is_empty());
}

#[tokio::test]
async fn test_partial_replacement() {
    let (client, reconciler) = setup();
    let old = fixtures::identity("simpleapp", "servicebv1");
    let new = fixtures::identity("simpleapp", "servicebv2");
    let mut object = fixtures::managed(old.clone(), fixtures::basic());
    reconciler.reconcile(&mut object).await.unwrap();

    object.set_identity(new.clone());
    client.fail_next(
        Operation::Create,
        RemoteError::Transient("throttled".to_string()),
    );

    let err = reconciler.reconcile(&mut object).await.unwrap_err();
    let ReconcileError::PartialReplacement { deleted, target, .. } = &err else {
        panic!("expected PartialReplacement, got {err:?}");
    };
    assert_eq!(deleted, &old);
    assert_eq!(target, &new);
    assert!(err.is_retryable());
    assert_eq!(object.phase(), Phase::NotExists);
    assert!(object.observed().is_none());
    assert!(client.objects().is_empty());

    // A retry creates the new identity.
    let outcome = reconciler.reconcile(&mut object).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Created { .. }));
    assert!(client.get(&new).is_some());
}

#[tokio::test]
async fn test_replacement_adopt_failure_is_not_partial() {
    let (client, reconciler) = setup();
    let old = fixtures::identity("simpleapp", "servicebv1");
    let new = fixtures::identity("simpleapp", "servicebv2");

    // The target already exists remotely with a different spec.
    let mut other = fixtures::managed(new.clone(), fixtures::basic());
    reconciler.reconcile(&mut other).await.unwrap();

    let mut object = fixtures::managed(old.clone(), fixtures::listener_health_checks());
    reconciler.reconcile(&mut object).await.unwrap();
    client.clear_calls();

    object.set_identity(new.clone());
    client.fail_next(
        Operation::Update,
        RemoteError::Transient("throttled".to_string()),
    );

    let err = reconciler.reconcile(&mut object).await.unwrap_err();
    let ReconcileError::Remote {
        identity,
        phase,
        operation,
        ..
    } = &err
    else {
        panic!("expected Remote, got {err:?}");
    };
    assert_eq!(identity, &new);
    assert_eq!(*phase, Phase::Active);
    assert_eq!(*operation, Operation::Update);
    assert!(err.is_retryable());
    assert_eq!(
        operations(&client),
        vec![
            Operation::Delete,
            Operation::Create,
            Operation::Describe,
            Operation::Update,
        ]
    );

    // The target is adopted and the old object is gone.
    assert_eq!(object.phase(), Phase::Active);
    assert_eq!(object.observed().unwrap().identity, new);
    assert!(client.get(&old).is_none());
    assert_eq!(client.get(&new).unwrap().spec, fixtures::basic());

    // A retry updates the adopted target in place.
    let outcome = reconciler.reconcile(&mut object).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Updated { .. }));
    assert_eq!(
        client.get(&new).unwrap().spec,
        fixtures::listener_health_checks()
    );
}

#[tokio::test]
async fn test_replacement_onto_existing_target_adopts() {
    let (client, reconciler) = setup();
    let old = fixtures::identity("simpleapp", "servicebv1");
    let new = fixtures::identity("simpleapp", "servicebv2");

    let mut other = fixtures::managed(new.clone(), fixtures::basic());
    reconciler.reconcile(&mut other).await.unwrap();
    let mut object = fixtures::managed(old.clone(), fixtures::listener_health_checks());
    reconciler.reconcile(&mut object).await.unwrap();

    object.set_identity(new.clone());
    let outcome = reconciler.reconcile(&mut object).await.unwrap();

    let ReconcileOutcome::Replaced { previous, arn } = outcome else {
        panic!("expected Replaced, got {outcome:?}");
    };
    assert_eq!(previous, old);
    assert_eq!(arn, client.get(&new).unwrap().metadata.arn);
    assert_eq!(
        client.get(&new).unwrap().spec,
        fixtures::listener_health_checks()
    );
}

#[tokio::test]
async fn test_cancellation_between_delete_and_create() {
    let client = Arc::new(InMemoryMeshClient::new());
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let reconciler = Reconciler::new(client.clone()).with_cancellation(cancel_rx);

    let mut object = fixtures::managed(
        fixtures::identity("simpleapp", "servicebv1"),
        fixtures::listener_health_checks(),
    );
    reconciler.reconcile(&mut object).await.unwrap();
    client.clear_calls();

    object.set_identity(fixtures::identity("simpleapp", "servicebv2"));
    client.cancel_after(Operation::Delete, cancel_tx);

    let err = reconciler.reconcile(&mut object).await.unwrap_err();
    let ReconcileError::Cancelled { phase, pending, .. } = &err else {
        panic!("expected Cancelled, got {err:?}");
    };
    assert_eq!(*phase, Phase::NotExists);
    assert!(!pending.is_empty());
    assert!(err.is_cancelled());
    assert_eq!(operations(&client), vec![Operation::Delete]);
    assert_eq!(object.phase(), Phase::NotExists);
}

#[tokio::test]
async fn test_cancelled_before_first_call() {
    let client = Arc::new(InMemoryMeshClient::new());
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let reconciler = Reconciler::new(client.clone()).with_cancellation(cancel_rx);
    cancel_tx.send(true).unwrap();

    let mut object = fixtures::managed(fixtures::unique_identity(), fixtures::basic());
    let err = reconciler.reconcile(&mut object).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(client.calls().is_empty());
    assert_eq!(object.phase(), Phase::NotExists);
}

#[tokio::test]
async fn test_update_of_vanished_object_recreates() {
    let (client, reconciler) = setup();
    let mut object = converged(&reconciler, fixtures::basic()).await;
    client.remove(object.identity());

    object.merge(fixtures::logging("/dev/stdout")).unwrap();
    let outcome = reconciler.reconcile(&mut object).await.unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Created { .. }));
    assert_eq!(operations(&client), vec![Operation::Update, Operation::Create]);
    assert_eq!(
        client.get(object.identity()).unwrap().spec,
        fixtures::logging("/dev/stdout")
    );
}

#[tokio::test]
async fn test_update_not_found_then_conflict_adopts() {
    let (client, reconciler) = setup();
    let mut object = converged(&reconciler, fixtures::basic()).await;

    // The update reports the object missing, yet the re-create finds it.
    client.fail_next(
        Operation::Update,
        RemoteError::NotFound(object.identity().to_string()),
    );
    object.merge(fixtures::logging("/dev/stdout")).unwrap();
    let outcome = reconciler.reconcile(&mut object).await.unwrap();

    assert!(matches!(
        outcome,
        ReconcileOutcome::Adopted { updated: true, .. }
    ));
    assert_eq!(
        operations(&client),
        vec![
            Operation::Update,
            Operation::Create,
            Operation::Describe,
            Operation::Update,
        ]
    );
    assert_eq!(object.phase(), Phase::Active);
    assert_eq!(
        client.get(object.identity()).unwrap().spec,
        fixtures::logging("/dev/stdout")
    );
}

#[tokio::test]
async fn test_refresh_reports_drift() {
    let (client, reconciler) = setup();
    let mut object = converged(&reconciler, fixtures::logging("/dev/stdout")).await;

    let mut drifted = client.get(object.identity()).unwrap();
    drifted.spec.logging = Some(Logging::file("/var/log/envoy.log"));
    client.put(drifted);

    let outcome = reconciler.refresh(&mut object).await.unwrap();
    let ReconcileOutcome::Refreshed { drift } = outcome else {
        panic!("expected Refreshed, got {outcome:?}");
    };
    assert_eq!(drift.len(), 1);
    assert_eq!(
        drift.changes()[0].path.to_string(),
        "spec.logging.access_log.file.path"
    );

    // The next pass restores the desired path.
    let outcome = reconciler.reconcile(&mut object).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Updated { .. }));
    assert_eq!(
        client.get(object.identity()).unwrap().spec,
        fixtures::logging("/dev/stdout")
    );
}

#[tokio::test]
async fn test_refresh_of_vanished_object() {
    let (client, reconciler) = setup();
    let mut object = converged(&reconciler, fixtures::basic()).await;
    client.remove(object.identity());

    assert_eq!(
        reconciler.refresh(&mut object).await.unwrap(),
        ReconcileOutcome::Vanished
    );
    assert_eq!(object.phase(), Phase::NotExists);
    assert_eq!(object.status(), LifecycleStatus::Pending);

    let outcome = reconciler.reconcile(&mut object).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Created { .. }));
}

#[tokio::test]
async fn test_distinct_objects_reconcile_concurrently() {
    let client = Arc::new(InMemoryMeshClient::new());
    let reconciler = Arc::new(Reconciler::new(client.clone()));

    let mut handles = Vec::new();
    for n in 0..8 {
        let reconciler = reconciler.clone();
        handles.push(tokio::spawn(async move {
            let mut object = fixtures::managed(
                fixtures::identity("simpleapp", &format!("node-{n}")),
                fixtures::listener_health_checks(),
            );
            reconciler.reconcile(&mut object).await.unwrap();
            object
        }));
    }

    for handle in handles {
        let object = handle.await.unwrap();
        assert_eq!(object.phase(), Phase::Active);
    }
    assert_eq!(client.objects().len(), 8);
    assert_eq!(client.call_count(Operation::Create), 8);
}

// =============================================================================
// Property tests
// =============================================================================

fn permuted<T: Clone>(items: &[T], seed: &[usize]) -> Vec<T> {
    let mut pool = items.to_vec();
    let mut out = Vec::with_capacity(pool.len());
    for (i, s) in seed.iter().enumerate().take(items.len()) {
        let remaining = items.len() - i;
        out.push(pool.remove(s % remaining));
    }
    out.append(&mut pool);
    out
}

fn spec_with(backends: &[String], ports: &[u32]) -> Spec {
    Spec {
        backends: backends.iter().map(Backend::new).collect(),
        listeners: ports
            .iter()
            .map(|port| Listener::new(*port, Protocol::Http))
            .collect(),
        logging: None,
        service_discovery: None,
    }
}

proptest! {
    #[test]
    fn prop_set_order_never_produces_changes(
        backends in prop::collection::btree_set("[a-z]{1,8}\\.local", 0..6),
        ports in prop::collection::btree_set(1u32..=65535, 0..6),
        seed in prop::collection::vec(any::<usize>(), 12),
    ) {
        let backends: Vec<String> = backends.into_iter().collect();
        let ports: Vec<u32> = ports.into_iter().collect();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

        runtime.block_on(async {
            let (client, reconciler) = setup();
            let mut object = fixtures::managed(
                fixtures::unique_identity(),
                spec_with(&backends, &ports),
            );
            reconciler.reconcile(&mut object).await.unwrap();
            client.clear_calls();

            let shuffled = spec_with(&permuted(&backends, &seed), &permuted(&ports, &seed[6..]));
            object.merge(shuffled).unwrap();

            prop_assert_eq!(reconciler.plan(&object).unwrap(), Plan::Unchanged);
            prop_assert_eq!(
                reconciler.reconcile(&mut object).await.unwrap(),
                ReconcileOutcome::Unchanged
            );
            prop_assert!(client.calls().is_empty());
            Ok(())
        })?;
    }

    #[test]
    fn prop_reconcile_converges_in_one_pass(
        from_backends in prop::collection::btree_set("[a-z]{1,8}\\.local", 0..5),
        to_backends in prop::collection::btree_set("[a-z]{1,8}\\.local", 0..5),
        from_ports in prop::collection::btree_set(1u32..=65535, 0..4),
        to_ports in prop::collection::btree_set(1u32..=65535, 0..4),
    ) {
        let from_backends: Vec<_> = from_backends.into_iter().collect();
        let from_ports: Vec<_> = from_ports.into_iter().collect();
        let to_backends: Vec<_> = to_backends.into_iter().collect();
        let to_ports: Vec<_> = to_ports.into_iter().collect();
        let from = spec_with(&from_backends, &from_ports);
        let to = spec_with(&to_backends, &to_ports);
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

        runtime.block_on(async {
            let (client, reconciler) = setup();
            let mut object = fixtures::managed(fixtures::unique_identity(), from);
            reconciler.reconcile(&mut object).await.unwrap();

            object.merge(to.clone()).unwrap();
            reconciler.reconcile(&mut object).await.unwrap();
            prop_assert_eq!(&client.get(object.identity()).unwrap().spec, &to);

            client.clear_calls();
            prop_assert_eq!(
                reconciler.reconcile(&mut object).await.unwrap(),
                ReconcileOutcome::Unchanged
            );
            prop_assert!(client.calls().is_empty());
            prop_assert_eq!(client.call_count(Operation::Delete), 0);
            Ok(())
        })?;
    }
}
