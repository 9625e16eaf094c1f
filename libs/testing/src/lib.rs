//! Shared fixtures for reconciliation tests.
//!
//! The spec fixtures mirror the configurations a virtual node typically
//! moves through: an empty spec, a listener with an HTTP health check, an
//! update of every part of that, and access logging.

use std::sync::atomic::{AtomicU64, Ordering};

use meshform_id::ObjectIdentity;
use meshform_model::{
    Backend, HealthCheck, Listener, Logging, ManagedObject, Protocol, ServiceDiscovery, Spec,
};

static NEXT_NAME: AtomicU64 = AtomicU64::new(1);

/// Identity from literal parts. Panics on invalid names.
pub fn identity(mesh: &str, name: &str) -> ObjectIdentity {
    ObjectIdentity::from_parts(mesh, name)
        .unwrap_or_else(|e| panic!("invalid fixture identity {mesh}/{name}: {e}"))
}

/// Unique identity for tests that share a remote.
pub fn unique_identity() -> ObjectIdentity {
    let n = NEXT_NAME.fetch_add(1, Ordering::Relaxed);
    identity(&format!("test-mesh-{n}"), &format!("test-node-{n}"))
}

/// Declares a managed object. Panics if the spec is invalid.
pub fn managed(identity: ObjectIdentity, spec: Spec) -> ManagedObject {
    ManagedObject::new(identity, spec).unwrap_or_else(|e| panic!("invalid fixture spec: {e}"))
}

// =============================================================================
// Specs
// =============================================================================

/// Empty spec.
pub fn basic() -> Spec {
    Spec::default()
}

/// One backend, an 8080/http listener with an HTTP health check, and DNS
/// service discovery.
pub fn listener_health_checks() -> Spec {
    Spec {
        backends: vec![Backend::new("servicea.simpleapp.local")],
        listeners: vec![Listener::new(8080, Protocol::Http).with_health_check(HealthCheck {
            protocol: Protocol::Http,
            path: Some("/ping".to_string()),
            port: None,
            healthy_threshold: 3,
            unhealthy_threshold: 5,
            timeout_millis: 2000,
            interval_millis: 5000,
        })],
        logging: None,
        service_discovery: Some(ServiceDiscovery::dns("serviceb.simpleapp.local")),
    }
}

/// Every part of [`listener_health_checks`] changed: two new backends, the
/// listener moved to 8081 with a TCP health check, and a new hostname.
pub fn listener_health_checks_updated() -> Spec {
    Spec {
        backends: vec![
            Backend::new("servicec.simpleapp.local"),
            Backend::new("serviced.simpleapp.local"),
        ],
        listeners: vec![Listener::new(8081, Protocol::Http).with_health_check(HealthCheck {
            protocol: Protocol::Tcp,
            path: None,
            port: Some(8081),
            healthy_threshold: 4,
            unhealthy_threshold: 9,
            timeout_millis: 3000,
            interval_millis: 7000,
        })],
        logging: None,
        service_discovery: Some(ServiceDiscovery::dns("serviceb1.simpleapp.local")),
    }
}

/// One backend, a plain 8080/http listener, file access logging to `path`,
/// and DNS service discovery.
pub fn logging(path: &str) -> Spec {
    Spec {
        backends: vec![Backend::new("servicea.simpleapp.local")],
        listeners: vec![Listener::new(8080, Protocol::Http)],
        logging: Some(Logging::file(path)),
        service_discovery: Some(ServiceDiscovery::dns("serviceb.simpleapp.local")),
    }
}
