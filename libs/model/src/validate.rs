//! Cross-field validation of a desired spec.

use std::collections::{BTreeMap, BTreeSet};

use crate::spec::limits;
use crate::{
    AccessLog, AttributePath, HealthCheck, Listener, Logging, Protocol, ServiceDiscovery, Spec,
    ValidationError, Violation,
};

impl Spec {
    /// Checks every structural constraint, reporting all violations.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        self.collect_violations(&mut violations);
        ValidationError::from_violations(violations)
    }

    pub(crate) fn collect_violations(&self, out: &mut Vec<Violation>) {
        let root = AttributePath::spec();

        let mut seen_backends = BTreeSet::new();
        for backend in &self.backends {
            let path = root.field("backend").key(backend.key());
            if backend.virtual_service_name.trim().is_empty() {
                out.push(Violation::new(
                    path.field("virtual_service_name"),
                    "must not be empty",
                ));
            }
            if !seen_backends.insert(backend.key()) {
                out.push(Violation::new(path, "duplicate backend"));
            }
        }

        let mut ports: BTreeMap<u32, Protocol> = BTreeMap::new();
        for listener in &self.listeners {
            let key = listener.key();
            let path = root.field("listener").key(&key.to_string());
            match ports.get(&key.port) {
                Some(existing) if *existing == key.protocol => {
                    out.push(Violation::new(path.clone(), "duplicate listener"));
                }
                Some(existing) => out.push(Violation::new(
                    path.clone(),
                    format!(
                        "port {} is already used by listener {}/{}",
                        key.port, key.port, existing
                    ),
                )),
                None => {
                    ports.insert(key.port, key.protocol);
                }
            }
            validate_listener(listener, &path, out);
        }

        if let Some(logging) = &self.logging {
            validate_logging(logging, &root.field("logging"), out);
        }

        if let Some(sd) = &self.service_discovery {
            validate_service_discovery(sd, &root.field("service_discovery"), out);
        }
    }
}

fn validate_listener(listener: &Listener, path: &AttributePath, out: &mut Vec<Violation>) {
    let port = listener.port_mapping.port;
    if !limits::PORT.contains(&port) {
        out.push(Violation::new(
            path.field("port_mapping").field("port"),
            out_of_range(port, &limits::PORT),
        ));
    }

    if let Some(hc) = &listener.health_check {
        validate_health_check(hc, &path.field("health_check"), out);
    }
}

fn validate_health_check(hc: &HealthCheck, path: &AttributePath, out: &mut Vec<Violation>) {
    match (&hc.path, hc.protocol.is_http_family()) {
        (None, true) => out.push(Violation::new(
            path.field("path"),
            format!("required when protocol is {}", hc.protocol),
        )),
        (Some(_), false) => out.push(Violation::new(
            path.field("path"),
            format!("not allowed when protocol is {}", hc.protocol),
        )),
        (Some(p), true) if !p.starts_with('/') => {
            out.push(Violation::new(path.field("path"), "must start with '/'"));
        }
        _ => {}
    }

    if let Some(port) = hc.port {
        if !limits::PORT.contains(&port) {
            out.push(Violation::new(
                path.field("port"),
                out_of_range(port, &limits::PORT),
            ));
        }
    }

    for (name, value) in [
        ("healthy_threshold", hc.healthy_threshold),
        ("unhealthy_threshold", hc.unhealthy_threshold),
    ] {
        if !limits::THRESHOLD.contains(&value) {
            out.push(Violation::new(
                path.field(name),
                out_of_range(value, &limits::THRESHOLD),
            ));
        }
    }

    if !limits::TIMEOUT_MILLIS.contains(&hc.timeout_millis) {
        out.push(Violation::new(
            path.field("timeout_millis"),
            out_of_range(hc.timeout_millis, &limits::TIMEOUT_MILLIS),
        ));
    }
    if !limits::INTERVAL_MILLIS.contains(&hc.interval_millis) {
        out.push(Violation::new(
            path.field("interval_millis"),
            out_of_range(hc.interval_millis, &limits::INTERVAL_MILLIS),
        ));
    }
}

fn validate_logging(logging: &Logging, path: &AttributePath, out: &mut Vec<Violation>) {
    match &logging.access_log {
        Some(AccessLog::File { path: file }) if file.trim().is_empty() => out.push(Violation::new(
            path.field("access_log").field("file").field("path"),
            "must not be empty",
        )),
        _ => {}
    }
}

fn validate_service_discovery(
    sd: &ServiceDiscovery,
    path: &AttributePath,
    out: &mut Vec<Violation>,
) {
    let path = path.field(sd.mechanism());
    match sd {
        ServiceDiscovery::Dns { hostname } => {
            if hostname.trim().is_empty() {
                out.push(Violation::new(path.field("hostname"), "must not be empty"));
            }
        }
        ServiceDiscovery::CloudMap {
            namespace_name,
            service_name,
            attributes,
        } => {
            if namespace_name.trim().is_empty() {
                out.push(Violation::new(path.field("namespace_name"), "must not be empty"));
            }
            if service_name.trim().is_empty() {
                out.push(Violation::new(path.field("service_name"), "must not be empty"));
            }
            if attributes.keys().any(|k| k.trim().is_empty()) {
                out.push(Violation::new(
                    path.field("attributes"),
                    "attribute keys must not be empty",
                ));
            }
        }
    }
}

fn out_of_range<T: std::fmt::Display>(value: T, range: &std::ops::RangeInclusive<T>) -> String {
    format!(
        "{} is outside the allowed range {}..={}",
        value,
        range.start(),
        range.end()
    )
}
