//! Virtual node spec types.
//!
//! The serde layout mirrors the declarative configuration block:
//!
//! ```toml
//! [[backend]]
//! virtual_service_name = "servicea.simpleapp.local"
//!
//! [[listener]]
//! port_mapping = { port = 8080, protocol = "http" }
//! health_check = { protocol = "http", path = "/ping", healthy_threshold = 3, unhealthy_threshold = 5, timeout_millis = 2000, interval_millis = 5000 }
//!
//! [service_discovery.dns]
//! hostname = "serviceb.simpleapp.local"
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Protocol-defined bounds.
pub mod limits {
    use std::ops::RangeInclusive;

    pub const PORT: RangeInclusive<u32> = 1..=65535;
    pub const THRESHOLD: RangeInclusive<u32> = 2..=10;
    pub const TIMEOUT_MILLIS: RangeInclusive<u64> = 2_000..=60_000;
    pub const INTERVAL_MILLIS: RangeInclusive<u64> = 5_000..=300_000;
}

// =============================================================================
// Spec
// =============================================================================

/// Desired configuration of a virtual node.
///
/// Derived equality is positional; use the differ (or `SpecHash`) for
/// order-independent comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Spec {
    #[serde(default, rename = "backend", skip_serializing_if = "Vec::is_empty")]
    pub backends: Vec<Backend>,

    #[serde(default, rename = "listener", skip_serializing_if = "Vec::is_empty")]
    pub listeners: Vec<Listener>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<Logging>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_discovery: Option<ServiceDiscovery>,
}

impl Spec {
    /// Returns true if nothing is configured.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
            && self.listeners.is_empty()
            && self.logging.is_none()
            && self.service_discovery.is_none()
    }

    /// Finds a listener by its semantic key.
    pub fn listener(&self, key: &ListenerKey) -> Option<&Listener> {
        self.listeners.iter().find(|l| &l.key() == key)
    }

    /// Finds a backend by the virtual service it references.
    pub fn backend(&self, virtual_service_name: &str) -> Option<&Backend> {
        self.backends
            .iter()
            .find(|b| b.virtual_service_name == virtual_service_name)
    }
}

// =============================================================================
// Backends
// =============================================================================

/// A virtual service this node sends traffic to.
///
/// Weak reference: the service is named, not owned, and only checked when
/// the remote system resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Backend {
    pub virtual_service_name: String,
}

impl Backend {
    pub fn new(virtual_service_name: impl Into<String>) -> Self {
        Self {
            virtual_service_name: virtual_service_name.into(),
        }
    }

    /// Semantic key of this backend.
    pub fn key(&self) -> &str {
        &self.virtual_service_name
    }
}

// =============================================================================
// Listeners
// =============================================================================

/// Listener and health-check protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Tcp => "tcp",
        }
    }

    /// Returns true for the HTTP family, where a health-check path applies.
    pub fn is_http_family(&self) -> bool {
        matches!(self, Protocol::Http)
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "tcp" => Ok(Protocol::Tcp),
            other => Err(format!("unknown protocol '{other}' (expected http or tcp)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortMapping {
    pub port: u32,
    pub protocol: Protocol,
}

/// Semantic identity of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerKey {
    pub port: u32,
    pub protocol: Protocol,
}

impl std::fmt::Display for ListenerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Listener {
    pub port_mapping: PortMapping,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
}

impl Listener {
    pub fn new(port: u32, protocol: Protocol) -> Self {
        Self {
            port_mapping: PortMapping { port, protocol },
            health_check: None,
        }
    }

    pub fn with_health_check(mut self, health_check: HealthCheck) -> Self {
        self.health_check = Some(health_check);
        self
    }

    /// Semantic key of this listener.
    pub fn key(&self) -> ListenerKey {
        ListenerKey {
            port: self.port_mapping.port,
            protocol: self.port_mapping.protocol,
        }
    }
}

/// Active health check attached to a listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthCheck {
    pub protocol: Protocol,

    /// Request path; only meaningful for the HTTP family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Destination port; defaults to the listener port on the remote side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,

    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
    pub timeout_millis: u64,
    pub interval_millis: u64,
}

// =============================================================================
// Logging
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Logging {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_log: Option<AccessLog>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLog {
    File { path: String },
}

impl Logging {
    /// Access logging to a file path.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            access_log: Some(AccessLog::File { path: path.into() }),
        }
    }
}

// =============================================================================
// Service discovery
// =============================================================================

/// How other mesh members find this node; exactly one mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceDiscovery {
    /// DNS hostname based discovery.
    Dns { hostname: String },

    /// Service-registry based discovery.
    #[serde(rename = "aws_cloud_map")]
    CloudMap {
        namespace_name: String,
        service_name: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: BTreeMap<String, String>,
    },
}

impl ServiceDiscovery {
    pub fn dns(hostname: impl Into<String>) -> Self {
        Self::Dns {
            hostname: hostname.into(),
        }
    }

    /// Attribute name of the selected mechanism.
    pub fn mechanism(&self) -> &'static str {
        match self {
            ServiceDiscovery::Dns { .. } => "dns",
            ServiceDiscovery::CloudMap { .. } => "aws_cloud_map",
        }
    }
}
