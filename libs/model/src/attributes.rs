//! Structured attribute representation.
//!
//! The boundary format of the state model: a nested key-value tree where
//! repeated blocks are sets of sub-trees keyed by their semantic identity.
//! `Spec::to_attributes` and `Spec::from_attributes` convert in both
//! directions; decoding reports every problem it finds.

use std::collections::BTreeMap;

use crate::{
    AccessLog, Backend, HealthCheck, Listener, Logging, PortMapping, Protocol, ServiceDiscovery,
    Spec, ValidationError, Violation,
};

/// A block of named attributes.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A node of the attribute tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    String(String),
    Integer(i64),

    /// Zero-or-one nested block.
    Block(Attributes),

    /// Repeated block, compared by element key rather than position.
    Set(Vec<SetElement>),

    /// Exactly one of several discriminated blocks.
    OneOf {
        variant: String,
        attributes: Attributes,
    },
}

/// One element of a keyed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetElement {
    /// Semantic identity within the set.
    pub key: String,

    /// Elements with equal conflict keys cannot coexist remotely, even when
    /// their keys differ (e.g. two listeners on one port).
    pub conflict_key: Option<String>,

    pub attributes: Attributes,
}

impl AttributeValue {
    /// Short name of the value's shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "string",
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Block(_) => "block",
            AttributeValue::Set(_) => "set",
            AttributeValue::OneOf { .. } => "one-of block",
        }
    }

    /// Canonical JSON form: sets are ordered by element key.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttributeValue::String(s) => serde_json::Value::String(s.clone()),
            AttributeValue::Integer(i) => serde_json::Value::from(*i),
            AttributeValue::Block(attrs) => attributes_to_json(attrs),
            AttributeValue::Set(elements) => {
                let mut sorted: Vec<&SetElement> = elements.iter().collect();
                sorted.sort_by(|a, b| a.key.cmp(&b.key));
                serde_json::Value::Array(
                    sorted
                        .into_iter()
                        .map(|e| attributes_to_json(&e.attributes))
                        .collect(),
                )
            }
            AttributeValue::OneOf {
                variant,
                attributes,
            } => {
                let mut map = serde_json::Map::new();
                map.insert(variant.clone(), attributes_to_json(attributes));
                serde_json::Value::Object(map)
            }
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{s:?}"),
            AttributeValue::Integer(i) => write!(f, "{i}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// Canonical JSON form of an attribute block.
pub fn attributes_to_json(attrs: &Attributes) -> serde_json::Value {
    serde_json::Value::Object(
        attrs
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

// =============================================================================
// Paths
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    Field(String),
    Key(String),
}

/// Location of an attribute, rendered like `spec.listener[8080/http].health_check.path`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributePath(Vec<PathSegment>);

impl AttributePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of the spec block itself.
    pub fn spec() -> Self {
        Self::root().field("spec")
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Field(name.to_string()));
        Self(segments)
    }

    #[must_use]
    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self(segments)
    }
}

impl std::fmt::Display for AttributePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => f.write_str(name)?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Key(key) => write!(f, "[{key}]")?,
            }
        }
        Ok(())
    }
}

// =============================================================================
// Encoding
// =============================================================================

fn string(value: &str) -> AttributeValue {
    AttributeValue::String(value.to_string())
}

fn integer(value: impl Into<i64>) -> AttributeValue {
    AttributeValue::Integer(value.into())
}

fn block<const N: usize>(entries: [(&str, Option<AttributeValue>); N]) -> Attributes {
    entries
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
        .collect()
}

impl Spec {
    /// Encodes the spec as an attribute tree.
    pub fn to_attributes(&self) -> Attributes {
        let backends = self.backends.iter().map(encode_backend).collect();
        let listeners = self.listeners.iter().map(encode_listener).collect();

        block([
            ("backend", Some(AttributeValue::Set(backends))),
            ("listener", Some(AttributeValue::Set(listeners))),
            (
                "logging",
                self.logging
                    .as_ref()
                    .map(|l| AttributeValue::Block(encode_logging(l))),
            ),
            (
                "service_discovery",
                self.service_discovery.as_ref().map(encode_service_discovery),
            ),
        ])
    }

    /// Decodes a spec from an attribute tree, then validates it.
    ///
    /// Shape errors and constraint violations are reported together.
    pub fn from_attributes(attrs: &Attributes) -> Result<Spec, ValidationError> {
        let mut decoder = Decoder::default();
        let spec = decoder.spec(attrs, &AttributePath::spec());

        let mut violations = decoder.violations;
        spec.collect_violations(&mut violations);
        ValidationError::from_violations(violations)?;
        Ok(spec)
    }
}

fn encode_backend(backend: &Backend) -> SetElement {
    SetElement {
        key: backend.key().to_string(),
        conflict_key: None,
        attributes: block([(
            "virtual_service_name",
            Some(string(&backend.virtual_service_name)),
        )]),
    }
}

fn encode_listener(listener: &Listener) -> SetElement {
    let port_mapping = block([
        ("port", Some(integer(listener.port_mapping.port))),
        (
            "protocol",
            Some(string(listener.port_mapping.protocol.as_str())),
        ),
    ]);

    SetElement {
        key: listener.key().to_string(),
        conflict_key: Some(listener.port_mapping.port.to_string()),
        attributes: block([
            ("port_mapping", Some(AttributeValue::Block(port_mapping))),
            (
                "health_check",
                listener
                    .health_check
                    .as_ref()
                    .map(|hc| AttributeValue::Block(encode_health_check(hc))),
            ),
        ]),
    }
}

fn encode_health_check(hc: &HealthCheck) -> Attributes {
    block([
        ("protocol", Some(string(hc.protocol.as_str()))),
        ("path", hc.path.as_deref().map(string)),
        ("port", hc.port.map(integer)),
        ("healthy_threshold", Some(integer(hc.healthy_threshold))),
        ("unhealthy_threshold", Some(integer(hc.unhealthy_threshold))),
        ("timeout_millis", Some(integer_u64(hc.timeout_millis))),
        ("interval_millis", Some(integer_u64(hc.interval_millis))),
    ])
}

fn integer_u64(value: u64) -> AttributeValue {
    AttributeValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
}

fn encode_logging(logging: &Logging) -> Attributes {
    block([(
        "access_log",
        logging.access_log.as_ref().map(|log| match log {
            AccessLog::File { path } => AttributeValue::OneOf {
                variant: "file".to_string(),
                attributes: block([("path", Some(string(path)))]),
            },
        }),
    )])
}

fn encode_service_discovery(sd: &ServiceDiscovery) -> AttributeValue {
    let attributes = match sd {
        ServiceDiscovery::Dns { hostname } => block([("hostname", Some(string(hostname)))]),
        ServiceDiscovery::CloudMap {
            namespace_name,
            service_name,
            attributes,
        } => block([
            ("namespace_name", Some(string(namespace_name))),
            ("service_name", Some(string(service_name))),
            (
                "attributes",
                (!attributes.is_empty()).then(|| {
                    AttributeValue::Block(
                        attributes
                            .iter()
                            .map(|(k, v)| (k.clone(), string(v)))
                            .collect(),
                    )
                }),
            ),
        ]),
    };

    AttributeValue::OneOf {
        variant: sd.mechanism().to_string(),
        attributes,
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Collects every shape problem while decoding.
#[derive(Default)]
struct Decoder {
    violations: Vec<Violation>,
}

impl Decoder {
    fn fail(&mut self, path: AttributePath, message: impl Into<String>) {
        self.violations.push(Violation::new(path, message));
    }

    fn check_fields(&mut self, attrs: &Attributes, path: &AttributePath, allowed: &[&str]) {
        for name in attrs.keys() {
            if !allowed.contains(&name.as_str()) {
                self.fail(path.field(name), "unknown attribute");
            }
        }
    }

    fn opt_string(
        &mut self,
        attrs: &Attributes,
        path: &AttributePath,
        name: &str,
    ) -> Option<String> {
        match attrs.get(name)? {
            AttributeValue::String(s) => Some(s.clone()),
            other => {
                self.fail(
                    path.field(name),
                    format!("expected string, got {}", other.kind()),
                );
                None
            }
        }
    }

    fn string(&mut self, attrs: &Attributes, path: &AttributePath, name: &str) -> Option<String> {
        if !attrs.contains_key(name) {
            self.fail(path.field(name), "required attribute is missing");
            return None;
        }
        self.opt_string(attrs, path, name)
    }

    fn opt_integer<T: TryFrom<i64>>(
        &mut self,
        attrs: &Attributes,
        path: &AttributePath,
        name: &str,
    ) -> Option<T> {
        match attrs.get(name)? {
            AttributeValue::Integer(i) => match T::try_from(*i) {
                Ok(v) => Some(v),
                Err(_) => {
                    self.fail(path.field(name), format!("integer {i} is out of range"));
                    None
                }
            },
            other => {
                self.fail(
                    path.field(name),
                    format!("expected integer, got {}", other.kind()),
                );
                None
            }
        }
    }

    fn integer<T: TryFrom<i64>>(
        &mut self,
        attrs: &Attributes,
        path: &AttributePath,
        name: &str,
    ) -> Option<T> {
        if !attrs.contains_key(name) {
            self.fail(path.field(name), "required attribute is missing");
            return None;
        }
        self.opt_integer(attrs, path, name)
    }

    fn protocol(&mut self, attrs: &Attributes, path: &AttributePath) -> Option<Protocol> {
        let raw = self.string(attrs, path, "protocol")?;
        match raw.parse() {
            Ok(p) => Some(p),
            Err(message) => {
                self.fail(path.field("protocol"), message);
                None
            }
        }
    }

    fn block<'a>(
        &mut self,
        attrs: &'a Attributes,
        path: &AttributePath,
        name: &str,
    ) -> Option<&'a Attributes> {
        match attrs.get(name)? {
            AttributeValue::Block(inner) => Some(inner),
            other => {
                self.fail(
                    path.field(name),
                    format!("expected block, got {}", other.kind()),
                );
                None
            }
        }
    }

    fn set<'a>(
        &mut self,
        attrs: &'a Attributes,
        path: &AttributePath,
        name: &str,
    ) -> &'a [SetElement] {
        match attrs.get(name) {
            None => &[],
            Some(AttributeValue::Set(elements)) => elements,
            Some(other) => {
                self.fail(
                    path.field(name),
                    format!("expected set, got {}", other.kind()),
                );
                &[]
            }
        }
    }

    /// Resolves a discriminated block given either as `OneOf` or as a plain
    /// block holding the mechanisms as children.
    fn one_of<'a>(
        &mut self,
        value: &'a AttributeValue,
        path: &AttributePath,
        allowed: &[&str],
    ) -> Option<(&'a str, &'a Attributes)> {
        let (variant, attributes) = match value {
            AttributeValue::OneOf {
                variant,
                attributes,
            } => (variant.as_str(), attributes),
            AttributeValue::Block(children) => {
                if children.len() != 1 {
                    let names: Vec<&str> = children.keys().map(String::as_str).collect();
                    self.fail(
                        path.clone(),
                        format!(
                            "exactly one of [{}] must be set, got [{}]",
                            allowed.join(", "),
                            names.join(", ")
                        ),
                    );
                    return None;
                }
                let (variant, inner) = children.iter().next()?;
                let AttributeValue::Block(attributes) = inner else {
                    self.fail(
                        path.field(variant),
                        format!("expected block, got {}", inner.kind()),
                    );
                    return None;
                };
                (variant.as_str(), attributes)
            }
            other => {
                self.fail(
                    path.clone(),
                    format!("expected one-of block, got {}", other.kind()),
                );
                return None;
            }
        };

        if !allowed.contains(&variant) {
            self.fail(
                path.field(variant),
                format!("unknown mechanism (expected one of [{}])", allowed.join(", ")),
            );
            return None;
        }
        Some((variant, attributes))
    }

    fn spec(&mut self, attrs: &Attributes, path: &AttributePath) -> Spec {
        self.check_fields(
            attrs,
            path,
            &["backend", "listener", "logging", "service_discovery"],
        );

        let backends = self
            .set(attrs, path, "backend")
            .iter()
            .filter_map(|e| self.backend(e, &path.field("backend").key(&e.key)))
            .collect();

        let listeners = self
            .set(attrs, path, "listener")
            .iter()
            .filter_map(|e| self.listener(e, &path.field("listener").key(&e.key)))
            .collect();

        let logging = self
            .block(attrs, path, "logging")
            .map(|l| self.logging(l, &path.field("logging")));

        let service_discovery = attrs
            .get("service_discovery")
            .and_then(|sd| self.service_discovery(sd, &path.field("service_discovery")));

        Spec {
            backends,
            listeners,
            logging,
            service_discovery,
        }
    }

    fn backend(&mut self, element: &SetElement, path: &AttributePath) -> Option<Backend> {
        self.check_fields(&element.attributes, path, &["virtual_service_name"]);
        let name = self.string(&element.attributes, path, "virtual_service_name")?;
        Some(Backend::new(name))
    }

    fn listener(&mut self, element: &SetElement, path: &AttributePath) -> Option<Listener> {
        let attrs = &element.attributes;
        self.check_fields(attrs, path, &["port_mapping", "health_check"]);

        let pm_path = path.field("port_mapping");
        let Some(pm) = self.block(attrs, path, "port_mapping") else {
            if !attrs.contains_key("port_mapping") {
                self.fail(pm_path, "required block is missing");
            }
            return None;
        };
        self.check_fields(pm, &pm_path, &["port", "protocol"]);
        let port = self.integer(pm, &pm_path, "port");
        let protocol = self.protocol(pm, &pm_path);

        let health_check = self
            .block(attrs, path, "health_check")
            .and_then(|hc| self.health_check(hc, &path.field("health_check")));

        Some(Listener {
            port_mapping: PortMapping {
                port: port?,
                protocol: protocol?,
            },
            health_check,
        })
    }

    fn health_check(&mut self, attrs: &Attributes, path: &AttributePath) -> Option<HealthCheck> {
        self.check_fields(
            attrs,
            path,
            &[
                "protocol",
                "path",
                "port",
                "healthy_threshold",
                "unhealthy_threshold",
                "timeout_millis",
                "interval_millis",
            ],
        );

        let protocol = self.protocol(attrs, path);
        let hc_path = self.opt_string(attrs, path, "path");
        let port = self.opt_integer(attrs, path, "port");
        let healthy_threshold = self.integer(attrs, path, "healthy_threshold");
        let unhealthy_threshold = self.integer(attrs, path, "unhealthy_threshold");
        let timeout_millis = self.integer(attrs, path, "timeout_millis");
        let interval_millis = self.integer(attrs, path, "interval_millis");

        Some(HealthCheck {
            protocol: protocol?,
            path: hc_path,
            port,
            healthy_threshold: healthy_threshold?,
            unhealthy_threshold: unhealthy_threshold?,
            timeout_millis: timeout_millis?,
            interval_millis: interval_millis?,
        })
    }

    fn logging(&mut self, attrs: &Attributes, path: &AttributePath) -> Logging {
        self.check_fields(attrs, path, &["access_log"]);

        let access_log = attrs.get("access_log").and_then(|value| {
            let log_path = path.field("access_log");
            let (_, file) = self.one_of(value, &log_path, &["file"])?;
            let file_path = log_path.field("file");
            self.check_fields(file, &file_path, &["path"]);
            let path = self.string(file, &file_path, "path")?;
            Some(AccessLog::File { path })
        });

        Logging { access_log }
    }

    fn service_discovery(
        &mut self,
        value: &AttributeValue,
        path: &AttributePath,
    ) -> Option<ServiceDiscovery> {
        let (variant, attrs) = self.one_of(value, path, &["dns", "aws_cloud_map"])?;
        let path = path.field(variant);

        match variant {
            "dns" => {
                self.check_fields(attrs, &path, &["hostname"]);
                let hostname = self.string(attrs, &path, "hostname")?;
                Some(ServiceDiscovery::Dns { hostname })
            }
            _ => {
                self.check_fields(
                    attrs,
                    &path,
                    &["namespace_name", "service_name", "attributes"],
                );
                let namespace_name = self.string(attrs, &path, "namespace_name");
                let service_name = self.string(attrs, &path, "service_name");
                let attributes = self
                    .block(attrs, &path, "attributes")
                    .map(|inner| {
                        let attr_path = path.field("attributes");
                        inner
                            .keys()
                            .filter_map(|k| {
                                self.string(inner, &attr_path, k).map(|v| (k.clone(), v))
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                Some(ServiceDiscovery::CloudMap {
                    namespace_name: namespace_name?,
                    service_name: service_name?,
                    attributes,
                })
            }
        }
    }
}
