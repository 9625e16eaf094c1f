//! Name and identity definitions for managed mesh objects.

use crate::define_name;
use crate::IdError;

/// Maximum length of any object name.
pub const MAX_NAME_LEN: usize = 255;

/// Separator between the mesh and node segments of an identity.
pub const IDENTITY_SEPARATOR: char = '/';

/// Validates a single object name.
///
/// Names are 1..=255 characters of ASCII alphanumerics, `-`, `_`, or `.`.
#[doc(hidden)]
pub fn validate_name(kind: &'static str, s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }

    let invalid = |reason: String| IdError::InvalidName {
        kind,
        value: s.to_string(),
        reason,
    };

    if s.len() > MAX_NAME_LEN {
        return Err(invalid(format!(
            "length {} exceeds {}",
            s.len(),
            MAX_NAME_LEN
        )));
    }

    if let Some(c) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(invalid(format!("character {c:?} is not allowed")));
    }

    Ok(())
}

// =============================================================================
// Names
// =============================================================================

define_name!(MeshName, "mesh name");
define_name!(VirtualNodeName, "virtual node name");

// =============================================================================
// Composite identity
// =============================================================================

/// Stable external identity of a virtual node: `<mesh>/<name>`.
///
/// Immutable once the object has been created; a change to either segment
/// means a different remote object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectIdentity {
    mesh: MeshName,
    name: VirtualNodeName,
}

impl ObjectIdentity {
    /// Creates an identity from already-validated names.
    #[must_use]
    pub fn new(mesh: MeshName, name: VirtualNodeName) -> Self {
        Self { mesh, name }
    }

    /// Parses an identity in the form `<mesh>/<name>`.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }

        let Some((mesh, name)) = s.split_once(IDENTITY_SEPARATOR) else {
            return Err(IdError::MissingSeparator(s.to_string()));
        };

        if mesh.is_empty() {
            return Err(IdError::EmptySegment {
                segment: "mesh",
                input: s.to_string(),
            });
        }
        if name.is_empty() {
            return Err(IdError::EmptySegment {
                segment: "name",
                input: s.to_string(),
            });
        }
        if name.contains(IDENTITY_SEPARATOR) {
            return Err(IdError::TooManySegments(s.to_string()));
        }

        Ok(Self {
            mesh: MeshName::parse(mesh)?,
            name: VirtualNodeName::parse(name)?,
        })
    }

    /// Parses an identity from its two raw segments.
    pub fn from_parts(mesh: &str, name: &str) -> Result<Self, IdError> {
        Ok(Self {
            mesh: MeshName::parse(mesh)?,
            name: VirtualNodeName::parse(name)?,
        })
    }

    /// Returns the parent mesh name.
    #[must_use]
    pub fn mesh(&self) -> &MeshName {
        &self.mesh
    }

    /// Returns the object name.
    #[must_use]
    pub fn name(&self) -> &VirtualNodeName {
        &self.name
    }
}

impl std::fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.mesh, IDENTITY_SEPARATOR, self.name)
    }
}

impl std::str::FromStr for ObjectIdentity {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for ObjectIdentity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ObjectIdentity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================
