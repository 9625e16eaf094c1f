//! Desired-state manifests.
//!
//! A manifest names one virtual node and declares its spec:
//!
//! ```toml
//! mesh_name = "simpleapp"
//! name = "servicebv1"
//!
//! [[spec.listener]]
//! port_mapping = { port = 8080, protocol = "http" }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use meshform_id::ObjectIdentity;
use meshform_model::{ManagedObject, Spec};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub mesh_name: String,
    pub name: String,

    #[serde(default)]
    pub spec: Spec,
}

impl Manifest {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("invalid manifest TOML")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))
    }

    /// Manifest reproducing an existing object's desired state.
    pub fn from_object(object: &ManagedObject) -> Self {
        Self {
            mesh_name: object.identity().mesh().to_string(),
            name: object.identity().name().to_string(),
            spec: object.desired().clone(),
        }
    }

    pub fn identity(&self) -> Result<ObjectIdentity> {
        ObjectIdentity::from_parts(&self.mesh_name, &self.name)
            .context("invalid mesh_name or name in manifest")
    }

    /// Validates the spec and declares the managed object.
    pub fn into_object(self, path: &Path) -> Result<ManagedObject> {
        let identity = self.identity()?;
        ManagedObject::new(identity.clone(), self.spec).map_err(|source| {
            CliError::InvalidSpec {
                path: PathBuf::from(path),
                identity,
                source,
            }
            .into()
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).context("failed to render manifest")
    }
}
