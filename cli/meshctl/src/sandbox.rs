//! Local sandbox remote, persisted as JSON between invocations.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use meshform_model::ObservedState;
use meshform_reconcile::InMemoryMeshClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;

const SANDBOX_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SandboxFile {
    schema_version: u32,
    #[serde(default)]
    objects: Vec<ObservedState>,
}

/// Load the sandbox at `config.state_path`; a missing file is an empty sandbox.
pub fn load(config: &Config) -> Result<Arc<InMemoryMeshClient>> {
    let client =
        InMemoryMeshClient::with_location(&config.partition, &config.region, &config.account_id)
            .context("invalid MESHCTL_PARTITION, MESHCTL_REGION or MESHCTL_ACCOUNT_ID")?;

    let path = &config.state_path;
    if !path.exists() {
        debug!(path = %path.display(), "No sandbox state yet");
        return Ok(Arc::new(client));
    }

    let objects = read(path)?;
    debug!(path = %path.display(), objects = objects.len(), "Loaded sandbox state");
    Ok(Arc::new(client.with_objects(objects)))
}

fn read(path: &Path) -> Result<Vec<ObservedState>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sandbox state from {:?}", path))?;
    let file: SandboxFile = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse sandbox state from {:?}", path))?;

    if file.schema_version != SANDBOX_SCHEMA_VERSION {
        anyhow::bail!(
            "Unsupported sandbox schema version {} in {:?} (expected {})",
            file.schema_version,
            path,
            SANDBOX_SCHEMA_VERSION
        );
    }
    Ok(file.objects)
}

/// Persist every object in `client` to `path`.
pub fn save(path: &Path, client: &InMemoryMeshClient) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create sandbox directory {:?}", dir))?;
    }

    let file = SandboxFile {
        schema_version: SANDBOX_SCHEMA_VERSION,
        objects: client.objects(),
    };
    let contents = serde_json::to_string_pretty(&file)?;
    fs::write(path, contents)
        .with_context(|| format!("Failed to write sandbox state to {:?}", path))?;

    debug!(path = %path.display(), objects = file.objects.len(), "Saved sandbox state");
    Ok(())
}
