//! Validate command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use meshform_reconcile::SpecHash;
use serde::Serialize;

use crate::error::CliError;
use crate::manifest::Manifest;
use crate::output::{print_single, print_success, OutputFormat};

use super::CommandContext;

/// Parse a manifest and report every constraint it violates.
#[derive(Debug, Args)]
pub struct ValidateCommand {
    /// Path to the manifest.
    file: PathBuf,
}

#[derive(Debug, Serialize)]
struct ValidationView {
    identity: String,
    valid: bool,
    spec_hash: Option<String>,
    violations: Vec<ViolationView>,
}

#[derive(Debug, Serialize)]
struct ViolationView {
    path: String,
    message: String,
}

impl ValidateCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let manifest = Manifest::from_path(&self.file)?;
        let identity = manifest.identity()?;
        let spec_hash = SpecHash::of(&manifest.spec);

        let result = manifest.into_object(&self.file);
        let violations = match &result {
            Ok(_) => Vec::new(),
            Err(err) => match err.downcast_ref::<CliError>() {
                Some(CliError::InvalidSpec { source, .. }) => source
                    .violations
                    .iter()
                    .map(|v| ViolationView {
                        path: v.path.to_string(),
                        message: v.message.clone(),
                    })
                    .collect(),
                None => Vec::new(),
            },
        };

        match ctx.format {
            OutputFormat::Json => {
                let view = ValidationView {
                    identity: identity.to_string(),
                    valid: result.is_ok(),
                    spec_hash: result.is_ok().then(|| spec_hash.to_string()),
                    violations,
                };
                print_single(&view);
                result.map(|_| ())
            }
            OutputFormat::Table => {
                let object = result?;
                print_success(&format!(
                    "{} is valid ({} backend(s), {} listener(s), {})",
                    object.identity(),
                    object.desired().backends.len(),
                    object.desired().listeners.len(),
                    spec_hash
                ));
                Ok(())
            }
        }
    }
}
