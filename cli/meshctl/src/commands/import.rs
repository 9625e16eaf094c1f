//! Import command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::manifest::Manifest;
use crate::output::{print_single, print_success, OutputFormat};

use super::CommandContext;

/// Import an existing virtual node by `<mesh_name>/<name>`.
///
/// Prints a manifest that reproduces the imported object, ready for
/// `meshctl apply`.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Identity of the virtual node, e.g. `simpleapp/servicebv1`.
    id: String,
}

#[derive(Debug, Serialize)]
struct ImportView {
    identity: String,
    arn: Option<String>,
    phase: String,
    manifest: Manifest,
}

impl ImportCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let (_client, reconciler) = ctx.sandbox()?;
        let object = reconciler.import(&self.id).await?;
        let manifest = Manifest::from_object(&object);

        match ctx.format {
            OutputFormat::Json => print_single(&ImportView {
                identity: object.identity().to_string(),
                arn: object.observed().map(|o| o.metadata.arn.to_string()),
                phase: object.phase().to_string(),
                manifest,
            }),
            OutputFormat::Table => {
                print_success(&format!("Imported {}", object.identity()));
                println!();
                print!("{}", manifest.to_toml_string()?);
            }
        }

        Ok(())
    }
}
