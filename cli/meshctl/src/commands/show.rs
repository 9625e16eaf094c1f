//! Show command.

use anyhow::Result;
use clap::Args;

use crate::output::{print_single, OutputFormat};

use super::CommandContext;

/// Show the observed state of a virtual node.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Identity of the virtual node, e.g. `simpleapp/servicebv1`.
    id: String,
}

impl ShowCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let (_client, reconciler) = ctx.sandbox()?;
        let object = reconciler.import(&self.id).await?;
        let Some(observed) = object.observed() else {
            anyhow::bail!("{} has no observed state", object.identity());
        };

        match ctx.format {
            OutputFormat::Json => print_single(observed),
            OutputFormat::Table => {
                let meta = &observed.metadata;
                println!("identity:     {}", observed.identity);
                println!("arn:          {}", meta.arn);
                println!("uid:          {}", meta.uid);
                println!("version:      {}", meta.version);
                println!("created:      {}", meta.created_at.to_rfc3339());
                println!("last updated: {}", meta.last_updated_at.to_rfc3339());
                println!("backends:     {}", observed.spec.backends.len());
                println!("listeners:    {}", observed.spec.listeners.len());
                println!(
                    "discovery:    {}",
                    observed
                        .spec
                        .service_discovery
                        .as_ref()
                        .map(|sd| sd.mechanism())
                        .unwrap_or("-")
                );
                println!("spec:");
                println!("{}", serde_json::to_string_pretty(&observed.spec)?);
            }
        }

        Ok(())
    }
}
