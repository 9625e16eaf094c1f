//! Identity command.

use anyhow::{Context, Result};
use clap::Args;
use meshform_id::{ObjectIdentity, ResourceArn};
use serde::Serialize;

use crate::output::{print_single, OutputFormat};

use super::CommandContext;

/// Parse `<mesh_name>/<name>` or a virtual node ARN.
#[derive(Debug, Args)]
pub struct IdCommand {
    /// Identity or ARN.
    input: String,
}

#[derive(Debug, Serialize)]
struct IdView {
    identity: String,
    mesh_name: String,
    name: String,
    arn: String,
}

impl IdCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let arn = if self.input.starts_with("arn:") {
            ResourceArn::parse(&self.input)
                .with_context(|| format!("malformed ARN '{}'", self.input))?
        } else {
            let identity = ObjectIdentity::parse(&self.input)
                .with_context(|| format!("malformed identity '{}'", self.input))?;
            ResourceArn::new(
                &ctx.config.partition,
                &ctx.config.region,
                &ctx.config.account_id,
                identity,
            )
            .context("invalid MESHCTL_PARTITION, MESHCTL_REGION or MESHCTL_ACCOUNT_ID")?
        };

        let identity = arn.identity();
        let view = IdView {
            identity: identity.to_string(),
            mesh_name: identity.mesh().to_string(),
            name: identity.name().to_string(),
            arn: arn.to_string(),
        };

        match ctx.format {
            OutputFormat::Json => print_single(&view),
            OutputFormat::Table => {
                println!("identity:  {}", view.identity);
                println!("mesh_name: {}", view.mesh_name);
                println!("name:      {}", view.name);
                println!("arn:       {}", view.arn);
            }
        }

        Ok(())
    }
}
