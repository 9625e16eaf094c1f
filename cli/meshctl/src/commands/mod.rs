//! CLI commands.

mod apply;
mod delete;
mod id;
mod import;
mod plan;
mod show;
mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use meshform_model::ManagedObject;
use meshform_reconcile::{InMemoryMeshClient, Reconciler};

use crate::config::Config;
use crate::manifest::Manifest;
use crate::output::OutputFormat;
use crate::sandbox;

/// meshctl - Declare and reconcile service-mesh virtual nodes.
#[derive(Debug, Parser)]
#[command(name = "meshctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Sandbox state file (overrides MESHCTL_STATE).
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse and validate a manifest without touching the sandbox.
    Validate(validate::ValidateCommand),

    /// Show the changes `apply` would make.
    Plan(plan::PlanCommand),

    /// Reconcile the sandbox toward a manifest.
    Apply(apply::ApplyCommand),

    /// Import an existing virtual node and print its manifest.
    Import(import::ImportCommand),

    /// Delete a virtual node (succeeds if already absent).
    Delete(delete::DeleteCommand),

    /// Show the observed state of a virtual node.
    Show(show::ShowCommand),

    /// Parse an identity or ARN.
    Id(id::IdCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self, mut config: Config) -> Result<()> {
        let format = match self.format.as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Table,
        };

        if let Some(state) = self.state {
            config.state_path = state;
        }

        let ctx = CommandContext { config, format };

        match self.command {
            Commands::Validate(cmd) => cmd.run(ctx).await,
            Commands::Plan(cmd) => cmd.run(ctx).await,
            Commands::Apply(cmd) => cmd.run(ctx).await,
            Commands::Import(cmd) => cmd.run(ctx).await,
            Commands::Delete(cmd) => cmd.run(ctx).await,
            Commands::Show(cmd) => cmd.run(ctx).await,
            Commands::Id(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("meshctl {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
}

type SandboxReconciler = Reconciler<Arc<InMemoryMeshClient>>;

impl CommandContext {
    /// Open the sandbox remote and a reconciler over it.
    pub fn sandbox(&self) -> Result<(Arc<InMemoryMeshClient>, SandboxReconciler)> {
        let client = sandbox::load(&self.config)?;
        let reconciler = Reconciler::new(client.clone());
        Ok((client, reconciler))
    }

    pub fn save_sandbox(&self, client: &InMemoryMeshClient) -> Result<()> {
        sandbox::save(&self.config.state_path, client)
    }
}

/// Load a manifest and read the current remote state into it.
async fn load_object(path: &Path, reconciler: &SandboxReconciler) -> Result<ManagedObject> {
    let mut object = Manifest::from_path(path)?.into_object(path)?;
    reconciler.refresh(&mut object).await?;
    Ok(object)
}
