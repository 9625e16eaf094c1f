//! Delete command.

use anyhow::{Context, Result};
use clap::Args;
use meshform_id::ObjectIdentity;
use meshform_model::{ManagedObject, Spec};
use meshform_reconcile::ReconcileOutcome;

use crate::output::{print_info, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Delete a virtual node. Deleting an absent node succeeds.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Identity of the virtual node, e.g. `simpleapp/servicebv1`.
    id: String,
}

impl DeleteCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let identity = ObjectIdentity::parse(&self.id)
            .with_context(|| format!("malformed identity '{}'", self.id))?;
        let (client, reconciler) = ctx.sandbox()?;

        let mut object = ManagedObject::new(identity, Spec::default())?;
        let outcome = reconciler.delete(&mut object).await?;
        ctx.save_sandbox(&client)?;

        let deleted = outcome == ReconcileOutcome::Deleted;
        match ctx.format {
            OutputFormat::Json => print_single(&serde_json::json!({
                "identity": object.identity().to_string(),
                "deleted": deleted,
                "status": object.status().to_string(),
            })),
            OutputFormat::Table if deleted => {
                print_success(&format!("Deleted {}", object.identity()))
            }
            OutputFormat::Table => {
                print_info(&format!("{} does not exist; nothing to delete", object.identity()))
            }
        }

        Ok(())
    }
}
